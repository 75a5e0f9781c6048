//! Handler registry: routes decoded events to user handlers.
//!
//! Handlers are registered under an exact (contract, event) pair. A lookup
//! that finds nothing is a normal outcome, not an error: it covers events an
//! ABI declares but the indexer does not react to, and handlers wired up for
//! events a deployed contract never emits.

use crate::config::RegistryConfig;
use crate::core::decoder::EventDecoder;
use crate::core::reader::ChainReader;
use crate::core::registry_metrics::RegistryMetrics;
use crate::storage::StoreTx;
use crate::types::entity::EntitySchema;
use crate::types::event::DecodedEvent;
use crate::utils::error::{IndexerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What a handler gets to work with while processing one event.
///
/// `store` is a transaction overlay: its writes are committed atomically
/// with the cursor if the handler returns `Ok`, and discarded otherwise.
pub struct HandlerContext<'a> {
    pub store: &'a mut StoreTx,
    pub reader: &'a ChainReader,
}

/// Event handler trait for processing decoded events.
///
/// This is the primary extension point of the indexer. One handler value may
/// be registered for several (contract, event) pairs and dispatch on
/// `event.name` itself.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use evm_indexer_sdk::{DecodedEvent, EventHandler, HandlerContext, Result};
///
/// pub struct PingHandler;
///
/// #[async_trait]
/// impl EventHandler for PingHandler {
///     async fn handle(&self, event: &DecodedEvent, _ctx: &mut HandlerContext<'_>) -> Result<()> {
///         let who = event.args.address("who")?;
///         tracing::info!("ping from {who}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Entity-level failures (`EntityNotFound`, `EntityExists`,
    /// `ConstraintViolation`, `DecodingError`) skip the event: its writes are
    /// dropped and the cursor moves on. Any other error halts the engine.
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()>;

    /// Called after the store has been rewound to `ancestor_block`.
    async fn on_rollback(&self, _ancestor_block: u64) -> Result<()> {
        Ok(())
    }

    /// Called once when the engine halts.
    async fn on_halt(&self) {}

    /// Entity kinds this handler writes; their tables are created at startup.
    fn schemas(&self) -> Vec<EntitySchema> {
        Vec::new()
    }
}

/// Registry for managing event handlers by (contract, event) pair.
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn EventHandler>>,
    metrics: RegistryMetrics,
}

impl HandlerRegistry {
    /// Creates a new, empty registry with unlimited capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            metrics: RegistryMetrics::new("EventHandler", 0),
        }
    }

    /// Creates a new registry with a specific capacity limit.
    #[must_use]
    pub fn new_bounded(config: &RegistryConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            metrics: RegistryMetrics::new("EventHandler", config.max_handlers),
        }
    }

    /// Registers `handler` for `event` emitted by `contract`.
    ///
    /// # Errors
    ///
    /// - `RegistryCapacityExceeded` if the registry is full
    /// - `ConfigError` if the pair already has a handler
    pub fn register(
        &mut self,
        contract: impl Into<String>,
        event: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        let key = (contract.into(), event.into());
        if self.handlers.contains_key(&key) {
            return Err(IndexerError::ConfigError(format!(
                "Handler already registered for {}.{}",
                key.0, key.1
            )));
        }
        if self.metrics.is_full() {
            return Err(IndexerError::RegistryCapacityExceeded(format!(
                "EventHandler registry full (limit: {})",
                self.metrics.capacity_limit
            )));
        }

        self.handlers.insert(key, handler);
        self.metrics.inc_registered();
        Ok(())
    }

    /// Registers one handler for several events of the same contract.
    pub fn register_all(
        &mut self,
        contract: &str,
        events: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        for event in events {
            self.register(contract, *event, Arc::clone(&handler))?;
        }
        Ok(())
    }

    /// Finds the handler for a decoded event. `None` means "ignore it".
    #[must_use]
    pub fn lookup(&self, contract: &str, event: &str) -> Option<Arc<dyn EventHandler>> {
        self.metrics.inc_calls();
        let handler = self
            .handlers
            .get(&(contract.to_string(), event.to_string()))
            .cloned();
        if handler.is_some() {
            self.metrics.inc_hits();
        }
        handler
    }

    /// Each registered handler value once, regardless of how many pairs it serves.
    #[must_use]
    pub fn distinct_handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        let mut distinct: Vec<Arc<dyn EventHandler>> = Vec::new();
        for handler in self.handlers.values() {
            if !distinct.iter().any(|seen| Arc::ptr_eq(seen, handler)) {
                distinct.push(Arc::clone(handler));
            }
        }
        distinct
    }

    /// Schemas declared by all handlers, deduplicated by kind.
    #[must_use]
    pub fn schemas(&self) -> Vec<EntitySchema> {
        let mut by_kind = BTreeMap::new();
        for handler in self.distinct_handlers() {
            for schema in handler.schemas() {
                by_kind.entry(schema.name).or_insert(schema);
            }
        }
        by_kind.into_values().collect()
    }

    /// Compares registrations with what the ABIs declare.
    ///
    /// Returns the registered pairs no ABI declares; these can never fire.
    pub fn audit(&self, decoder: &EventDecoder) -> Vec<(String, String)> {
        let mut dangling: Vec<(String, String)> = self
            .handlers
            .keys()
            .filter(|(contract, event)| !decoder.declares(contract, event))
            .cloned()
            .collect();
        dangling.sort();
        for (contract, event) in &dangling {
            tracing::warn!("Handler registered for {contract}.{event}, which no configured ABI declares");
        }

        for (contract, event) in decoder.declared_events() {
            if !self.handlers.contains_key(&(contract.clone(), event.clone())) {
                tracing::debug!("{contract}.{event} has no handler; occurrences will be ignored");
            }
        }
        dangling
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the metrics for this registry.
    #[must_use]
    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
