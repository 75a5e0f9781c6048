//! The indexing engine.
//!
//! Drives the log source window by window, decodes each log, dispatches it
//! to its handler and commits the handler's writes, the audit record and the
//! advanced cursor as one atomic change set. Logs are handled strictly one at
//! a time in (block, log index) order.
//!
//! State machine:
//!
//! ```text
//! BACKFILLING ──caught up──▶ LIVE
//!      │                      │
//!      └──hash mismatch──▶ REORG_RECOVERY ──rewound──▶ (previous state)
//!
//! any state ──fatal error──▶ HALTED
//! ```

use crate::config::IndexerConfig;
use crate::core::decoder::{Decoded, EventDecoder};
use crate::core::query::QuerySurface;
use crate::core::reader::ChainReader;
use crate::core::registry::{EventHandler, HandlerContext, HandlerRegistry};
use crate::core::source::LogSource;
use crate::storage::{ChangeSet, EntityStore, MemoryStore, PostgresStore, StoreTx};
use crate::types::entity::{Entity, EntitySchema, EventLog};
use crate::types::event::{format_address, format_hash, DecodedEvent};
use crate::types::log::{BlockHeader, Cursor, RawLog};
use crate::utils::error::{IndexerError, Result};
use crate::utils::logging;
use crate::utils::retry::RetryingProvider;
use crate::utils::rpc::{AlloyProvider, ChainProvider};
use alloy::primitives::B256;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexerState {
    /// Replaying history below the chain head.
    Backfilling,
    /// Caught up; polling for new blocks.
    Live,
    /// Rewinding the store to the last common ancestor.
    ReorgRecovery,
    /// Stopped on a fatal error; committed state is still served.
    Halted,
}

impl IndexerState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IndexerState::Backfilling => "BACKFILLING",
            IndexerState::Live => "LIVE",
            IndexerState::ReorgRecovery => "REORG_RECOVERY",
            IndexerState::Halted => "HALTED",
        }
    }
}

impl fmt::Display for IndexerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one [`Indexer::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nothing new below the confirmed head.
    Idle,
    /// Processed blocks `from..=to`.
    Advanced {
        from: u64,
        to: u64,
        logs: usize,
        handled: usize,
    },
    /// Rewound to `ancestor` after a reorg.
    Recovered { ancestor: u64 },
}

/// Cloneable view of a running engine: state, shutdown and queries.
#[derive(Clone)]
pub struct IndexerHandle {
    state: watch::Receiver<IndexerState>,
    cancellation_token: CancellationToken,
    query: QuerySurface,
}

impl IndexerHandle {
    #[must_use]
    pub fn state(&self) -> IndexerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<IndexerState> {
        self.state.clone()
    }

    /// Waits until the engine reaches `target`.
    pub async fn wait_for(&self, target: IndexerState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| IndexerError::InternalError("Indexer dropped".to_string()))
    }

    #[must_use]
    pub fn query(&self) -> &QuerySurface {
        &self.query
    }

    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }
}

/// Main indexer that orchestrates the complete pipeline.
///
/// # Example
///
/// ```no_run
/// use evm_indexer_sdk::{Indexer, IndexerConfigBuilder, NetworkConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = IndexerConfigBuilder::new()
///         .with_rpc("http://127.0.0.1:8545")
///         .with_network(NetworkConfig::from_file("config/network.json")?)
///         .build()?;
///
///     let mut indexer = Indexer::new(config).await?;
///     // indexer.register_handler("IdeaRegistry", "IdeaCreated", handler)?;
///     indexer.start().await?;
///     Ok(())
/// }
/// ```
pub struct Indexer {
    config: IndexerConfig,
    source: LogSource,
    reader: ChainReader,
    decoder: EventDecoder,
    registry: HandlerRegistry,
    store: Arc<dyn EntityStore>,
    state: watch::Sender<IndexerState>,
    cancellation_token: CancellationToken,
}

fn event_log(event: &DecodedEvent) -> EventLog {
    EventLog {
        id: event.meta.log_id(),
        contract: event.contract.clone(),
        contract_address: format_address(&event.meta.address),
        event_name: event.name.clone(),
        args: event.args.to_json(),
        block_number: event.meta.block_number,
        block_hash: format_hash(&event.meta.block_hash),
        transaction_hash: format_hash(&event.meta.transaction_hash),
        log_index: event.meta.log_index,
        timestamp: event.meta.block_timestamp,
    }
}

impl Indexer {
    /// Creates an indexer talking to `config.rpc_url`.
    ///
    /// Entities go to `PostgreSQL` when a database URL is configured and to
    /// an in-process store otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC URL is malformed or the database is unreachable.
    pub async fn new(config: IndexerConfig) -> Result<Self> {
        let provider: Arc<dyn ChainProvider> = Arc::new(AlloyProvider::new(
            &config.rpc_url,
            Duration::from_millis(config.request_timeout_ms),
        )?);
        let store: Arc<dyn EntityStore> = match &config.database_url {
            Some(url) => Arc::new(PostgresStore::new(url).await?),
            None => {
                logging::log(
                    logging::LogLevel::Warning,
                    "No database configured; entities are kept in memory",
                );
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_components(config, provider, store))
    }

    /// Creates an indexer over an explicit provider and store.
    ///
    /// The log source wraps `provider` in the configured retry policy; the
    /// chain reader uses it undecorated.
    #[must_use]
    pub fn with_components(
        config: IndexerConfig,
        provider: Arc<dyn ChainProvider>,
        store: Arc<dyn EntityStore>,
    ) -> Self {
        let retrying: Arc<dyn ChainProvider> = Arc::new(RetryingProvider::new(
            Arc::clone(&provider),
            config.retry.clone(),
        ));
        let source = LogSource::new(retrying, &config.network);
        let reader = ChainReader::new(
            provider,
            &config.network.contracts,
            Duration::from_millis(config.reader_timeout_ms),
        );
        let decoder = EventDecoder::new(&config.network.contracts);
        let registry = HandlerRegistry::new_bounded(&config.registry);
        let (state, _) = watch::channel(IndexerState::Backfilling);

        Self {
            config,
            source,
            reader,
            decoder,
            registry,
            store,
            state,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Registers `handler` for `contract.event`.
    pub fn register_handler(
        &mut self,
        contract: &str,
        event: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        self.registry.register(contract, event, handler)
    }

    #[must_use]
    pub fn handler_registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn handler_registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn EntityStore> {
        Arc::clone(&self.store)
    }

    /// Every kind the engine writes: handler schemas plus the event log.
    #[must_use]
    pub fn schemas(&self) -> Vec<EntitySchema> {
        let mut schemas = self.registry.schemas();
        if !schemas.iter().any(|s| s.name == EventLog::KIND) {
            schemas.push(EventLog::schema());
        }
        schemas
    }

    /// Read-only query surface over committed state.
    #[must_use]
    pub fn query_surface(&self) -> QuerySurface {
        QuerySurface::new(Arc::clone(&self.store), self.schemas())
    }

    /// Handle for observing and stopping the engine from other tasks.
    ///
    /// Call after registering handlers so the query surface knows every kind.
    #[must_use]
    pub fn handle(&self) -> IndexerHandle {
        IndexerHandle {
            state: self.state.subscribe(),
            cancellation_token: self.cancellation_token.clone(),
            query: self.query_surface(),
        }
    }

    #[must_use]
    pub fn state(&self) -> IndexerState {
        *self.state.borrow()
    }

    fn set_state(&self, next: IndexerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            logging::log_transition(previous.as_str(), next.as_str());
        }
    }

    /// Triggers a graceful shutdown programmatically.
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    fn source_name(&self) -> &str {
        self.config.source_name()
    }

    /// Startup checks: chain id, tables, handler audit, cursor sanity.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the endpoint serves a different chain
    /// - `CursorInconsistent` if the stored cursor contradicts the stored
    ///   block history or lies far beyond the chain head
    pub async fn prepare(&self) -> Result<()> {
        let network = &self.config.network;
        let chain_id = self.source.chain_id().await?;
        if chain_id != network.chain_id {
            return Err(IndexerError::ConfigError(format!(
                "Endpoint serves chain {chain_id}, network '{}' expects {}",
                network.name, network.chain_id
            )));
        }

        self.store.initialize(&self.schemas()).await?;
        self.registry.audit(&self.decoder);

        let contracts: Vec<String> = network
            .contracts
            .iter()
            .map(|c| format!("{}@{}", c.name, format_address(&c.address)))
            .collect();
        logging::log_startup(&network.name, chain_id, &self.config.rpc_url, &contracts);

        let Some(cursor) = self.store.load_cursor(self.source_name()).await? else {
            logging::log(
                logging::LogLevel::Info,
                &format!("No cursor found; starting at block {}", network.start_block()),
            );
            return Ok(());
        };

        let hashes = self.store.block_hashes(self.source_name()).await?;
        match hashes.first() {
            Some((number, hash)) if *number == cursor.block_number && *hash == cursor.block_hash => {}
            _ => {
                return Err(IndexerError::CursorInconsistent(format!(
                    "cursor at block {} does not match stored block history",
                    cursor.block_number
                )));
            }
        }

        let head = self.source.head().await?;
        if cursor.block_number > head.saturating_add(self.config.finality_depth) {
            return Err(IndexerError::CursorInconsistent(format!(
                "cursor at block {} is beyond chain head {head}",
                cursor.block_number
            )));
        }

        logging::log(
            logging::LogLevel::Success,
            &format!("Resuming from block {}", cursor.resume_block()),
        );
        Ok(())
    }

    /// Runs one unit of work: a reorg check followed by at most one window.
    pub async fn step(&self) -> Result<Progress> {
        let head = self.source.head().await?;
        let safe_head = head.saturating_sub(self.config.confirmations);
        let cursor = self.store.load_cursor(self.source_name()).await?;

        if let Some(cursor) = cursor {
            let canonical = self.source.header(cursor.block_number).await?;
            if canonical.map(|h| h.hash) != Some(cursor.block_hash) {
                let ancestor = self.recover(cursor).await?;
                return Ok(Progress::Recovered { ancestor });
            }
        }

        let from = cursor.map_or_else(|| self.config.network.start_block(), |c| c.resume_block());
        if from > safe_head {
            self.set_state(IndexerState::Live);
            return Ok(Progress::Idle);
        }
        let to = from
            .saturating_add(self.config.batch_size - 1)
            .min(safe_head);

        let progress = self.process_range(from, to, head, cursor).await?;
        if to >= safe_head {
            self.set_state(IndexerState::Live);
        }
        Ok(progress)
    }

    #[instrument(skip(self, cursor), level = "debug")]
    async fn process_range(
        &self,
        from: u64,
        to: u64,
        head: u64,
        cursor: Option<Cursor>,
    ) -> Result<Progress> {
        let started = Instant::now();
        // Pin hashes before fetching logs so a reorg during the window shows
        // up as a hash mismatch on the next step.
        let end = self.source.require_header(to).await?;
        let pinned = self.pin_hashes(from, &end, head).await?;
        let logs = self.source.fetch_range(from, to).await?;

        let mut handled = 0;
        for log in &logs {
            if cursor.is_some_and(|c| c.covers(log.block_number, log.log_index)) {
                continue;
            }
            if self.process_log(log).await? {
                handled += 1;
            }
        }

        let mut checkpoint =
            ChangeSet::checkpoint(self.source_name(), Cursor::block_end(to, end.hash));
        checkpoint.block_hashes = pinned;
        self.store.commit(checkpoint).await?;
        self.store
            .prune_history(self.source_name(), to.saturating_sub(self.config.finality_depth))
            .await?;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        logging::log_range(from, to, logs.len(), handled, duration_ms);
        if self.config.registry.enable_metrics && !logs.is_empty() {
            self.registry.metrics().report();
        }

        Ok(Progress::Advanced {
            from,
            to,
            logs: logs.len(),
            handled,
        })
    }

    /// Canonical hashes of the window blocks that can still be reorganized,
    /// ending with the window end.
    ///
    /// Blocks more than `finality_depth` below the window end or the chain
    /// head are skipped; recovery never needs them.
    async fn pin_hashes(
        &self,
        from: u64,
        end: &BlockHeader,
        head: u64,
    ) -> Result<Vec<(u64, B256)>> {
        let depth = self.config.finality_depth;
        let first = from
            .max(end.number.saturating_add(1).saturating_sub(depth))
            .max(head.saturating_add(1).saturating_sub(depth));
        let mut hashes = Vec::new();
        for number in first..end.number {
            hashes.push((number, self.source.require_header(number).await?.hash));
        }
        hashes.push((end.number, end.hash));
        Ok(hashes)
    }

    /// Decodes, dispatches and commits one log.
    ///
    /// Returns `true` if a handler ran and its writes were kept.
    async fn process_log(&self, log: &RawLog) -> Result<bool> {
        let event = match self.decoder.decode(log) {
            Decoded::Event(event) => event,
            Decoded::NoMatch(reason) => {
                self.registry.metrics().inc_decode_misses();
                tracing::debug!(
                    block = log.block_number,
                    log_index = log.log_index,
                    address = %format_address(&log.address),
                    "Undecoded log: {reason:?}"
                );
                return Ok(false);
            }
        };

        let Some(handler) = self.registry.lookup(&event.contract, &event.name) else {
            tracing::trace!("No handler for {}.{}", event.contract, event.name);
            return Ok(false);
        };

        let mut tx = StoreTx::new(Arc::clone(&self.store));
        let outcome = {
            let mut ctx = HandlerContext {
                store: &mut tx,
                reader: &self.reader,
            };
            handler.handle(&event, &mut ctx).await
        };

        let (writes, handled) = match outcome {
            Ok(()) => {
                tx.insert_if_absent(&event_log(&event)).await?;
                (tx.into_writes(), true)
            }
            Err(e) if e.is_skippable() => {
                tracing::warn!(
                    block = event.meta.block_number,
                    log_index = event.meta.log_index,
                    "Skipping {}.{}: {e}",
                    event.contract,
                    event.name
                );
                (Vec::new(), false)
            }
            Err(e) => return Err(e),
        };

        self.store
            .commit(ChangeSet {
                source: self.source_name().to_string(),
                block_number: log.block_number,
                writes,
                cursor: Cursor::at_log(log.block_number, log.log_index, log.block_hash),
                block_hashes: vec![(log.block_number, log.block_hash)],
            })
            .await?;
        Ok(handled)
    }

    /// Rewinds the store to the newest retained block still on the canonical chain.
    async fn recover(&self, cursor: Cursor) -> Result<u64> {
        let resume_state = match self.state() {
            IndexerState::Backfilling => IndexerState::Backfilling,
            _ => IndexerState::Live,
        };
        self.set_state(IndexerState::ReorgRecovery);
        logging::log(
            logging::LogLevel::Warning,
            &format!(
                "Reorg detected at block {}; searching for common ancestor",
                cursor.block_number
            ),
        );

        let mut ancestor = None;
        for (number, hash) in self.store.block_hashes(self.source_name()).await? {
            if let Some(header) = self.source.header(number).await? {
                if header.hash == hash {
                    ancestor = Some(Cursor::block_end(number, hash));
                    break;
                }
            }
        }
        let ancestor = ancestor.ok_or(IndexerError::ReorgTooDeep {
            block: cursor.block_number,
        })?;

        let reverted = self.store.rollback_to(self.source_name(), ancestor).await?;
        for handler in self.registry.distinct_handlers() {
            handler.on_rollback(ancestor.block_number).await?;
        }
        logging::log(
            logging::LogLevel::Warning,
            &format!(
                "Rolled back {reverted} write(s) above block {}",
                ancestor.block_number
            ),
        );

        self.set_state(resume_state);
        Ok(ancestor.block_number)
    }

    async fn halt(&self, error: &IndexerError) {
        self.set_state(IndexerState::Halted);
        for handler in self.registry.distinct_handlers() {
            handler.on_halt().await;
        }
        logging::log_error("Indexer halted", &error.to_string());
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    /// Returns `false` on shutdown.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancellation_token.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Runs until shutdown or a fatal error.
    ///
    /// Database errors are retried on the next poll cycle: the failed change
    /// set was not committed, so the cursor still points at the last good log.
    /// Any other error halts the engine.
    ///
    /// # Errors
    ///
    /// Returns the error that halted the engine.
    pub async fn run(&self) -> Result<()> {
        if let Err(e) = self.prepare().await {
            self.halt(&e).await;
            return Err(e);
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        logging::log(logging::LogLevel::Info, "Starting indexer loop...");

        while !self.cancellation_token.is_cancelled() {
            match self.step().await {
                Ok(Progress::Idle) => {
                    if !self.pause(poll_interval).await {
                        break;
                    }
                }
                Ok(Progress::Advanced { .. } | Progress::Recovered { .. }) => {}
                Err(e) if e.is_fatal() => {
                    self.halt(&e).await;
                    return Err(e);
                }
                Err(e) => {
                    logging::log_error("Commit failed (retrying next cycle)", &e.to_string());
                    if !self.pause(poll_interval).await {
                        break;
                    }
                }
            }
        }

        logging::log(logging::LogLevel::Info, "Indexer stopped");
        Ok(())
    }

    /// Runs the engine with a Ctrl+C handler attached.
    ///
    /// # Errors
    ///
    /// Returns the error that halted the engine.
    pub async fn start(self) -> Result<()> {
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                logging::log(logging::LogLevel::Info, "Received Ctrl+C, shutting down...");
                token.cancel();
            }
        });

        self.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(IndexerState::ReorgRecovery.to_string(), "REORG_RECOVERY");
        assert_eq!(
            serde_json::to_value(IndexerState::Backfilling).unwrap(),
            serde_json::json!("BACKFILLING")
        );
    }
}
