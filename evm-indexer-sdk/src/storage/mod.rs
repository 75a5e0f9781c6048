//! Entity storage for the indexer.
//!
//! The store holds one logical table per entity kind plus the engine's
//! bookkeeping: the cursor, recent block hashes, and a write journal that
//! makes every committed change revertible during reorg recovery.
//!
//! Handlers never touch a backend directly. They stage reads and writes in a
//! [`StoreTx`]; the engine turns the staged writes into a [`ChangeSet`] and
//! commits it atomically together with the advanced cursor.

pub mod memory;
pub mod postgres;

use crate::types::entity::{Entity, EntitySchema};
use crate::types::log::Cursor;
use crate::utils::error::{IndexerError, Result};
use alloy::primitives::B256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Width numeric strings are padded to so they sort numerically as text.
pub(crate) const NUMERIC_SORT_WIDTH: usize = 80;

/// One entity write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntityWrite {
    pub kind: String,
    pub id: String,
    pub value: Value,
    /// Value before this write (`None` if the entity was created).
    pub previous: Option<Value>,
}

/// Everything one handled log (or one range checkpoint) commits atomically.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Adapter instance owning the cursor.
    pub source: String,
    /// Block the writes belong to; journal entries are tagged with it.
    pub block_number: u64,
    pub writes: Vec<EntityWrite>,
    pub cursor: Cursor,
    /// Observed canonical hashes, kept for reorg detection.
    pub block_hashes: Vec<(u64, B256)>,
}

impl ChangeSet {
    /// A cursor-only change set marking `cursor` as fully processed.
    #[must_use]
    pub fn checkpoint(source: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            source: source.into(),
            block_number: cursor.block_number,
            writes: Vec::new(),
            cursor,
            block_hashes: vec![(cursor.block_number, cursor.block_hash)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Keyset position of the last row of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageKey {
    pub sort_key: String,
    pub id: String,
}

/// Backend-level list request. Field names are validated by the query layer.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Equality filters on top-level fields.
    pub filters: Vec<(String, Value)>,
    /// Sort field; `None` sorts by primary key.
    pub sort: Option<String>,
    pub direction: SortDirection,
    pub limit: usize,
    pub after: Option<PageKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Position to continue from, if more rows exist.
    pub next: Option<PageKey>,
}

/// Text form a field sorts by, shared by all backends.
///
/// Digit-only strings and unsigned integers are left-padded with zeros so
/// that big-integer fields stored as decimal strings order numerically.
#[must_use]
pub fn sort_key_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{s:0>width$}", width = NUMERIC_SORT_WIDTH)
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) => format!("{v:0>width$}", width = NUMERIC_SORT_WIDTH),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// Text form a field is compared by in equality filters.
#[must_use]
pub fn filter_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Abstract interface for entity persistence.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Creates tables for the given kinds plus the engine bookkeeping.
    async fn initialize(&self, schemas: &[EntitySchema]) -> Result<()>;

    /// Point lookup by primary key.
    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>>;

    /// Applies writes, journal entries, block hashes and the cursor atomically.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;

    async fn load_cursor(&self, source: &str) -> Result<Option<Cursor>>;

    /// Retained block hashes, highest block first.
    async fn block_hashes(&self, source: &str) -> Result<Vec<(u64, B256)>>;

    /// Reverts every journaled write above `ancestor.block_number`, newest
    /// first, and moves the cursor to `ancestor`. Returns the number of
    /// reverted writes.
    async fn rollback_to(&self, source: &str, ancestor: Cursor) -> Result<usize>;

    /// Drops journal entries and block hashes below `below`.
    async fn prune_history(&self, source: &str, below: u64) -> Result<()>;

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Page>;
}

#[derive(Debug)]
struct Staged {
    original: Option<Value>,
    current: Option<Value>,
}

/// Read-your-writes overlay a handler works in.
///
/// Nothing reaches the backend until the engine commits the overlay; dropping
/// it discards every staged write.
pub struct StoreTx {
    store: Arc<dyn EntityStore>,
    staged: BTreeMap<(&'static str, String), Staged>,
}

impl StoreTx {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    async fn load(&mut self, kind: &'static str, id: &str) -> Result<Option<Value>> {
        let key = (kind, id.to_string());
        if let Some(staged) = self.staged.get(&key) {
            return Ok(staged.current.clone());
        }
        let value = self.store.get(kind, id).await?;
        self.staged.insert(
            key,
            Staged {
                original: value.clone(),
                current: value.clone(),
            },
        );
        Ok(value)
    }

    fn stage(&mut self, kind: &'static str, id: &str, value: Value) {
        if let Some(staged) = self.staged.get_mut(&(kind, id.to_string())) {
            staged.current = Some(value);
        }
    }

    /// Point lookup, seeing this transaction's own writes.
    pub async fn get<E: Entity>(&mut self, id: &str) -> Result<Option<E>> {
        match self.load(E::KIND, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn exists<E: Entity>(&mut self, id: &str) -> Result<bool> {
        Ok(self.load(E::KIND, id).await?.is_some())
    }

    /// Inserts a new entity; fails with `EntityExists` if the key is taken.
    pub async fn create<E: Entity>(&mut self, entity: &E) -> Result<()> {
        let id = entity.id();
        if self.load(E::KIND, &id).await?.is_some() {
            return Err(IndexerError::exists(E::KIND, &id));
        }
        let value = serde_json::to_value(entity)?;
        self.stage(E::KIND, &id, value);
        Ok(())
    }

    /// Inserts the entity unless the key exists. Returns `true` if inserted.
    pub async fn insert_if_absent<E: Entity>(&mut self, entity: &E) -> Result<bool> {
        match self.create(entity).await {
            Ok(()) => Ok(true),
            Err(IndexerError::EntityExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Merges the top-level fields of `patch` into an existing entity.
    ///
    /// Fails with `EntityNotFound` if the key is absent.
    pub async fn update<E: Entity>(&mut self, id: &str, patch: Value) -> Result<()> {
        let Value::Object(fields) = patch else {
            return Err(IndexerError::InternalError(format!(
                "{} patch must be a JSON object",
                E::KIND
            )));
        };
        let Some(mut current) = self.load(E::KIND, id).await? else {
            return Err(IndexerError::not_found(E::KIND, id));
        };
        if let Value::Object(target) = &mut current {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        // Reject patches that no longer deserialize as the entity.
        serde_json::from_value::<E>(current.clone())?;
        self.stage(E::KIND, id, current);
        Ok(())
    }

    /// Creates the entity, or merges all of its fields into the existing one.
    pub async fn upsert<E: Entity>(&mut self, entity: &E) -> Result<()> {
        let id = entity.id();
        let value = serde_json::to_value(entity)?;
        match self.load(E::KIND, &id).await? {
            None => {
                self.stage(E::KIND, &id, value);
                Ok(())
            }
            Some(_) => self.update::<E>(&id, value).await,
        }
    }

    /// Read-modify-write of an existing entity.
    ///
    /// Fails with `EntityNotFound` if the key is absent.
    pub async fn modify<E, F>(&mut self, id: &str, f: F) -> Result<E>
    where
        E: Entity + Clone,
        F: FnOnce(&mut E) + Send,
    {
        let Some(mut entity) = self.get::<E>(id).await? else {
            return Err(IndexerError::not_found(E::KIND, id));
        };
        f(&mut entity);
        let value = serde_json::to_value(&entity)?;
        self.stage(E::KIND, id, value);
        Ok(entity)
    }

    /// Staged writes that actually change stored state.
    #[must_use]
    pub fn into_writes(self) -> Vec<EntityWrite> {
        self.staged
            .into_iter()
            .filter_map(|((kind, id), staged)| match staged.current {
                Some(value) if staged.original.as_ref() != Some(&value) => Some(EntityWrite {
                    kind: kind.to_string(),
                    id,
                    value,
                    previous: staged.original,
                }),
                _ => None,
            })
            .collect()
    }
}
