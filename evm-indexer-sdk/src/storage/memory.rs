//! In-process entity store.
//!
//! All state sits behind one `RwLock`, so a commit is observed whole or not
//! at all. Used by tests and by runs without `DATABASE_URL`.

use super::{filter_text, sort_key_text, ChangeSet, EntityStore, ListQuery, Page, PageKey, SortDirection};
use crate::types::entity::EntitySchema;
use crate::types::log::Cursor;
use crate::utils::error::Result;
use alloy::primitives::B256;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct JournalEntry {
    source: String,
    block_number: u64,
    kind: String,
    id: String,
    previous: Option<Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, BTreeMap<String, Value>>,
    cursors: HashMap<String, Cursor>,
    blocks: HashMap<String, BTreeMap<u64, B256>>,
    journal: Vec<JournalEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer never leaves a half-applied change set behind, so a
    // poisoned lock still guards consistent state.
    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a row directly, bypassing journal and cursor.
    pub fn put_raw(&self, kind: &str, id: &str, value: Value) {
        self.write()
            .tables
            .entry(kind.to_string())
            .or_default()
            .insert(id.to_string(), value);
    }

    /// Copy of every table, keyed by kind then id.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
        self.read().tables.clone()
    }

    /// Number of rows of one kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.read().tables.get(kind).map_or(0, BTreeMap::len)
    }

    /// Number of retained journal entries across all sources.
    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.read().journal.len()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn initialize(&self, schemas: &[EntitySchema]) -> Result<()> {
        let mut state = self.write();
        for schema in schemas {
            state.tables.entry(schema.name.to_string()).or_default();
        }
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .read()
            .tables
            .get(kind)
            .and_then(|table| table.get(id))
            .cloned())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut state = self.write();
        for write in changes.writes {
            state.journal.push(JournalEntry {
                source: changes.source.clone(),
                block_number: changes.block_number,
                kind: write.kind.clone(),
                id: write.id.clone(),
                previous: write.previous,
            });
            state
                .tables
                .entry(write.kind)
                .or_default()
                .insert(write.id, write.value);
        }
        let blocks = state.blocks.entry(changes.source.clone()).or_default();
        for (number, hash) in changes.block_hashes {
            blocks.insert(number, hash);
        }
        state.cursors.insert(changes.source, changes.cursor);
        Ok(())
    }

    async fn load_cursor(&self, source: &str) -> Result<Option<Cursor>> {
        Ok(self.read().cursors.get(source).copied())
    }

    async fn block_hashes(&self, source: &str) -> Result<Vec<(u64, B256)>> {
        Ok(self
            .read()
            .blocks
            .get(source)
            .map(|blocks| blocks.iter().rev().map(|(n, h)| (*n, *h)).collect())
            .unwrap_or_default())
    }

    async fn rollback_to(&self, source: &str, ancestor: Cursor) -> Result<usize> {
        let mut state = self.write();
        let MemoryState {
            tables,
            cursors,
            blocks,
            journal,
        } = &mut *state;

        let mut reverted = 0;
        let mut kept = Vec::with_capacity(journal.len());
        // Newest first, so each key ends at its oldest reverted `previous`.
        for entry in journal.drain(..).rev() {
            if entry.source != source || entry.block_number <= ancestor.block_number {
                kept.push(entry);
                continue;
            }
            let table = tables.entry(entry.kind).or_default();
            match entry.previous {
                Some(previous) => {
                    table.insert(entry.id, previous);
                }
                None => {
                    table.remove(&entry.id);
                }
            }
            reverted += 1;
        }
        kept.reverse();
        *journal = kept;

        if let Some(hashes) = blocks.get_mut(source) {
            hashes.retain(|number, _| *number <= ancestor.block_number);
        }
        cursors.insert(source.to_string(), ancestor);
        Ok(reverted)
    }

    async fn prune_history(&self, source: &str, below: u64) -> Result<()> {
        let mut state = self.write();
        state
            .journal
            .retain(|entry| entry.source != source || entry.block_number >= below);
        if let Some(hashes) = state.blocks.get_mut(source) {
            hashes.retain(|number, _| *number >= below);
        }
        Ok(())
    }

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Page> {
        let state = self.read();
        let Some(table) = state.tables.get(kind) else {
            return Ok(Page {
                items: Vec::new(),
                next: None,
            });
        };

        let mut rows: Vec<(String, &String, &Value)> = table
            .iter()
            .filter(|(_, row)| {
                query.filters.iter().all(|(field, expected)| {
                    filter_text(row.get(field)) == filter_text(Some(expected))
                })
            })
            .map(|(id, row)| {
                let key = match &query.sort {
                    Some(field) => sort_key_text(row.get(field)),
                    None => id.clone(),
                };
                (key, id, row)
            })
            .collect();

        rows.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        if query.direction == SortDirection::Desc {
            rows.reverse();
        }

        if let Some(after) = &query.after {
            let position = (&after.sort_key, &after.id);
            rows.retain(|(key, id, _)| match query.direction {
                SortDirection::Asc => (key, *id) > position,
                SortDirection::Desc => (key, *id) < position,
            });
        }

        let has_more = rows.len() > query.limit;
        rows.truncate(query.limit);
        let next = if has_more {
            rows.last().map(|(key, id, _)| PageKey {
                sort_key: key.clone(),
                id: (*id).clone(),
            })
        } else {
            None
        };

        Ok(Page {
            items: rows.into_iter().map(|(_, _, row)| row.clone()).collect(),
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EntityWrite;
    use serde_json::json;

    fn hash(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    fn write(kind: &str, id: &str, value: Value, previous: Option<Value>) -> EntityWrite {
        EntityWrite {
            kind: kind.to_string(),
            id: id.to_string(),
            value,
            previous,
        }
    }

    fn change(block: u64, writes: Vec<EntityWrite>) -> ChangeSet {
        ChangeSet {
            source: "test".to_string(),
            block_number: block,
            writes,
            cursor: Cursor::block_end(block, hash(block as u8)),
            block_hashes: vec![(block, hash(block as u8))],
        }
    }

    #[tokio::test]
    async fn test_commit_and_get() {
        let store = MemoryStore::new();
        store
            .commit(change(10, vec![write("Idea", "1", json!({"id": "1"}), None)]))
            .await
            .unwrap();

        assert_eq!(store.get("Idea", "1").await.unwrap(), Some(json!({"id": "1"})));
        let cursor = store.load_cursor("test").await.unwrap().unwrap();
        assert_eq!(cursor.block_number, 10);
    }

    #[tokio::test]
    async fn test_rollback_restores_previous_values() {
        let store = MemoryStore::new();
        store
            .commit(change(10, vec![write("Idea", "1", json!({"v": 1}), None)]))
            .await
            .unwrap();
        store
            .commit(change(
                11,
                vec![
                    write("Idea", "1", json!({"v": 2}), Some(json!({"v": 1}))),
                    write("Idea", "2", json!({"v": 9}), None),
                ],
            ))
            .await
            .unwrap();
        store
            .commit(change(12, vec![write("Idea", "1", json!({"v": 3}), Some(json!({"v": 2})))]))
            .await
            .unwrap();

        let reverted = store
            .rollback_to("test", Cursor::block_end(10, hash(10)))
            .await
            .unwrap();

        assert_eq!(reverted, 3);
        assert_eq!(store.get("Idea", "1").await.unwrap(), Some(json!({"v": 1})));
        assert_eq!(store.get("Idea", "2").await.unwrap(), None);
        assert_eq!(store.block_hashes("test").await.unwrap(), vec![(10, hash(10))]);
        assert_eq!(store.load_cursor("test").await.unwrap().unwrap().block_number, 10);
    }

    #[tokio::test]
    async fn test_prune_drops_old_history() {
        let store = MemoryStore::new();
        for block in 1..=5 {
            store
                .commit(change(block, vec![write("Idea", &block.to_string(), json!({}), None)]))
                .await
                .unwrap();
        }
        store.prune_history("test", 4).await.unwrap();

        assert_eq!(store.journal_len(), 2);
        let blocks: Vec<u64> = store
            .block_hashes("test")
            .await
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(blocks, vec![5, 4]);
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        for (id, price, sold) in [("1", "900", false), ("2", "50", false), ("3", "700", true), ("4", "1000", false)] {
            store.put_raw("Idea", id, json!({"id": id, "price": price, "isPurchased": sold}));
        }

        let mut query = ListQuery {
            filters: vec![("isPurchased".to_string(), json!(false))],
            sort: Some("price".to_string()),
            direction: SortDirection::Desc,
            limit: 2,
            after: None,
        };
        let first = store.list("Idea", &query).await.unwrap();
        let ids: Vec<&str> = first.items.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["4", "1"]);

        query.after = first.next;
        let second = store.list("Idea", &query).await.unwrap();
        let ids: Vec<&str> = second.items.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["2"]);
        assert!(second.next.is_none());
    }
}
