//! `PostgreSQL` entity store.
//!
//! Each entity kind gets a table `"<Kind>" (id TEXT PRIMARY KEY, data JSONB)`.
//! Engine bookkeeping lives in `_indexer_cursor`, `_indexer_blocks` and
//! `_indexer_journal`. Every [`ChangeSet`] is applied in one transaction, so
//! readers only ever see committed snapshots.

use super::{filter_text, ChangeSet, EntityStore, ListQuery, Page, PageKey, SortDirection, NUMERIC_SORT_WIDTH};
use crate::types::entity::EntitySchema;
use crate::types::event::format_hash;
use crate::types::log::Cursor;
use crate::utils::error::{IndexerError, Result};
use alloy::primitives::B256;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Database-backed store.
///
/// # Example
///
/// ```no_run
/// use evm_indexer_sdk::storage::PostgresStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresStore::new("postgresql://localhost/indexer").await?;
/// # Ok(())
/// # }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

fn table(kind: &str) -> String {
    format!("\"{}\"", kind.replace('"', "\"\""))
}

fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// SQL twin of [`super::sort_key_text`].
fn sort_expr(field: &str) -> String {
    let value = format!("data->>{}", literal(field));
    format!(
        "(CASE WHEN {value} ~ '^[0-9]+$' THEN lpad({value}, {NUMERIC_SORT_WIDTH}, '0') \
         ELSE COALESCE({value}, '') END) COLLATE \"C\""
    )
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| IndexerError::DataError(format!("{what} {value} exceeds BIGINT")))
}

fn to_u64(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| IndexerError::DataError(format!("negative {what} {value}")))
}

fn parse_hash(text: &str) -> Result<B256> {
    B256::from_str(text).map_err(|e| IndexerError::DataError(format!("bad block hash '{text}': {e}")))
}

impl PostgresStore {
    /// Creates a store with a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::DatabaseError` if connection fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn write_cursor(
        tx: &mut Transaction<'_, Postgres>,
        source: &str,
        cursor: &Cursor,
    ) -> Result<()> {
        let log_index = cursor
            .log_index
            .map(|idx| to_i64(idx, "log index"))
            .transpose()?;
        sqlx::query(
            r"
            INSERT INTO _indexer_cursor (source, block_number, log_index, block_hash, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (source) DO UPDATE
            SET block_number = EXCLUDED.block_number,
                log_index = EXCLUDED.log_index,
                block_hash = EXCLUDED.block_hash,
                updated_at = NOW()
            ",
        )
        .bind(source)
        .bind(to_i64(cursor.block_number, "block number")?)
        .bind(log_index)
        .bind(format_hash(&cursor.block_hash))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn put_row(
        tx: &mut Transaction<'_, Postgres>,
        kind: &str,
        id: &str,
        value: &Value,
    ) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, data, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
            table(kind)
        ))
        .bind(id)
        .bind(value)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PostgresStore {
    async fn initialize(&self, schemas: &[EntitySchema]) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS _indexer_cursor (
                source TEXT PRIMARY KEY,
                block_number BIGINT NOT NULL,
                log_index BIGINT,
                block_hash TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS _indexer_blocks (
                source TEXT NOT NULL,
                block_number BIGINT NOT NULL,
                block_hash TEXT NOT NULL,
                PRIMARY KEY (source, block_number)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS _indexer_journal (
                seq BIGSERIAL PRIMARY KEY,
                source TEXT NOT NULL,
                block_number BIGINT NOT NULL,
                kind TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                previous JSONB
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_indexer_journal_block
            ON _indexer_journal(source, block_number)
            ",
        )
        .execute(&self.pool)
        .await?;

        for schema in schemas {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                    id TEXT PRIMARY KEY, \
                    data JSONB NOT NULL, \
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\
                )",
                table(schema.name)
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        let value = sqlx::query_scalar::<_, Value>(&format!(
            "SELECT data FROM {} WHERE id = $1",
            table(kind)
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let block_number = to_i64(changes.block_number, "block number")?;
        let mut tx = self.pool.begin().await?;

        for write in &changes.writes {
            Self::put_row(&mut tx, &write.kind, &write.id, &write.value).await?;
            sqlx::query(
                r"
                INSERT INTO _indexer_journal (source, block_number, kind, entity_id, previous)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(&changes.source)
            .bind(block_number)
            .bind(&write.kind)
            .bind(&write.id)
            .bind(&write.previous)
            .execute(&mut *tx)
            .await?;
        }

        for (number, hash) in &changes.block_hashes {
            sqlx::query(
                r"
                INSERT INTO _indexer_blocks (source, block_number, block_hash)
                VALUES ($1, $2, $3)
                ON CONFLICT (source, block_number) DO UPDATE SET block_hash = EXCLUDED.block_hash
                ",
            )
            .bind(&changes.source)
            .bind(to_i64(*number, "block number")?)
            .bind(format_hash(hash))
            .execute(&mut *tx)
            .await?;
        }

        Self::write_cursor(&mut tx, &changes.source, &changes.cursor).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load_cursor(&self, source: &str) -> Result<Option<Cursor>> {
        let row = sqlx::query_as::<_, (i64, Option<i64>, String)>(
            "SELECT block_number, log_index, block_hash FROM _indexer_cursor WHERE source = $1",
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(block_number, log_index, hash)| {
            Ok(Cursor {
                block_number: to_u64(block_number, "block number")?,
                log_index: log_index.map(|idx| to_u64(idx, "log index")).transpose()?,
                block_hash: parse_hash(&hash)?,
            })
        })
        .transpose()
    }

    async fn block_hashes(&self, source: &str) -> Result<Vec<(u64, B256)>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT block_number, block_hash FROM _indexer_blocks \
             WHERE source = $1 ORDER BY block_number DESC",
        )
        .bind(source)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(number, hash)| Ok((to_u64(number, "block number")?, parse_hash(&hash)?)))
            .collect()
    }

    async fn rollback_to(&self, source: &str, ancestor: Cursor) -> Result<usize> {
        let ancestor_block = to_i64(ancestor.block_number, "block number")?;
        let mut tx = self.pool.begin().await?;

        let entries = sqlx::query_as::<_, (String, String, Option<Value>)>(
            "SELECT kind, entity_id, previous FROM _indexer_journal \
             WHERE source = $1 AND block_number > $2 ORDER BY seq DESC",
        )
        .bind(source)
        .bind(ancestor_block)
        .fetch_all(&mut *tx)
        .await?;

        for (kind, id, previous) in &entries {
            match previous {
                Some(previous) => Self::put_row(&mut tx, kind, id, previous).await?,
                None => {
                    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table(kind)))
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        sqlx::query("DELETE FROM _indexer_journal WHERE source = $1 AND block_number > $2")
            .bind(source)
            .bind(ancestor_block)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM _indexer_blocks WHERE source = $1 AND block_number > $2")
            .bind(source)
            .bind(ancestor_block)
            .execute(&mut *tx)
            .await?;

        Self::write_cursor(&mut tx, source, &ancestor).await?;
        tx.commit().await?;
        Ok(entries.len())
    }

    async fn prune_history(&self, source: &str, below: u64) -> Result<()> {
        let below = to_i64(below, "block number")?;
        sqlx::query("DELETE FROM _indexer_journal WHERE source = $1 AND block_number < $2")
            .bind(source)
            .bind(below)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM _indexer_blocks WHERE source = $1 AND block_number < $2")
            .bind(source)
            .bind(below)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Page> {
        let key_expr = match &query.sort {
            Some(field) => sort_expr(field),
            None => "id COLLATE \"C\"".to_string(),
        };
        let (direction, comparison) = match query.direction {
            SortDirection::Asc => ("ASC", ">"),
            SortDirection::Desc => ("DESC", "<"),
        };

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT id, data, {key_expr} AS sort_key FROM {} WHERE TRUE",
            table(kind)
        ));

        for (field, expected) in &query.filters {
            match filter_text(Some(expected)) {
                Some(text) => {
                    builder.push(format!(" AND data->>{} = ", literal(field)));
                    builder.push_bind(text);
                }
                None => {
                    builder.push(format!(" AND data->>{} IS NULL", literal(field)));
                }
            }
        }

        if let Some(after) = &query.after {
            builder.push(format!(" AND ({key_expr}, id COLLATE \"C\") {comparison} ("));
            builder.push_bind(after.sort_key.clone());
            builder.push(", ");
            builder.push_bind(after.id.clone());
            builder.push(")");
        }

        builder.push(format!(
            " ORDER BY {key_expr} {direction}, id COLLATE \"C\" {direction} LIMIT "
        ));
        builder.push_bind(to_i64(query.limit as u64 + 1, "page size")?);

        let mut rows: Vec<(String, Value, String)> =
            builder.build_query_as().fetch_all(&self.pool).await?;

        let has_more = rows.len() > query.limit;
        rows.truncate(query.limit);
        let next = if has_more {
            rows.last().map(|(id, _, key)| PageKey {
                sort_key: key.clone(),
                id: id.clone(),
            })
        } else {
            None
        };

        Ok(Page {
            items: rows.into_iter().map(|(_, data, _)| data).collect(),
            next,
        })
    }
}
