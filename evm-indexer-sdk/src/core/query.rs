//! Read-only query surface over the entity store.
//!
//! Exposes the entity kinds with their field lists plus get and list
//! (equality filters, sort and direction, opaque page tokens). Reads only
//! ever see committed state.

use crate::storage::{EntityStore, ListQuery, PageKey, SortDirection};
use crate::types::entity::{EntitySchema, FieldType};
use crate::utils::error::{IndexerError, Result};
use alloy::hex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 1_000;

/// A list request as received from an external consumer.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Equality filters: `(field, value)`; all must match.
    pub filters: Vec<(String, Value)>,
    /// Sort field; defaults to the primary key.
    pub sort: Option<String>,
    pub direction: SortDirection,
    /// Defaults to [`DEFAULT_PAGE_SIZE`], capped at [`MAX_PAGE_SIZE`].
    pub page_size: Option<usize>,
    /// Token from the previous page's `next_page_token`.
    pub page_token: Option<String>,
}

impl ListRequest {
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(field.into());
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn after(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Value>,
    /// `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Cheap to clone; shares the store with the running engine.
#[derive(Clone)]
pub struct QuerySurface {
    store: Arc<dyn EntityStore>,
    schemas: Arc<BTreeMap<&'static str, EntitySchema>>,
}

fn is_scalar(ty: FieldType) -> bool {
    !matches!(ty, FieldType::StringList | FieldType::Json)
}

fn encode_token(key: &PageKey) -> Result<String> {
    Ok(hex::encode(serde_json::to_vec(key)?))
}

fn decode_token(token: &str) -> Result<PageKey> {
    let bytes = hex::decode(token)
        .map_err(|_| IndexerError::QueryError("Malformed page token".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| IndexerError::QueryError("Malformed page token".to_string()))
}

impl QuerySurface {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, schemas: Vec<EntitySchema>) -> Self {
        let schemas = schemas.into_iter().map(|s| (s.name, s)).collect();
        Self {
            store,
            schemas: Arc::new(schemas),
        }
    }

    /// Every queryable kind with its field list, sorted by name.
    #[must_use]
    pub fn kinds(&self) -> Vec<&EntitySchema> {
        self.schemas.values().collect()
    }

    #[must_use]
    pub fn schema(&self, kind: &str) -> Option<&EntitySchema> {
        self.schemas.get(kind)
    }

    fn require_schema(&self, kind: &str) -> Result<&EntitySchema> {
        self.schema(kind)
            .ok_or_else(|| IndexerError::QueryError(format!("Unknown entity kind '{kind}'")))
    }

    fn scalar_field(schema: &EntitySchema, field: &str, purpose: &str) -> Result<FieldType> {
        let def = schema.field(field).ok_or_else(|| {
            IndexerError::QueryError(format!("{} has no field '{field}'", schema.name))
        })?;
        if !is_scalar(def.ty) {
            return Err(IndexerError::QueryError(format!(
                "Cannot {purpose} {}.{field}",
                schema.name
            )));
        }
        Ok(def.ty)
    }

    /// Point lookup by primary key.
    pub async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        self.require_schema(kind)?;
        self.store.get(kind, id).await
    }

    pub async fn list(&self, kind: &str, request: ListRequest) -> Result<QueryPage> {
        let schema = self.require_schema(kind)?;

        let mut filters = Vec::with_capacity(request.filters.len());
        for (field, value) in request.filters {
            let ty = Self::scalar_field(schema, &field, "filter on")?;
            let value = match (ty, value) {
                (FieldType::Address | FieldType::Hash, Value::String(s)) => {
                    Value::String(s.to_lowercase())
                }
                (FieldType::BigInt, Value::Number(n)) => Value::String(n.to_string()),
                (_, value) => value,
            };
            filters.push((field, value));
        }

        if let Some(field) = &request.sort {
            Self::scalar_field(schema, field, "sort by")?;
        }

        let limit = request
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let after = request.page_token.as_deref().map(decode_token).transpose()?;

        let query = ListQuery {
            filters,
            sort: request.sort,
            direction: request.direction,
            limit,
            after,
        };
        let page = self.store.list(kind, &query).await?;
        let next_page_token = page.next.as_ref().map(encode_token).transpose()?;
        Ok(QueryPage {
            items: page.items,
            next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::entity::FieldDef;
    use serde_json::json;

    fn surface() -> (Arc<MemoryStore>, QuerySurface) {
        let store = Arc::new(MemoryStore::new());
        let schema = EntitySchema {
            name: "Idea",
            fields: vec![
                FieldDef::new("id", FieldType::String),
                FieldDef::new("creator", FieldType::Address),
                FieldDef::new("price", FieldType::BigInt),
                FieldDef::new("isPurchased", FieldType::Bool),
                FieldDef::new("categories", FieldType::StringList),
            ],
        };
        let surface = QuerySurface::new(store.clone(), vec![schema]);
        (store, surface)
    }

    #[tokio::test]
    async fn test_pages_until_exhausted() {
        let (store, surface) = surface();
        for i in 0..5u64 {
            store.put_raw(
                "Idea",
                &i.to_string(),
                json!({"id": i.to_string(), "price": (i * 100).to_string(), "isPurchased": false}),
            );
        }

        let mut seen = Vec::new();
        let mut request = ListRequest::default()
            .sort_by("price", SortDirection::Desc)
            .page_size(2);
        loop {
            let page = surface.list("Idea", request.clone()).await.unwrap();
            seen.extend(page.items.iter().map(|v| v["id"].as_str().unwrap().to_string()));
            match page.next_page_token {
                Some(token) => request = request.after(token),
                None => break,
            }
        }
        assert_eq!(seen, vec!["4", "3", "2", "1", "0"]);
    }

    #[tokio::test]
    async fn test_address_filter_is_case_insensitive() {
        let (store, surface) = surface();
        store.put_raw("Idea", "1", json!({"id": "1", "creator": "0xabc0000000000000000000000000000000000001"}));
        store.put_raw("Idea", "2", json!({"id": "2", "creator": "0xdef0000000000000000000000000000000000002"}));

        let page = surface
            .list(
                "Idea",
                ListRequest::default().filter("creator", "0xABC0000000000000000000000000000000000001"),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["id"], "1");
    }

    #[tokio::test]
    async fn test_rejects_unknown_kind_and_fields() {
        let (_, surface) = surface();
        assert!(surface.get("Nope", "1").await.is_err());
        assert!(surface
            .list("Idea", ListRequest::default().filter("nope", true))
            .await
            .is_err());
        assert!(surface
            .list("Idea", ListRequest::default().sort_by("categories", SortDirection::Asc))
            .await
            .is_err());
        assert!(surface
            .list("Idea", ListRequest::default().after("zz"))
            .await
            .is_err());
    }

    #[test]
    fn test_kinds_expose_field_types() {
        let (_, surface) = surface();
        let kinds = surface.kinds();
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds[0].field("price").unwrap().ty, FieldType::BigInt);
    }
}
