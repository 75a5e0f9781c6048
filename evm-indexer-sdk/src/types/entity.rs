//! Entity model: the trait stored types implement and their published schemas.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic type of an entity field, as exposed to query consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// 20-byte address in canonical lowercase hex.
    Address,
    /// 32-byte hash in lowercase hex.
    Hash,
    /// Arbitrary-precision unsigned integer, stored as a decimal string.
    BigInt,
    /// Integer that fits in 64 bits.
    Int,
    Bool,
    /// Ordered list of strings.
    StringList,
    /// Semi-structured JSON document.
    Json,
    /// Primary key of another entity kind (advisory, not enforced).
    Reference(&'static str),
}

/// One field of an entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

impl FieldDef {
    #[must_use]
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Name and field list of an entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySchema {
    pub name: &'static str,
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A stored record type.
///
/// Entities serialize to JSON objects whose keys match [`Entity::schema`].
/// Every entity carries an `id` field holding its primary key.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Logical table name.
    const KIND: &'static str;

    /// Primary key.
    fn id(&self) -> String;

    fn schema() -> EntitySchema;
}

/// Append-only audit record written with every handled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub id: String,
    pub contract: String,
    pub contract_address: String,
    pub event_name: String,
    pub args: Value,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub log_index: u64,
    pub timestamp: u64,
}

impl Entity for EventLog {
    const KIND: &'static str = "EventLog";

    fn id(&self) -> String {
        self.id.clone()
    }

    fn schema() -> EntitySchema {
        EntitySchema {
            name: Self::KIND,
            fields: vec![
                FieldDef::new("id", FieldType::String),
                FieldDef::new("contract", FieldType::String),
                FieldDef::new("contractAddress", FieldType::Address),
                FieldDef::new("eventName", FieldType::String),
                FieldDef::new("args", FieldType::Json),
                FieldDef::new("blockNumber", FieldType::Int),
                FieldDef::new("blockHash", FieldType::Hash),
                FieldDef::new("transactionHash", FieldType::Hash),
                FieldDef::new("logIndex", FieldType::Int),
                FieldDef::new("timestamp", FieldType::Int),
            ],
        }
    }
}
