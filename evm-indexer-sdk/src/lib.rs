//! `evm-indexer-sdk` - a reorg-aware event indexing engine for EVM chains.
//!
//! The SDK turns contract logs into application entities. You describe the
//! network (chain id, contract addresses, ABIs, start blocks), register one
//! handler per (contract, event) pair, and the engine does the rest:
//! windowed backfill, live tail, decoding, strictly ordered dispatch, atomic
//! commits and exact rollback on chain reorganizations.
//!
//! # Quick Start
//!
//! ```no_run
//! use async_trait::async_trait;
//! use evm_indexer_sdk::{
//!     DecodedEvent, Entity, EntitySchema, EventHandler, FieldDef, FieldType, HandlerContext,
//!     Indexer, IndexerConfigBuilder, NetworkConfig, Result,
//! };
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Counter {
//!     pub id: String,
//!     pub pings: u64,
//! }
//!
//! impl Entity for Counter {
//!     const KIND: &'static str = "Counter";
//!
//!     fn id(&self) -> String {
//!         self.id.clone()
//!     }
//!
//!     fn schema() -> EntitySchema {
//!         EntitySchema {
//!             name: Self::KIND,
//!             fields: vec![
//!                 FieldDef::new("id", FieldType::Address),
//!                 FieldDef::new("pings", FieldType::Int),
//!             ],
//!         }
//!     }
//! }
//!
//! pub struct PingHandler;
//!
//! #[async_trait]
//! impl EventHandler for PingHandler {
//!     async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
//!         let id = evm_indexer_sdk::format_address(&event.args.address("who")?);
//!         let mut counter = ctx
//!             .store
//!             .get::<Counter>(&id)
//!             .await?
//!             .unwrap_or(Counter { id, pings: 0 });
//!         counter.pings += 1;
//!         ctx.store.upsert(&counter).await
//!     }
//!
//!     fn schemas(&self) -> Vec<EntitySchema> {
//!         vec![Counter::schema()]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     dotenvy::dotenv().ok();
//!
//!     let config = IndexerConfigBuilder::new()
//!         .with_rpc(std::env::var("RPC_URL")?)
//!         .with_network(NetworkConfig::from_file("config/network.json")?)
//!         .build()?;
//!
//!     let mut indexer = Indexer::new(config).await?;
//!     indexer.register_handler("Pinger", "Ping", Arc::new(PingHandler))?;
//!     indexer.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! 1. **`LogSource`** - bounded `eth_getLogs` windows with retry and backoff
//! 2. **`EventDecoder`** - ABI-driven decoding; unknown logs are dropped
//! 3. **`HandlerRegistry`** - routes (contract, event) pairs to handlers
//! 4. **`EventHandler`** - user logic, staged in a `StoreTx`
//! 5. **`ChainReader`** - read-only contract calls with a timeout
//! 6. **`EntityStore`** - `PostgreSQL` or in-memory, with a rollback journal
//! 7. **`QuerySurface`** - get / list / filter / sort / page over committed state
//!
//! Writes of one handler invocation, its audit record and the advanced
//! cursor are committed together, so a restart never reprocesses or skips a
//! log and readers never observe half an event.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Public API exports
pub use config::{
    parse_address, ContractConfig, IndexerConfig, IndexerConfigBuilder, NetworkConfig,
    RegistryConfig, RetryConfig,
};
pub use core::decoder::{Decoded, EventDecoder, NoMatch};
pub use core::indexer::{Indexer, IndexerHandle, IndexerState, Progress};
pub use core::query::{ListRequest, QueryPage, QuerySurface};
pub use core::reader::ChainReader;
pub use core::registry::{EventHandler, HandlerContext, HandlerRegistry};
pub use core::source::LogSource;
pub use storage::{
    ChangeSet, EntityStore, EntityWrite, ListQuery, MemoryStore, Page, PageKey, PostgresStore,
    SortDirection, StoreTx,
};
pub use types::entity::{Entity, EntitySchema, EventLog, FieldDef, FieldType};
pub use types::event::{
    decode_fixed_string, format_address, format_hash, u256_to_u64, value_as_address,
    value_as_bool, value_as_string, value_as_string_list, value_as_uint, value_to_json,
    DecodedEvent, EventArgs, EventMeta,
};
pub use types::log::{BlockHeader, Cursor, RawLog};
pub use utils::cache::TtlCache;
pub use utils::error::{IndexerError, Result};
pub use utils::retry::RetryingProvider;
pub use utils::rpc::{AlloyProvider, ChainProvider};

// Module declarations
pub mod config;
pub mod core;
pub mod storage;
#[cfg(feature = "telemetry")]
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod utils;
