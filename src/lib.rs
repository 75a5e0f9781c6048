//! `superhero-indexer` - indexes the Superhero idea marketplace.
//!
//! Builds on [`evm_indexer_sdk`]: this crate contributes the marketplace
//! data model ([`entities`]), one handler per contract ([`handlers`]) and the
//! profile read that enriches freshly created superheroes ([`enrichment`]).
//!
//! ```no_run
//! use evm_indexer_sdk::{Indexer, IndexerConfigBuilder, NetworkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IndexerConfigBuilder::new()
//!         .with_rpc("http://127.0.0.1:8545")
//!         .with_network(NetworkConfig::from_file("config/network.json")?)
//!         .build()?;
//!
//!     let mut indexer = Indexer::new(config).await?;
//!     superhero_indexer::register_handlers(&mut indexer)?;
//!     indexer.start().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod enrichment;
pub mod entities;
pub mod handlers;

use evm_indexer_sdk::{Indexer, Result};

/// Registers every marketplace handler on `indexer`.
///
/// # Errors
///
/// Fails on an invalid stablecoin configuration or a registry error.
pub fn register_handlers(indexer: &mut Indexer) -> Result<()> {
    let network = indexer.config().network.clone();
    handlers::register(indexer.handler_registry_mut(), &network)
}
