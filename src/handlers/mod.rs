//! Event handlers for the Superhero contracts.
//!
//! One handler per contract, registered for the events it reacts to.
//! Events the contracts declare but nothing reacts to yet (`IdeaListed`,
//! `PlatformFeeUpdated`, `MemberLeft`) are simply left unregistered; the
//! engine drops them after decoding.

pub mod ideas;
pub mod marketplace;
pub mod stats;
pub mod superhero;
pub mod teams;
pub mod tokens;

use crate::enrichment::ProfileEnricher;
use alloy::primitives::Address;
use evm_indexer_sdk::{
    format_address, DecodedEvent, HandlerRegistry, IndexerError, NetworkConfig, Result,
};
use std::sync::Arc;

pub use ideas::IdeaHandler;
pub use marketplace::MarketplaceHandler;
pub use superhero::SuperheroHandler;
pub use teams::TeamHandler;
pub use tokens::{CurrencyHandler, NftTransferHandler};

pub const SUPERHERO_NFT: &str = "SuperheroNFT";
pub const IDEA_REGISTRY: &str = "IdeaRegistry";
pub const MARKETPLACE: &str = "Marketplace";
pub const TEAM_CORE: &str = "TeamCore";
pub const USDC: &str = "USDC";

/// Smallest-unit scale every stablecoin amount is stored in.
pub const USDC_DECIMALS: u8 = 6;

/// Registers every handler for the contracts present in `network`.
///
/// # Errors
///
/// Returns `ConfigError` if the stablecoin is configured with a scale other
/// than [`USDC_DECIMALS`], and propagates registry errors (duplicates,
/// capacity).
pub fn register(registry: &mut HandlerRegistry, network: &NetworkConfig) -> Result<()> {
    if let Some(usdc) = network.contract(USDC) {
        if usdc.decimals != Some(USDC_DECIMALS) {
            return Err(IndexerError::ConfigError(format!(
                "{USDC} must be configured with {USDC_DECIMALS} decimals, got {:?}",
                usdc.decimals
            )));
        }
    }
    let address_of = |name: &str| network.contract(name).map(|c| c.address);

    if network.contract(SUPERHERO_NFT).is_some() {
        registry.register_all(
            SUPERHERO_NFT,
            &["SuperheroCreated", "RoleGranted", "RoleRevoked"],
            Arc::new(SuperheroHandler::new(ProfileEnricher::default())),
        )?;
        registry.register(SUPERHERO_NFT, "Transfer", Arc::new(NftTransferHandler))?;
    }
    if network.contract(IDEA_REGISTRY).is_some() {
        registry.register_all(
            IDEA_REGISTRY,
            &["IdeaCreated", "IdeaRated"],
            Arc::new(IdeaHandler),
        )?;
    }
    if network.contract(MARKETPLACE).is_some() {
        registry.register(MARKETPLACE, "IdeaPurchased", Arc::new(MarketplaceHandler))?;
    }
    if network.contract(TEAM_CORE).is_some() {
        registry.register_all(
            TEAM_CORE,
            &["TeamCreated", "MemberJoined", "TeamStatusChanged"],
            Arc::new(TeamHandler),
        )?;
    }
    if network.contract(USDC).is_some() {
        let currency = CurrencyHandler::new(address_of(MARKETPLACE), address_of(TEAM_CORE));
        registry.register_all(USDC, &["Transfer", "Approval"], Arc::new(currency))?;
    }
    Ok(())
}

// ── argument helpers ──────────────────────────────────────────────────────────

/// Address argument in canonical text form.
pub(crate) fn address_arg(event: &DecodedEvent, name: &str) -> Result<String> {
    Ok(format_address(&event.args.address(name)?))
}

/// Integer identifier argument as its decimal string.
pub(crate) fn id_arg(event: &DecodedEvent, name: &str) -> Result<String> {
    Ok(event.args.uint(name)?.to_string())
}

/// Event timestamp argument, falling back to the block timestamp when absent.
pub(crate) fn timestamp_arg(event: &DecodedEvent) -> Result<u64> {
    match event.args.get("timestamp") {
        Some(_) => event.args.u64("timestamp"),
        None => Ok(event.meta.block_timestamp),
    }
}

pub(crate) fn is_zero(address: &Address) -> bool {
    *address == Address::ZERO
}
