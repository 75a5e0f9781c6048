//! Platform-wide counters.
//!
//! Callers record a delta only when they actually created the entity it
//! counts, so replays and duplicate deliveries never inflate the totals.

use crate::entities::PlatformStats;
use alloy::primitives::U256;
use evm_indexer_sdk::{IndexerError, Result, StoreTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsDelta {
    Superhero,
    Idea,
    Team,
    Rating,
    Purchase { price: U256 },
}

fn parse_amount(text: &str) -> Result<U256> {
    text.parse::<U256>()
        .map_err(|e| IndexerError::DataError(format!("Stored amount '{text}' is not an integer: {e}")))
}

/// Applies `delta` to the all-time counters.
pub async fn record(store: &mut StoreTx, delta: StatsDelta, timestamp: u64) -> Result<()> {
    let mut stats = store
        .get::<PlatformStats>(PlatformStats::ALL_TIME)
        .await?
        .unwrap_or_else(|| PlatformStats::empty(PlatformStats::ALL_TIME));

    match delta {
        StatsDelta::Superhero => stats.total_superheroes += 1,
        StatsDelta::Idea => stats.total_ideas += 1,
        StatsDelta::Team => stats.total_teams += 1,
        StatsDelta::Rating => stats.total_ratings += 1,
        StatsDelta::Purchase { price } => {
            stats.total_purchases += 1;
            let volume = parse_amount(&stats.total_volume)?.saturating_add(price);
            stats.total_volume = volume.to_string();
        }
    }
    stats.updated_at = stats.updated_at.max(timestamp);
    store.upsert(&stats).await
}
