//! Log source: bounded `eth_getLogs` windows over the configured contracts.
//!
//! The same code path serves backfill and live tail; the engine decides the
//! window. Logs come back in canonical order with timestamps filled in.

use crate::config::NetworkConfig;
use crate::types::log::{BlockHeader, RawLog};
use crate::utils::error::{IndexerError, Result};
use crate::utils::rpc::ChainProvider;
use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;

pub struct LogSource {
    provider: Arc<dyn ChainProvider>,
    addresses: Vec<Address>,
    /// Per-contract start block; earlier logs from that address are dropped.
    floors: HashMap<Address, u64>,
}

impl LogSource {
    #[must_use]
    pub fn new(provider: Arc<dyn ChainProvider>, network: &NetworkConfig) -> Self {
        let floors: HashMap<Address, u64> = network
            .contracts
            .iter()
            .map(|c| (c.address, c.start_block))
            .collect();
        let mut addresses: Vec<Address> = floors.keys().copied().collect();
        addresses.sort();
        Self {
            provider,
            addresses,
            floors,
        }
    }

    pub async fn chain_id(&self) -> Result<u64> {
        self.provider.chain_id().await
    }

    /// Current chain head.
    pub async fn head(&self) -> Result<u64> {
        self.provider.block_number().await
    }

    /// Canonical header at `number`, or `None` if the node does not have it.
    pub async fn header(&self, number: u64) -> Result<Option<BlockHeader>> {
        self.provider.block_header(number).await
    }

    /// Like [`header`](Self::header) but treats a missing block as an RPC error.
    pub async fn require_header(&self, number: u64) -> Result<BlockHeader> {
        self.header(number)
            .await?
            .ok_or_else(|| IndexerError::RpcError(format!("Block {number} not available")))
    }

    /// Logs in `[from, to]`, ordered by (block, log index).
    ///
    /// Removed logs and logs below their contract's start block are dropped.
    pub async fn fetch_range(&self, from: u64, to: u64) -> Result<Vec<RawLog>> {
        if from > to || self.addresses.is_empty() {
            return Ok(Vec::new());
        }

        let mut logs: Vec<RawLog> = self
            .provider
            .logs(from, to, &self.addresses)
            .await?
            .into_iter()
            .filter(|log| !log.removed)
            .filter(|log| {
                self.floors
                    .get(&log.address)
                    .is_some_and(|floor| log.block_number >= *floor)
            })
            .collect();
        logs.sort_by_key(RawLog::position);

        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        for log in &mut logs {
            if log.block_timestamp.is_some() {
                continue;
            }
            let timestamp = match timestamps.get(&log.block_number) {
                Some(ts) => *ts,
                None => {
                    let header = self.require_header(log.block_number).await?;
                    timestamps.insert(log.block_number, header.timestamp);
                    header.timestamp
                }
            };
            log.block_timestamp = Some(timestamp);
        }

        Ok(logs)
    }
}
