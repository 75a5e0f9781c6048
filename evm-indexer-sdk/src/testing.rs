//! In-memory chain for driving the engine in tests and benchmarks.
//!
//! Blocks are mined explicitly. Hashes are derived from the block number,
//! the parent hash and a fork counter, so re-mining a height after
//! [`MockChain::reorg`] yields a different hash just like a real reorg.

use crate::types::log::{BlockHeader, RawLog};
use crate::utils::error::{IndexerError, Result};
use crate::utils::rpc::ChainProvider;
use alloy::primitives::{keccak256, Address, Bytes, LogData, B256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Timestamp of block 0; each block adds 12 seconds.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
struct MinedBlock {
    header: BlockHeader,
    logs: Vec<RawLog>,
}

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<MinedBlock>,
    fork: u64,
    call_responses: HashMap<Address, Bytes>,
    calls: u64,
    failing_log_requests: u32,
}

#[derive(Debug)]
pub struct MockChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl MockChain {
    /// A chain holding only the genesis block.
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        let chain = Self {
            chain_id,
            state: Mutex::new(ChainState::default()),
        };
        chain.mine(Vec::new());
        chain
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a block containing `logs` in order. Returns its number.
    pub fn mine(&self, logs: Vec<(Address, LogData)>) -> u64 {
        let mut state = self.lock();
        let number = state.blocks.len() as u64;
        let parent_hash = state
            .blocks
            .last()
            .map_or(B256::ZERO, |block| block.header.hash);

        let mut seed = Vec::with_capacity(48);
        seed.extend_from_slice(&number.to_be_bytes());
        seed.extend_from_slice(&state.fork.to_be_bytes());
        seed.extend_from_slice(parent_hash.as_slice());
        let hash = keccak256(&seed);

        let header = BlockHeader {
            number,
            hash,
            parent_hash,
            timestamp: GENESIS_TIMESTAMP + number * 12,
        };

        let logs = logs
            .into_iter()
            .enumerate()
            .map(|(index, (address, data))| {
                let mut tx_seed = hash.to_vec();
                tx_seed.extend_from_slice(&(index as u64).to_be_bytes());
                let (topics, data) = data.split();
                RawLog {
                    address,
                    topics,
                    data,
                    block_number: number,
                    block_hash: hash,
                    block_timestamp: None,
                    transaction_hash: keccak256(&tx_seed),
                    log_index: index as u64,
                    removed: false,
                }
            })
            .collect();

        state.blocks.push(MinedBlock { header, logs });
        number
    }

    /// Mines empty blocks until the head is at least `number`.
    pub fn mine_empty_until(&self, number: u64) {
        while self.head() < number {
            self.mine(Vec::new());
        }
    }

    /// Drops every block from `from_block` upwards; later mining forks off.
    pub fn reorg(&self, from_block: u64) {
        let mut state = self.lock();
        let keep = usize::try_from(from_block.max(1)).unwrap_or(usize::MAX);
        state.blocks.truncate(keep);
        state.fork += 1;
    }

    #[must_use]
    pub fn head(&self) -> u64 {
        self.lock().blocks.len() as u64 - 1
    }

    /// Hash of the canonical block at `number`.
    #[must_use]
    pub fn hash_of(&self, number: u64) -> Option<B256> {
        let state = self.lock();
        usize::try_from(number)
            .ok()
            .and_then(|n| state.blocks.get(n))
            .map(|block| block.header.hash)
    }

    /// Makes every `eth_call` to `to` return `response`.
    pub fn set_call_response(&self, to: Address, response: Bytes) {
        self.lock().call_responses.insert(to, response);
    }

    /// Number of `eth_call` requests served (including failed ones).
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.lock().calls
    }

    /// Makes the next `n` log requests fail with a transient error.
    pub fn fail_next_log_requests(&self, n: u32) {
        self.lock().failing_log_requests = n;
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.head())
    }

    async fn block_header(&self, number: u64) -> Result<Option<BlockHeader>> {
        let state = self.lock();
        Ok(usize::try_from(number)
            .ok()
            .and_then(|n| state.blocks.get(n))
            .map(|block| block.header))
    }

    async fn logs(&self, from: u64, to: u64, addresses: &[Address]) -> Result<Vec<RawLog>> {
        let mut state = self.lock();
        if state.failing_log_requests > 0 {
            state.failing_log_requests -= 1;
            return Err(IndexerError::RpcError("connection reset".to_string()));
        }
        Ok(state
            .blocks
            .iter()
            .filter(|block| (from..=to).contains(&block.header.number))
            .flat_map(|block| block.logs.iter())
            .filter(|log| addresses.contains(&log.address))
            .cloned()
            .collect())
    }

    async fn call(&self, to: Address, _data: Bytes, block: u64) -> Result<Bytes> {
        let mut state = self.lock();
        state.calls += 1;
        if block >= state.blocks.len() as u64 {
            return Err(IndexerError::RpcError(format!("unknown block {block}")));
        }
        state
            .call_responses
            .get(&to)
            .cloned()
            .ok_or_else(|| IndexerError::RpcError("execution reverted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorg_changes_hashes_from_fork_point() {
        let chain = MockChain::new(1);
        chain.mine_empty_until(5);
        let before: Vec<B256> = (0..=5).filter_map(|n| chain.hash_of(n)).collect();

        chain.reorg(3);
        assert_eq!(chain.head(), 2);
        chain.mine_empty_until(5);

        for n in 0..3 {
            assert_eq!(chain.hash_of(n), Some(before[n as usize]));
        }
        for n in 3..=5 {
            assert_ne!(chain.hash_of(n), Some(before[n as usize]));
        }
    }

    #[tokio::test]
    async fn test_failing_log_requests() {
        let chain = MockChain::new(1);
        chain.fail_next_log_requests(1);
        assert!(chain.logs(0, 0, &[]).await.is_err());
        assert!(chain.logs(0, 0, &[]).await.is_ok());
    }
}
