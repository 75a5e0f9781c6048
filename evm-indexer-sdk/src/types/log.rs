//! Raw chain data as delivered by the log source, and the engine cursor.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// A log exactly as returned by `eth_getLogs`, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: B256,
    /// Filled from the block header when the node omits it.
    pub block_timestamp: Option<u64>,
    pub transaction_hash: B256,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Set by the node for logs dropped from the canonical chain.
    pub removed: bool,
}

impl RawLog {
    /// Ordering key: (block number, log index).
    #[must_use]
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// The subset of a block header the engine needs for reorg detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
}

/// Durable bookmark of the last fully processed log position.
///
/// `log_index == None` means every log of `block_number` has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub block_number: u64,
    pub log_index: Option<u64>,
    pub block_hash: B256,
}

impl Cursor {
    /// Cursor pointing just after the given log.
    #[must_use]
    pub fn at_log(block_number: u64, log_index: u64, block_hash: B256) -> Self {
        Self {
            block_number,
            log_index: Some(log_index),
            block_hash,
        }
    }

    /// Cursor pointing at the end of a fully processed block.
    #[must_use]
    pub fn block_end(block_number: u64, block_hash: B256) -> Self {
        Self {
            block_number,
            log_index: None,
            block_hash,
        }
    }

    /// Returns `true` if the log at `(block, log_index)` was already processed.
    #[must_use]
    pub fn covers(&self, block: u64, log_index: u64) -> bool {
        match block.cmp(&self.block_number) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => match self.log_index {
                None => true,
                Some(idx) => log_index <= idx,
            },
        }
    }

    /// First block that still needs to be fetched.
    ///
    /// A cursor in the middle of a block resumes that same block.
    #[must_use]
    pub fn resume_block(&self) -> u64 {
        match self.log_index {
            Some(_) => self.block_number,
            None => self.block_number + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_covers_mid_block() {
        let cursor = Cursor::at_log(100, 3, B256::ZERO);
        assert!(cursor.covers(99, 50));
        assert!(cursor.covers(100, 3));
        assert!(!cursor.covers(100, 4));
        assert!(!cursor.covers(101, 0));
        assert_eq!(cursor.resume_block(), 100);
    }

    #[test]
    fn test_cursor_covers_block_end() {
        let cursor = Cursor::block_end(100, B256::ZERO);
        assert!(cursor.covers(100, 999));
        assert!(!cursor.covers(101, 0));
        assert_eq!(cursor.resume_block(), 101);
    }
}
