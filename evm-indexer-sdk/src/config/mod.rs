//! Configuration management for the indexer.
//!
//! This module provides a flexible configuration system using the builder pattern,
//! plus the static network description (chain id and contract set) loaded from JSON.

use crate::utils::error::{IndexerError, Result};
use alloy::json_abi::JsonAbi;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Configuration for registry memory limits and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Max number of (contract, event) handler registrations (0 = unlimited).
    pub max_handlers: usize,
    /// Enable runtime metrics logging.
    pub enable_metrics: bool,
}

/// Configuration for retry behaviour on transient RPC failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Randomise each delay by ±25 %.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 250,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
            jitter: true,
        }
    }
}

/// One indexed contract.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    /// Identifier used for handler registration (e.g. `"IdeaRegistry"`).
    pub name: String,
    pub address: Address,
    pub abi: JsonAbi,
    /// First block whose logs are relevant for this contract.
    pub start_block: u64,
    /// Token decimals, for currency contracts.
    pub decimals: Option<u8>,
}

impl ContractConfig {
    /// Builds a contract entry from an address string and ABI JSON text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` for a malformed address and `ConfigError`
    /// if the ABI cannot be parsed.
    pub fn new(
        name: impl Into<String>,
        address: &str,
        abi_json: &str,
        start_block: u64,
    ) -> Result<Self> {
        let name = name.into();
        let address = parse_address(address)?;
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| IndexerError::ConfigError(format!("Invalid ABI for '{name}': {e}")))?;
        Ok(Self {
            name,
            address,
            abi,
            start_block,
            decimals: None,
        })
    }

    #[must_use]
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }
}

/// Parses an address string into its 20-byte form.
pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| IndexerError::InvalidAddress(format!("'{value}': {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkFile {
    name: String,
    chain_id: u64,
    contracts: Vec<ContractFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractFile {
    name: String,
    address: String,
    /// Path to the ABI file, relative to the network file.
    abi: String,
    start_block: u64,
    #[serde(default)]
    decimals: Option<u8>,
}

/// Static description of the indexed network, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub contracts: Vec<ContractConfig>,
}

impl NetworkConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, chain_id: u64, contracts: Vec<ContractConfig>) -> Self {
        Self {
            name: name.into(),
            chain_id,
            contracts,
        }
    }

    /// Loads a network file and the ABI files it references.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or if the
    /// contract set is invalid (see [`NetworkConfig::validate`]).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::ConfigError(format!("Cannot read network config {}: {e}", path.display()))
        })?;
        let file: NetworkFile = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut contracts = Vec::with_capacity(file.contracts.len());
        for entry in file.contracts {
            let abi_path = base.join(&entry.abi);
            let abi_json = std::fs::read_to_string(&abi_path).map_err(|e| {
                IndexerError::ConfigError(format!("Cannot read ABI {}: {e}", abi_path.display()))
            })?;
            let mut contract =
                ContractConfig::new(entry.name, &entry.address, &abi_json, entry.start_block)?;
            contract.decimals = entry.decimals;
            contracts.push(contract);
        }

        let config = Self::new(file.name, file.chain_id, contracts);
        config.validate()?;
        Ok(config)
    }

    /// Checks that the contract set is non-empty with unique names and addresses.
    pub fn validate(&self) -> Result<()> {
        if self.contracts.is_empty() {
            return Err(IndexerError::ConfigError(format!(
                "Network '{}' has no contracts",
                self.name
            )));
        }
        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        for contract in &self.contracts {
            if !names.insert(contract.name.as_str()) {
                return Err(IndexerError::ConfigError(format!(
                    "Duplicate contract name '{}'",
                    contract.name
                )));
            }
            if !addresses.insert(contract.address) {
                return Err(IndexerError::ConfigError(format!(
                    "Duplicate contract address {}",
                    contract.address
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn contract(&self, name: &str) -> Option<&ContractConfig> {
        self.contracts.iter().find(|c| c.name == name)
    }

    /// Lowest configured start block; the global scan begins here.
    #[must_use]
    pub fn start_block(&self) -> u64 {
        self.contracts
            .iter()
            .map(|c| c.start_block)
            .min()
            .unwrap_or_default()
    }
}

/// Configuration for an indexer instance.
///
/// Use [`IndexerConfigBuilder`] to construct instances of this struct.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// `PostgreSQL` URL; `None` keeps entities in memory.
    pub database_url: Option<String>,

    /// Chain id and contract set.
    pub network: NetworkConfig,

    /// Delay between polls once caught up, in milliseconds (default: 2000)
    pub poll_interval_ms: u64,

    /// Max block span per `eth_getLogs` request (default: 500)
    pub batch_size: u64,

    /// Blocks to stay behind the head (default: 0)
    pub confirmations: u64,

    /// Depth of retained reorg history in blocks (default: 128)
    pub finality_depth: u64,

    /// Timeout for a single provider request, in milliseconds (default: 15000)
    pub request_timeout_ms: u64,

    /// Timeout for a handler's contract read, in milliseconds (default: 5000)
    pub reader_timeout_ms: u64,

    /// Retry policy for the log source.
    pub retry: RetryConfig,

    /// Registry configuration (limits and metrics)
    pub registry: RegistryConfig,
}

impl IndexerConfig {
    /// Name under which the cursor and reorg history are persisted.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.network.name
    }
}

/// Builder for [`IndexerConfig`].
///
/// # Example
///
/// ```no_run
/// use evm_indexer_sdk::{IndexerConfigBuilder, NetworkConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let network = NetworkConfig::from_file("config/network.json")?;
///     let config = IndexerConfigBuilder::new()
///         .with_rpc("http://127.0.0.1:8545")
///         .with_network(network)
///         .with_batch_size(1000)
///         .build()?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct IndexerConfigBuilder {
    rpc_url: Option<String>,
    database_url: Option<String>,
    network: Option<NetworkConfig>,
    poll_interval_ms: Option<u64>,
    batch_size: Option<u64>,
    confirmations: Option<u64>,
    finality_depth: Option<u64>,
    request_timeout_ms: Option<u64>,
    reader_timeout_ms: Option<u64>,
    retry: Option<RetryConfig>,
    registry: Option<RegistryConfig>,
}

impl IndexerConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the JSON-RPC endpoint URL.
    #[must_use]
    pub fn with_rpc(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// Sets the `PostgreSQL` connection URL.
    #[must_use]
    pub fn with_database(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn with_poll_interval_ms(mut self, millis: u64) -> Self {
        self.poll_interval_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, blocks: u64) -> Self {
        self.batch_size = Some(blocks);
        self
    }

    #[must_use]
    pub fn with_confirmations(mut self, blocks: u64) -> Self {
        self.confirmations = Some(blocks);
        self
    }

    #[must_use]
    pub fn with_finality_depth(mut self, blocks: u64) -> Self {
        self.finality_depth = Some(blocks);
        self
    }

    #[must_use]
    pub fn with_request_timeout_ms(mut self, millis: u64) -> Self {
        self.request_timeout_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn with_reader_timeout_ms(mut self, millis: u64) -> Self {
        self.reader_timeout_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    #[must_use]
    pub fn with_registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry = Some(config);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` if:
    /// - The RPC URL or network is missing
    /// - The batch size or finality depth is zero
    /// - The network's contract set is invalid
    pub fn build(self) -> Result<IndexerConfig> {
        let rpc_url = self
            .rpc_url
            .ok_or_else(|| IndexerError::ConfigError("RPC URL is required".to_string()))?;
        let network = self
            .network
            .ok_or_else(|| IndexerError::ConfigError("Network config is required".to_string()))?;
        network.validate()?;

        let batch_size = self.batch_size.unwrap_or(500);
        if batch_size == 0 {
            return Err(IndexerError::ConfigError(
                "Batch size must be at least 1 block".to_string(),
            ));
        }
        let finality_depth = self.finality_depth.unwrap_or(128);
        if finality_depth == 0 {
            return Err(IndexerError::ConfigError(
                "Finality depth must be at least 1 block".to_string(),
            ));
        }

        Ok(IndexerConfig {
            rpc_url,
            database_url: self.database_url,
            network,
            poll_interval_ms: self.poll_interval_ms.unwrap_or(2_000),
            batch_size,
            confirmations: self.confirmations.unwrap_or(0),
            finality_depth,
            request_timeout_ms: self.request_timeout_ms.unwrap_or(15_000),
            reader_timeout_ms: self.reader_timeout_ms.unwrap_or(5_000),
            retry: self.retry.unwrap_or_default(),
            registry: self.registry.unwrap_or_default(),
        })
    }
}
