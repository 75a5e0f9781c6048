//! Read-only contract calls for handlers.
//!
//! Calls go to the undecorated provider: a failed or slow read is returned
//! to the handler as-is and is never retried here.

use crate::config::ContractConfig;
use crate::utils::error::{IndexerError, Result};
use crate::utils::rpc::ChainProvider;
use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// ABI-aware `eth_call` client bound to the configured contracts.
pub struct ChainReader {
    provider: Arc<dyn ChainProvider>,
    contracts: HashMap<String, (Address, JsonAbi)>,
    timeout: Duration,
}

impl ChainReader {
    #[must_use]
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        contracts: &[ContractConfig],
        timeout: Duration,
    ) -> Self {
        let contracts = contracts
            .iter()
            .map(|c| (c.name.clone(), (c.address, c.abi.clone())))
            .collect();
        Self {
            provider,
            contracts,
            timeout,
        }
    }

    /// Address of a configured contract.
    #[must_use]
    pub fn address_of(&self, contract: &str) -> Option<Address> {
        self.contracts.get(contract).map(|(address, _)| *address)
    }

    fn function(&self, contract: &str, method: &str, arity: usize) -> Result<(Address, &Function)> {
        let (address, abi) = self
            .contracts
            .get(contract)
            .ok_or_else(|| IndexerError::ConfigError(format!("Unknown contract '{contract}'")))?;
        let function = abi
            .function(method)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .ok_or_else(|| {
                IndexerError::ConfigError(format!(
                    "{contract} has no function {method} taking {arity} argument(s)"
                ))
            })?;
        Ok((*address, function))
    }

    /// Calls `contract.method(args)` against the state at `block`.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the contract or method is not in the configured ABIs
    /// - `Timeout` if the node does not answer within the reader timeout
    /// - `RpcError` if the call reverts or the transport fails
    /// - `DecodingError` if the returned data does not match the outputs
    pub async fn call(
        &self,
        contract: &str,
        method: &str,
        args: &[DynSolValue],
        block: u64,
    ) -> Result<Vec<DynSolValue>> {
        let (address, function) = self.function(contract, method, args.len())?;
        let input = function
            .abi_encode_input(args)
            .map_err(|e| IndexerError::DecodingError(format!("{contract}.{method} input: {e}")))?;

        let output = tokio::time::timeout(
            self.timeout,
            self.provider.call(address, Bytes::from(input), block),
        )
        .await
        .map_err(|_| {
            IndexerError::Timeout(format!(
                "{contract}.{method} at block {block} exceeded {}ms",
                self.timeout.as_millis()
            ))
        })??;

        function
            .abi_decode_output(&output)
            .map_err(|e| IndexerError::DecodingError(format!("{contract}.{method} output: {e}")))
    }
}
