//! ABI-driven log decoder.
//!
//! Logs are matched by emitting address to a configured contract, then by
//! `topic0` to one of that contract's ABI events. Anything that does not
//! match is reported as [`NoMatch`], never as an error: deployed contracts
//! routinely emit less (or more) than their interface declares.

use crate::config::ContractConfig;
use crate::types::event::{DecodedEvent, EventArgs, EventMeta};
use crate::types::log::RawLog;
use alloy::dyn_abi::EventExt;
use alloy::json_abi::Event;
use alloy::primitives::{Address, B256};
use std::collections::HashMap;

/// Why a log produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoMatch {
    /// Emitted by an address that is not configured.
    UnknownContract,
    /// `topic0` is missing or not declared in the contract's ABI.
    UnknownTopic,
    /// Signature matched but topics/data do not decode against it.
    AbiMismatch(String),
}

/// Result of decoding one log.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(DecodedEvent),
    NoMatch(NoMatch),
}

#[derive(Debug)]
struct ContractEvents {
    name: String,
    events: HashMap<B256, Event>,
}

/// Stateless decoder over the configured contracts' ABIs.
#[derive(Debug)]
pub struct EventDecoder {
    contracts: HashMap<Address, ContractEvents>,
}

impl EventDecoder {
    #[must_use]
    pub fn new(contracts: &[ContractConfig]) -> Self {
        let contracts = contracts
            .iter()
            .map(|contract| {
                let events = contract
                    .abi
                    .events()
                    .filter(|event| !event.anonymous)
                    .map(|event| (event.selector(), event.clone()))
                    .collect();
                (
                    contract.address,
                    ContractEvents {
                        name: contract.name.clone(),
                        events,
                    },
                )
            })
            .collect();
        Self { contracts }
    }

    /// Configured name of the contract at `address`.
    #[must_use]
    pub fn contract_name(&self, address: &Address) -> Option<&str> {
        self.contracts.get(address).map(|c| c.name.as_str())
    }

    /// Whether `contract`'s ABI declares an event called `event`.
    #[must_use]
    pub fn declares(&self, contract: &str, event: &str) -> bool {
        self.contracts
            .values()
            .filter(|c| c.name == contract)
            .any(|c| c.events.values().any(|e| e.name == event))
    }

    /// Every (contract, event) pair the ABIs declare, sorted.
    #[must_use]
    pub fn declared_events(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .contracts
            .values()
            .flat_map(|c| c.events.values().map(|e| (c.name.clone(), e.name.clone())))
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }

    pub fn decode(&self, log: &RawLog) -> Decoded {
        let Some(contract) = self.contracts.get(&log.address) else {
            return Decoded::NoMatch(NoMatch::UnknownContract);
        };
        let Some(event) = log.topics.first().and_then(|t0| contract.events.get(t0)) else {
            return Decoded::NoMatch(NoMatch::UnknownTopic);
        };

        let decoded = match event.decode_log_parts(log.topics.iter().copied(), &log.data) {
            Ok(decoded) => decoded,
            Err(e) => return Decoded::NoMatch(NoMatch::AbiMismatch(e.to_string())),
        };

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut values = Vec::with_capacity(event.inputs.len());
        for (position, input) in event.inputs.iter().enumerate() {
            let value = if input.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let Some(value) = value else {
                return Decoded::NoMatch(NoMatch::AbiMismatch(format!(
                    "{} is missing argument {position}",
                    event.name
                )));
            };
            let name = if input.name.is_empty() {
                format!("arg{position}")
            } else {
                input.name.clone()
            };
            values.push((name, value));
        }

        Decoded::Event(DecodedEvent {
            contract: contract.name.clone(),
            name: event.name.clone(),
            args: EventArgs::new(values),
            meta: EventMeta {
                address: log.address,
                block_number: log.block_number,
                block_hash: log.block_hash,
                block_timestamp: log.block_timestamp.unwrap_or_default(),
                transaction_hash: log.transaction_hash,
                log_index: log.log_index,
            },
        })
    }
}
