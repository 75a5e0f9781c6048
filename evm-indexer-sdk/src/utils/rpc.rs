use alloy::eips::BlockId;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log, TransactionInput, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use crate::types::log::{BlockHeader, RawLog};
use crate::utils::error::{IndexerError, Result};

/// The chain access the engine needs.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Latest block number.
    async fn block_number(&self) -> Result<u64>;

    /// Header of block `number`, or `None` if the node does not know it.
    async fn block_header(&self, number: u64) -> Result<Option<BlockHeader>>;

    /// Logs emitted by `addresses` in the inclusive range `[from, to]`.
    async fn logs(&self, from: u64, to: u64, addresses: &[Address]) -> Result<Vec<RawLog>>;

    /// `eth_call` against `to` at block `block`.
    async fn call(&self, to: Address, data: Bytes, block: u64) -> Result<Bytes>;
}

#[async_trait]
impl<T: ChainProvider + ?Sized> ChainProvider for Arc<T> {
    async fn chain_id(&self) -> Result<u64> {
        (**self).chain_id().await
    }

    async fn block_number(&self) -> Result<u64> {
        (**self).block_number().await
    }

    async fn block_header(&self, number: u64) -> Result<Option<BlockHeader>> {
        (**self).block_header(number).await
    }

    async fn logs(&self, from: u64, to: u64, addresses: &[Address]) -> Result<Vec<RawLog>> {
        (**self).logs(from, to, addresses).await
    }

    async fn call(&self, to: Address, data: Bytes, block: u64) -> Result<Bytes> {
        (**self).call(to, data, block).await
    }
}

/// [`ChainProvider`] over an `alloy` HTTP provider.
///
/// Every request is bounded by `timeout`; expiry surfaces as
/// `IndexerError::Timeout`.
pub struct AlloyProvider {
    inner: DynProvider,
    timeout: Duration,
}

impl AlloyProvider {
    /// Creates a provider for an HTTP(S) endpoint.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| IndexerError::ConfigError(format!("Invalid RPC URL '{rpc_url}': {e}")))?;
        let inner = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { inner, timeout })
    }

    async fn timed<T, E, F>(&self, what: &str, fut: F) -> Result<T>
    where
        E: std::fmt::Display,
        F: std::future::Future<Output = std::result::Result<T, E>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(IndexerError::RpcError(format!("{what}: {e}"))),
            Err(_) => Err(IndexerError::Timeout(format!(
                "{what} exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

fn convert_log(log: Log) -> Option<RawLog> {
    Some(RawLog {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number: log.block_number?,
        block_hash: log.block_hash?,
        block_timestamp: log.block_timestamp,
        transaction_hash: log.transaction_hash?,
        log_index: log.log_index?,
        removed: log.removed,
    })
}

#[async_trait]
impl ChainProvider for AlloyProvider {
    async fn chain_id(&self) -> Result<u64> {
        self.timed("eth_chainId", self.inner.get_chain_id()).await
    }

    async fn block_number(&self) -> Result<u64> {
        self.timed("eth_blockNumber", self.inner.get_block_number())
            .await
    }

    async fn block_header(&self, number: u64) -> Result<Option<BlockHeader>> {
        let block = self
            .timed(
                "eth_getBlockByNumber",
                self.inner
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .into_future(),
            )
            .await?;
        Ok(block.map(|block| BlockHeader {
            number: block.header.number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
            timestamp: block.header.timestamp,
        }))
    }

    async fn logs(&self, from: u64, to: u64, addresses: &[Address]) -> Result<Vec<RawLog>> {
        let filter = Filter::new()
            .address(addresses.to_vec())
            .from_block(from)
            .to_block(to);
        let logs = self.timed("eth_getLogs", self.inner.get_logs(&filter)).await?;
        // Pending logs carry no position and are never indexed.
        Ok(logs.into_iter().filter_map(convert_log).collect())
    }

    async fn call(&self, to: Address, data: Bytes, block: u64) -> Result<Bytes> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(data));
        self.timed(
            "eth_call",
            self.inner
                .call(request)
                .block(BlockId::number(block))
                .into_future(),
        )
        .await
    }
}
