//! Retries for transient JSON-RPC failures.
//!
//! [`RetryingProvider`] wraps the node connection used by the log source.
//! The chain reader bypasses it so a slow profile read degrades the handler
//! instead of stalling the window.

use crate::config::RetryConfig;
use crate::types::log::{BlockHeader, RawLog};
use crate::utils::error::{IndexerError, Result};
use crate::utils::rpc::ChainProvider;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

/// Delay before retry number `attempt` (1-based).
///
/// `initial_backoff_ms * backoff_multiplier^(attempt - 1)`, capped at
/// `max_backoff_ms`; with `jitter` the result is scaled into 75%..125%.
#[must_use]
pub fn compute_backoff(cfg: &RetryConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let delay = (cfg.initial_backoff_ms as f64 * cfg.backoff_multiplier.powi(exponent))
        .min(cfg.max_backoff_ms as f64);
    if !cfg.jitter {
        return Duration::from_millis(delay as u64);
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let factor = 0.75 + f64::from(nanos % 1_000_000) / 2_000_000.0;
    Duration::from_millis((delay * factor) as u64)
}

/// Whether a provider error may clear up on its own.
///
/// Node hiccups (rate limits, dropped connections, slow responses) are
/// retried. Decoding, configuration and store errors are returned as is,
/// and so is an already exhausted retry.
#[must_use]
pub fn is_transient(err: &IndexerError) -> bool {
    matches!(
        err,
        IndexerError::RpcError(_)
            | IndexerError::ConnectionError(_)
            | IndexerError::Timeout(_)
            | IndexerError::InternalError(_)
    )
}

/// [`ChainProvider`] decorator with exponential backoff.
///
/// After `max_retries` failed retries the call ends in
/// [`IndexerError::RetryExhausted`], which halts the engine.
///
/// ```no_run
/// use evm_indexer_sdk::RetryConfig;
/// use evm_indexer_sdk::utils::retry::RetryingProvider;
/// use evm_indexer_sdk::utils::rpc::{AlloyProvider, ChainProvider};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let node = AlloyProvider::new("http://127.0.0.1:8545", Duration::from_secs(10))?;
/// let provider: Arc<dyn ChainProvider> =
///     Arc::new(RetryingProvider::new(node, RetryConfig::default()));
/// # Ok(())
/// # }
/// ```
pub struct RetryingProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: ChainProvider> RetryingProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn with_retry<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => err,
                Err(err) => return Err(err),
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                return Err(IndexerError::RetryExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = compute_backoff(&self.config, attempt);
            tracing::warn!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "RPC request failed, backing off"
            );
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl<P: ChainProvider> ChainProvider for RetryingProvider<P> {
    async fn chain_id(&self) -> Result<u64> {
        self.with_retry(|| self.inner.chain_id()).await
    }

    async fn block_number(&self) -> Result<u64> {
        self.with_retry(|| self.inner.block_number()).await
    }

    async fn block_header(&self, number: u64) -> Result<Option<BlockHeader>> {
        self.with_retry(|| self.inner.block_header(number)).await
    }

    async fn logs(&self, from: u64, to: u64, addresses: &[Address]) -> Result<Vec<RawLog>> {
        self.with_retry(|| self.inner.logs(from, to, addresses)).await
    }

    async fn call(&self, to: Address, data: Bytes, block: u64) -> Result<Bytes> {
        self.with_retry(|| self.inner.call(to, data.clone(), block)).await
    }
}
