//! Shared utilities: errors, logging, RPC access, retries and caching.

pub mod cache;
pub mod error;
pub mod logging;
pub mod retry;
pub mod rpc;
