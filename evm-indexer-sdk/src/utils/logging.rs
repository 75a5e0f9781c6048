//! Engine log lines.
//!
//! Everything except errors goes quiet when `EVM_INDEXER_SILENT` is set,
//! which keeps benchmark and test output readable.

const SILENT_ENV: &str = "EVM_INDEXER_SILENT";

#[derive(Clone, Copy)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

fn silenced() -> bool {
    std::env::var(SILENT_ENV).is_ok()
}

pub fn log(level: LogLevel, message: &str) {
    if silenced() {
        return;
    }

    match level {
        LogLevel::Info | LogLevel::Success => tracing::info!("{}", message),
        LogLevel::Warning => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
        LogLevel::Debug => tracing::debug!("{}", message),
    }
}

/// Hides API keys embedded in provider URLs (`?api-key=...`, `/v2/<key>`).
#[must_use]
pub fn redact_rpc_url(rpc_url: &str) -> String {
    if let Some(pos) = rpc_url.find("api-key=") {
        let before = &rpc_url[..pos + 8];
        let after = &rpc_url[pos + 8..];
        let end_pos = after.find('&').unwrap_or(after.len());
        return format!("{}[REDACTED]{}", before, &after[end_pos..]);
    }

    // Alchemy / Infura style: key is the last path segment after /v2/ or /v3/
    for marker in ["/v2/", "/v3/"] {
        if let Some(pos) = rpc_url.find(marker) {
            let key_start = pos + marker.len();
            if key_start < rpc_url.len() {
                return format!("{}[REDACTED]", &rpc_url[..key_start]);
            }
        }
    }

    rpc_url.to_string()
}

/// Startup banner. The RPC URL is redacted.
pub fn log_startup(network: &str, chain_id: u64, rpc_url: &str, contracts: &[String]) {
    if silenced() {
        return;
    }

    tracing::info!(
        network = network,
        chain_id = chain_id,
        rpc_url = redact_rpc_url(rpc_url),
        contracts = contracts.join(", "),
        "Indexer starting"
    );
}

/// Registry counters. A `capacity` of 0 is shown as unlimited.
pub fn log_registry(
    name: &str,
    registered: usize,
    capacity: usize,
    dispatches: u64,
    unhandled: u64,
    undecoded: u64,
) {
    if silenced() {
        return;
    }
    let capacity = if capacity == 0 {
        "unlimited".to_string()
    } else {
        capacity.to_string()
    };
    tracing::info!(
        registry = name,
        registered,
        capacity = %capacity,
        dispatches,
        unhandled,
        undecoded,
        "Registry stats"
    );
}

/// Per-window summary; empty windows only at debug level.
pub fn log_range(from: u64, to: u64, logs: usize, handled: usize, duration_ms: u64) {
    if silenced() {
        return;
    }
    if logs > 0 {
        tracing::info!(
            from_block = from,
            to_block = to,
            logs = logs,
            handled = handled,
            duration_ms = duration_ms,
            "Range processed"
        );
    } else {
        tracing::debug!(from_block = from, to_block = to, "Empty range");
    }
}

pub fn log_transition(from: &str, to: &str) {
    if silenced() {
        return;
    }
    tracing::info!(from = from, to = to, "Indexer state changed");
}

pub fn log_error(context: &str, error: &str) {
    tracing::error!(context = context, error = error, "Indexer error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_query_key() {
        assert_eq!(
            redact_rpc_url("https://rpc.example.com/?api-key=secret&x=1"),
            "https://rpc.example.com/?api-key=[REDACTED]&x=1"
        );
    }

    #[test]
    fn test_redact_path_key() {
        assert_eq!(
            redact_rpc_url("https://eth-sepolia.g.alchemy.com/v2/abc123"),
            "https://eth-sepolia.g.alchemy.com/v2/[REDACTED]"
        );
    }

    #[test]
    fn test_plain_url_untouched() {
        assert_eq!(redact_rpc_url("http://127.0.0.1:8545"), "http://127.0.0.1:8545");
    }
}
