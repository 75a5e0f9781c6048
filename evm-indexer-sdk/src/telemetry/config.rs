/// Configuration for the telemetry subsystem.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for OTel resource identification.
    pub service_name: String,
    /// Fallback filter when `RUST_LOG` is unset (e.g. "info", "evm_indexer_sdk=debug,warn").
    pub log_filter: String,
    /// Whether to enable ANSI-colored console output.
    pub enable_console_colors: bool,
    /// Whether to include target module in output.
    pub show_target: bool,
    /// Whether to include thread IDs.
    pub show_thread_ids: bool,
}

impl TelemetryConfig {
    /// Default settings under a different service name.
    #[must_use]
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "evm-indexer".into(),
            log_filter: "info".into(),
            enable_console_colors: true,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_service_keeps_defaults() {
        let config = TelemetryConfig::for_service("superhero-indexer").with_log_filter("debug");
        assert_eq!(config.service_name, "superhero-indexer");
        assert_eq!(config.log_filter, "debug");
        assert!(config.show_target);
    }
}
