use super::config::TelemetryConfig;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Flushes exported spans when dropped.
pub struct TelemetryGuard {
    _private: (),
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        shutdown_telemetry();
    }
}

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

#[cfg(feature = "opentelemetry")]
static OTEL_PROVIDER: OnceLock<opentelemetry_sdk::trace::SdkTracerProvider> = OnceLock::new();

/// `RUST_LOG` when set, `config.log_filter` otherwise.
fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
}

fn console_layer<S>(config: &TelemetryConfig) -> fmt::Layer<S> {
    fmt::layer()
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_ansi(config.enable_console_colors)
}

/// Installs the global subscriber: env filter plus console output.
///
/// Only the first call in a process installs anything.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    TELEMETRY_INIT.get_or_init(|| {
        tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config))
            .init();
    });

    TelemetryGuard { _private: () }
}

/// Like [`init_telemetry`], additionally exporting spans over OTLP.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built.
#[cfg(feature = "opentelemetry")]
pub fn init_telemetry_with_otel(
    config: TelemetryConfig,
    otel: &super::otel::OtelConfig,
) -> Result<TelemetryGuard, Box<dyn std::error::Error + Send + Sync + 'static>> {
    if TELEMETRY_INIT.get().is_some() {
        return Ok(TelemetryGuard { _private: () });
    }

    let (otel_layer, provider) = super::otel::build_otel_pipeline(&config.service_name, otel)?;
    let _ = OTEL_PROVIDER.set(provider);

    TELEMETRY_INIT.get_or_init(|| {
        tracing_subscriber::registry()
            .with(otel_layer)
            .with(env_filter(&config))
            .with(console_layer(&config))
            .init();
    });

    Ok(TelemetryGuard { _private: () })
}

/// Flushes and stops the OTLP exporter, if one was installed.
pub fn shutdown_telemetry() {
    #[cfg(feature = "opentelemetry")]
    if let Some(provider) = OTEL_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("OpenTelemetry shutdown failed: {e}");
        }
    }
}
