//! Subscriber installation for indexer binaries.
//!
//! Library code only emits `tracing` events. A binary calls
//! [`init_telemetry`] (or [`init_telemetry_with_otel`] with the
//! `opentelemetry` feature) once and holds the returned guard until exit.

#[cfg(feature = "telemetry")]
pub mod config;

#[cfg(feature = "telemetry")]
pub mod subscriber;

#[cfg(feature = "opentelemetry")]
pub mod otel;

#[cfg(feature = "telemetry")]
pub use config::TelemetryConfig;

#[cfg(feature = "telemetry")]
pub use subscriber::{init_telemetry, shutdown_telemetry, TelemetryGuard};

#[cfg(feature = "opentelemetry")]
pub use subscriber::init_telemetry_with_otel;

#[cfg(feature = "opentelemetry")]
pub use otel::{OtelConfig, OtlpProtocol};
