//! OTLP span export for the indexer.
//!
//! Only compiled when the `opentelemetry` feature is enabled. The pipeline is
//! a batch span exporter on the tokio runtime feeding a
//! `tracing_opentelemetry` layer stacked directly on the registry.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Registry;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// OTLP transport protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OtlpProtocol {
    /// gRPC, conventionally on port 4317.
    #[default]
    Grpc,
    /// HTTP/protobuf, conventionally on port 4318.
    Http,
}

impl OtlpProtocol {
    fn default_endpoint(self) -> &'static str {
        match self {
            OtlpProtocol::Grpc => "http://localhost:4317",
            OtlpProtocol::Http => "http://localhost:4318",
        }
    }
}

/// Where and how spans are exported.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    pub endpoint: String,
    pub protocol: OtlpProtocol,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            endpoint: OtlpProtocol::Grpc.default_endpoint().into(),
            protocol: OtlpProtocol::Grpc,
        }
    }
}

impl OtelConfig {
    /// Reads the standard `OTEL_EXPORTER_OTLP_PROTOCOL` and
    /// `OTEL_EXPORTER_OTLP_ENDPOINT` variables.
    #[must_use]
    pub fn from_env() -> Self {
        let protocol = match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("http/protobuf" | "http") => OtlpProtocol::Http,
            _ => OtlpProtocol::Grpc,
        };
        let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| protocol.default_endpoint().to_string());
        Self { endpoint, protocol }
    }
}

/// Builds the exporter and returns the tracing layer plus its provider.
///
/// Keep the provider alive for the life of the process and shut it down on
/// exit, or buffered spans are lost.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built (bad endpoint, TLS setup).
pub fn build_otel_pipeline(
    service_name: &str,
    otel_config: &OtelConfig,
) -> Result<(OpenTelemetryLayer<Registry, Tracer>, SdkTracerProvider), BoxError> {
    let builder = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match otel_config.protocol {
        OtlpProtocol::Grpc => builder
            .with_tonic()
            .with_endpoint(&otel_config.endpoint)
            .build()?,
        OtlpProtocol::Http => builder
            .with_http()
            .with_endpoint(&otel_config.endpoint)
            .build()?,
    };

    let resource = Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", service_name.to_owned()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("evm-indexer");
    Ok((tracing_opentelemetry::layer().with_tracer(tracer), provider))
}
