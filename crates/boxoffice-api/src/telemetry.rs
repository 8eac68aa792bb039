//! Tracing subscriber setup with optional OpenTelemetry export.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

const SERVICE_NAME: &str = "boxoffice-api";

/// Installs the global subscriber: JSON logs filtered by `RUST_LOG`
/// (default `info`), plus span export over OTLP/gRPC when `otlp_endpoint`
/// is set.
///
/// Returns the tracer provider so `main` can flush it on shutdown.
///
/// # Errors
///
/// Returns `AppError::Telemetry` if the exporter cannot be built or a
/// global subscriber is already installed.
pub fn init(otlp_endpoint: Option<&str>) -> Result<Option<SdkTracerProvider>, AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer().json();

    let Some(endpoint) = otlp_endpoint else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt)
            .try_init()
            .map_err(|e| AppError::Telemetry(e.to_string()))?;
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Telemetry(format!("OTLP exporter for {endpoint}: {e}")))?;
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build();
    let otel = tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(otel)
        .try_init()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;
    Ok(Some(provider))
}
