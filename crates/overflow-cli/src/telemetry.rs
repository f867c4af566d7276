//! Tracing setup for the `overflow` binary.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` picks the filter (default `overflow=warn`), `OVERFLOW_LOG_JSON=1`
//! switches to JSON lines. With the `otel` feature and
//! `OTEL_EXPORTER_OTLP_ENDPOINT` set, spans and events are also exported over OTLP.

use std::env;
use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "overflow=warn,overflow_core=warn,overflow_cli=warn";
const LOG_JSON_VAR: &str = "OVERFLOW_LOG_JSON";

/// Keeps exporters alive; flushes them on drop.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    otel: Option<otel::Providers>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(providers) = self.otel.take() {
            providers.shutdown();
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init() -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = env_flag(LOG_JSON_VAR);

    let json_layer = json.then(|| fmt::layer().json().with_writer(io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(io::stderr));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer);

    #[cfg(feature = "otel")]
    {
        use opentelemetry::trace::TracerProvider as _;

        let providers = otel::Providers::from_env();
        let trace_layer = providers
            .as_ref()
            .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer.tracer("overflow")));
        let log_layer = providers.as_ref().map(|p| {
            opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&p.logger)
        });

        let _ = registry.with(trace_layer).with(log_layer).try_init();
        TelemetryGuard { otel: providers }
    }

    #[cfg(not(feature = "otel"))]
    {
        let _ = registry.try_init();
        TelemetryGuard::default()
    }
}

#[cfg(feature = "otel")]
mod otel {
    use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig as _};
    use opentelemetry_sdk::logs::SdkLoggerProvider;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

    pub struct Providers {
        pub tracer: SdkTracerProvider,
        pub logger: SdkLoggerProvider,
    }

    impl Providers {
        /// Exporters for the configured OTLP endpoint; `None` when unset or unusable.
        pub fn from_env() -> Option<Self> {
            let endpoint = std::env::var(ENDPOINT_VAR).ok().filter(|v| !v.trim().is_empty())?;
            match Self::build(&endpoint) {
                Ok(providers) => Some(providers),
                Err(err) => {
                    eprintln!("warning: OTLP export disabled: {err:#}");
                    None
                }
            }
        }

        fn build(endpoint: &str) -> anyhow::Result<Self> {
            let resource = Resource::builder().with_service_name("overflow").build();
            let base = endpoint.trim_end_matches('/');

            let spans = SpanExporter::builder()
                .with_http()
                .with_endpoint(format!("{base}/v1/traces"))
                .build()?;
            let logs = LogExporter::builder()
                .with_http()
                .with_endpoint(format!("{base}/v1/logs"))
                .build()?;

            Ok(Self {
                tracer: SdkTracerProvider::builder()
                    .with_resource(resource.clone())
                    .with_batch_exporter(spans)
                    .build(),
                logger: SdkLoggerProvider::builder()
                    .with_resource(resource)
                    .with_batch_exporter(logs)
                    .build(),
            })
        }

        pub fn shutdown(self) {
            if let Err(err) = self.tracer.shutdown() {
                eprintln!("warning: failed to flush traces: {err}");
            }
            if let Err(err) = self.logger.shutdown() {
                eprintln!("warning: failed to flush logs: {err}");
            }
        }
    }
}
