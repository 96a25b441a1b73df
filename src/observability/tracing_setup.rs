use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::layer::SubscriberExt;

/// Register an in-process OpenTelemetry tracer as a `tracing` layer.
///
/// No OTLP exporter is wired here (network trace export is out of scope);
/// the spans are still emitted so a future exporter layer has something to
/// attach to.
pub async fn init_tracing(service_name: &str) -> anyhow::Result<()> {
	let resource = opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
		"service.name",
		service_name.to_string(),
	)]);

	let tracer_provider = TracerProvider::builder().with_resource(resource).build();
	let tracer = tracer_provider.tracer(service_name.to_string());
	let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

	let subscriber = tracing_subscriber::registry().with(telemetry);
	if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
		// A global subscriber already set (e.g. by `init_logging`, or in
		// tests) is expected; the logging layer already carries span context.
		tracing::debug!(error = %e, "tracing subscriber already set");
	}

	Ok(())
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[tokio::test]
	async fn tracing_initialization_is_callable() {
		let _ = super::init_tracing("signet-core-test").await;
	}
}
