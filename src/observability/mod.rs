pub mod logging;
pub mod metrics;
pub mod tracing_setup;

pub use logging::init_logging;
pub use metrics::{MetricsRegistry, init_metrics};
pub use tracing_setup::init_tracing;

use std::sync::Arc;

/// Stands in for the spec's out-of-scope `TelemetryService` collaborator.
/// The application lifecycle calls `init`/`shutdown` exactly once each.
pub struct TelemetryService {
	pub metrics: Arc<MetricsRegistry>,
}

impl TelemetryService {
	/// Initialize structured logging, the metrics registry, and an
	/// in-process tracer. Called once by the application lifecycle's
	/// startup sequence.
	pub async fn init(log_level: &str, service_name: &str) -> anyhow::Result<Self> {
		init_logging(log_level)?;
		let metrics = init_metrics()?;
		init_tracing(service_name).await?;

		tracing::info!(component = "observability", "telemetry initialized");

		Ok(Self { metrics })
	}

	/// No background exporter task is running today (network export is out
	/// of scope), but the hook exists so the lifecycle's teardown sequence
	/// has a symmetric call site to grow into.
	pub async fn shutdown(&self) {
		tracing::info!(component = "observability", "telemetry shutting down");
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[tokio::test]
	async fn telemetry_round_trip() {
		let telemetry = TelemetryService::init("info", "signet-core-test")
			.await
			.expect("telemetry init should succeed");
		assert!(!telemetry.metrics.encode().is_empty());
		telemetry.shutdown().await;
	}
}
