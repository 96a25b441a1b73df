use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Central registry for all Prometheus metrics the service exposes at
/// `/admin/api/v1/metrics`.
pub struct MetricsRegistry {
	registry: Registry,

	pub messages_sent_total: IntCounter,
	pub messages_received_total: IntCounter,
	pub messages_deleted_total: IntCounter,
	pub messaging_errors_total: IntCounter,
	pub send_duration_seconds: Histogram,

	pub barrier_wrap_total: IntCounter,
	pub barrier_unwrap_total: IntCounter,
	pub barrier_rotations_total: IntCounter,

	pub auth_failures_total: IntCounter,
	pub sessions_active: IntGauge,

	pub public_listener_ready: IntGauge,
	pub admin_listener_ready: IntGauge,
}

impl MetricsRegistry {
	pub fn new() -> Self {
		let registry = Registry::new();

		macro_rules! counter {
			($name:literal, $help:literal) => {{
				let c = IntCounter::with_opts(Opts::new($name, $help).namespace("signet")).unwrap();
				registry.register(Box::new(c.clone())).unwrap();
				c
			}};
		}
		macro_rules! gauge {
			($name:literal, $help:literal) => {{
				let g = IntGauge::with_opts(Opts::new($name, $help).namespace("signet")).unwrap();
				registry.register(Box::new(g.clone())).unwrap();
				g
			}};
		}

		let messages_sent_total = counter!("messages_sent_total", "Total messages sent");
		let messages_received_total =
			counter!("messages_received_total", "Total message rows delivered to receivers");
		let messages_deleted_total = counter!("messages_deleted_total", "Total messages deleted");
		let messaging_errors_total =
			counter!("messaging_errors_total", "Total messaging engine errors");

		let send_duration_seconds = Histogram::with_opts(
			HistogramOpts::new("signet_send_duration_seconds", "Send operation latency")
				.buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
		)
		.unwrap();
		registry
			.register(Box::new(send_duration_seconds.clone()))
			.unwrap();

		let barrier_wrap_total = counter!("barrier_wrap_total", "Total barrier wrap operations");
		let barrier_unwrap_total =
			counter!("barrier_unwrap_total", "Total barrier unwrap operations");
		let barrier_rotations_total =
			counter!("barrier_rotations_total", "Total barrier key rotations");

		let auth_failures_total = counter!("auth_failures_total", "Total auth middleware rejections");
		let sessions_active = gauge!("sessions_active", "Currently active sessions");

		let public_listener_ready = gauge!("public_listener_ready", "1 if the public listener is ready");
		let admin_listener_ready = gauge!("admin_listener_ready", "1 if the admin listener is ready");

		Self {
			registry,
			messages_sent_total,
			messages_received_total,
			messages_deleted_total,
			messaging_errors_total,
			send_duration_seconds,
			barrier_wrap_total,
			barrier_unwrap_total,
			barrier_rotations_total,
			auth_failures_total,
			sessions_active,
			public_listener_ready,
			admin_listener_ready,
		}
	}

	/// Encode all registered metrics in Prometheus text exposition format.
	pub fn encode(&self) -> String {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		match encoder.encode_to_string(&metric_families) {
			Ok(s) => s,
			Err(e) => {
				tracing::error!(error = %e, "failed to encode metrics");
				String::new()
			}
		}
	}
}

impl Default for MetricsRegistry {
	fn default() -> Self {
		Self::new()
	}
}

pub fn init_metrics() -> anyhow::Result<std::sync::Arc<MetricsRegistry>> {
	Ok(std::sync::Arc::new(MetricsRegistry::new()))
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn metrics_registry_creation() {
		let registry = super::MetricsRegistry::new();
		assert!(!registry.encode().is_empty());
	}

	#[test]
	fn metrics_increment() {
		let registry = super::MetricsRegistry::new();
		registry.messages_sent_total.inc();
		registry.barrier_wrap_total.inc_by(3);
		assert!(registry.encode().contains("signet_messages_sent_total"));
	}
}
