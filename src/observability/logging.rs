use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON logging to stdout with contextual fields.
pub fn init_logging(log_level: &str) -> anyhow::Result<()> {
	let env_filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(log_level))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	let json_layer = tracing_subscriber::fmt::layer()
		.json()
		.with_current_span(true)
		.with_span_list(true)
		.with_target(true)
		.with_level(true)
		.with_thread_ids(true)
		.with_file(true)
		.with_line_number(true);

	tracing_subscriber::registry()
		.with(env_filter)
		.with(json_layer)
		.try_init()
		.map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

	Ok(())
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn logging_initialization_is_callable() {
		// We can only install a subscriber once per process; this just
		// validates the function runs without panicking.
		let _ = super::init_logging("info");
	}
}
