pub mod app;
pub mod barrier;
pub mod config;
pub mod db;
pub mod errors;
pub mod jose;
pub mod listener;
pub mod messaging;
pub mod middleware;
pub mod migrations;
pub mod observability;
pub mod routes;
pub mod session;
pub mod state;
pub mod tls;

use tokio::signal;

use crate::app::ApplicationListener;

/// Run the service until an OS shutdown signal arrives, then drain both
/// listeners in reverse order before returning.
pub async fn run() -> anyhow::Result<()> {
	let settings = config::load()?;

	let application = ApplicationListener::start(settings).await?;

	wait_for_shutdown_signal().await;
	tracing::info!("shutdown signal received, draining listeners");

	application.shutdown().await
}

/// Waits for SIGTERM (or, on non-Unix, only Ctrl-C) as well as Ctrl-C.
async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
