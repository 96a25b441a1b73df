//! Application Listener (C7): owns the public and admin listeners plus the
//! shared `ServiceTemplate`, and sequences startup/teardown. Any startup
//! failure aborts and runs compensating shutdown in reverse.

mod health_client;

pub use health_client::HealthClient;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::barrier::{BarrierKeyStore, BarrierService, EnvFileRootKeySource, SharedBarrier};
use crate::config::Settings;
use crate::db;
use crate::db::barrier_keys::BarrierKeyRepository;
use crate::db::messages::MessageRepository;
use crate::db::realms::RealmRepository;
use crate::db::sessions::SessionRepository;
use crate::db::users::UserRepository;
use crate::listener::{Listener, ShutdownKind};
use crate::middleware::SharedRateLimitLayer;
use crate::migrations;
use crate::observability::TelemetryService;
use crate::routes;
use crate::session::SessionService;
use crate::state::AppState;
use crate::tls::{self, TlsDescriptor};

/// Collaborators shared by both listeners: telemetry, the DB pool, and the
/// barrier service. Stands in for the spec's `ServiceTemplate`.
pub struct ServiceTemplate {
	pub telemetry: TelemetryService,
	pub db_pool: PgPool,
	pub barrier: SharedBarrier,
}

impl ServiceTemplate {
	pub async fn bootstrap(settings: &Settings) -> Result<Self> {
		let telemetry = TelemetryService::init(&settings.log_level, "signet-core")
			.await
			.context("telemetry initialization failed")?;

		let db_pool = db::connect_with_retry(&settings.database_url, 5, Duration::from_secs(2))
			.await
			.context("database connection failed")?;

		migrations::run(&db_pool).await.context("migration run failed")?;

		let root_source = EnvFileRootKeySource::new(settings.barrier_root_key_path.clone());
		let key_store: std::sync::Arc<dyn BarrierKeyStore> =
			std::sync::Arc::new(BarrierKeyRepository::new(db_pool.clone()));
		let barrier = std::sync::Arc::new(
			BarrierService::bootstrap(&root_source, key_store)
				.await
				.context("barrier bootstrap failed")?,
		);

		Ok(Self {
			telemetry,
			db_pool,
			barrier,
		})
	}

	pub async fn shutdown(&self) {
		self.telemetry.shutdown().await;
	}
}

fn build_app_state(template: &ServiceTemplate) -> AppState {
	let users = UserRepository::new(template.db_pool.clone());
	let sessions = SessionService::new(
		users.clone(),
		SessionRepository::new(template.db_pool.clone()),
		RealmRepository::new(template.db_pool.clone()),
	);
	AppState {
		sessions,
		users,
		messages: MessageRepository::new(template.db_pool.clone()),
		barrier: template.barrier.clone(),
		metrics: template.telemetry.metrics.clone(),
	}
}

fn tls_descriptor(settings: &Settings) -> TlsDescriptor {
	let mut dns_sans = vec![settings.tls_hostname.clone()];
	if let Some(extra) = &settings.tls_extra_dns_sans {
		dns_sans.extend(extra.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string));
	}

	let ip_sans = settings
		.tls_ip_sans
		.as_deref()
		.unwrap_or("")
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.filter_map(|s| s.parse().ok())
		.collect();

	TlsDescriptor {
		mode: settings.tls_mode,
		dns_sans,
		ip_sans,
		validity_days: settings.tls_validity_days,
		cert_path: settings.tls_cert_path.clone(),
		key_path: settings.tls_key_path.clone(),
		ca_cert_path: settings.tls_ca_cert_path.clone(),
		ca_key_path: settings.tls_ca_key_path.clone(),
	}
}

/// Owns both listeners and the shared template; sequences startup and
/// teardown per the design's step-by-step contract.
pub struct ApplicationListener {
	settings: Settings,
	template: ServiceTemplate,
	public: Listener,
	admin: Listener,
}

impl ApplicationListener {
	/// Startup sequence: `ServiceTemplate` -> public listener -> admin
	/// listener -> start both -> poll `ActualPort()` (diagnostic only) ->
	/// `SetReady(true)` on the admin listener.
	pub async fn start(settings: Settings) -> Result<Self> {
		let template = ServiceTemplate::bootstrap(&settings).await?;
		let state = build_app_state(&template);

		let public_tls = tls::provision(&tls_descriptor(&settings)).context("public TLS provisioning failed")?;
		let public_addr: SocketAddr = format!("{}:{}", settings.public_bind_addr, settings.public_bind_port)
			.parse()
			.context("invalid public bind address")?;
		let public_handle_seed = crate::listener::ListenerHandle::new(ShutdownKind::OnceOnly);
		let public_router = routes::public_router(state.clone(), public_handle_seed.clone());
		let rate_limit = SharedRateLimitLayer::new(settings.rate_limit_burst as usize, settings.rate_limit_rps);
		let public = Listener::new(
			"public",
			public_addr,
			public_router,
			public_tls.negotiated_config,
			public_handle_seed,
		)
		.with_rate_limit(rate_limit);

		let admin_tls = tls::provision(&tls_descriptor(&settings)).context("admin TLS provisioning failed")?;
		let admin_addr: SocketAddr = format!("{}:{}", settings.admin_bind_addr, settings.admin_bind_port)
			.parse()
			.context("invalid admin bind address")?;
		let admin_handle_seed = crate::listener::ListenerHandle::new(ShutdownKind::Idempotent);
		let admin_router = routes::admin_router(state.clone(), admin_handle_seed.clone());
		let admin = Listener::new(
			"admin",
			admin_addr,
			admin_router,
			admin_tls.negotiated_config,
			admin_handle_seed,
		);

		if let Err(e) = public.start().await {
			template.shutdown().await;
			return Err(e.into());
		}
		if let Err(e) = admin.start().await {
			let _ = public.shutdown(Duration::from_secs(settings.shutdown_timeout_public_secs)).await;
			template.shutdown().await;
			return Err(e.into());
		}

		poll_actual_ports(&public, &admin).await;

		admin.set_ready(true).await;
		state.metrics.admin_listener_ready.set(1);
		state.metrics.public_listener_ready.set(1);

		Ok(Self {
			settings,
			template,
			public,
			admin,
		})
	}

	pub async fn public_actual_port(&self) -> Option<u16> {
		self.public.actual_port().await
	}

	pub async fn admin_actual_port(&self) -> Option<u16> {
		self.admin.actual_port().await
	}

	pub fn admin_base_url(&self, port: u16) -> String {
		format!("https://{}:{}", self.settings.admin_bind_addr, port)
	}

	/// Reverse-order compensating shutdown: admin first (stops new admin
	/// operations), public second, then the shared template.
	pub async fn shutdown(self) -> Result<()> {
		self.admin
			.shutdown(Duration::from_secs(self.settings.shutdown_timeout_admin_secs))
			.await
			.context("admin listener shutdown failed")?;
		self.public
			.shutdown(Duration::from_secs(self.settings.shutdown_timeout_public_secs))
			.await
			.context("public listener shutdown failed")?;
		self.template.shutdown().await;
		Ok(())
	}
}

/// Diagnostic-only: polls until both listeners report a non-zero actual
/// port, or a short timeout elapses. Never gates readiness.
async fn poll_actual_ports(public: &Listener, admin: &Listener) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
	loop {
		let public_port = public.actual_port().await;
		let admin_port = admin.actual_port().await;
		if public_port.is_some() && admin_port.is_some() {
			return;
		}
		if tokio::time::Instant::now() >= deadline {
			tracing::warn!("actual port polling timed out before both listeners reported a port");
			return;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
}
