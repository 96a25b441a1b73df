//! Public & Admin HTTPS Listeners (C5, C6): a single reusable `Listener`
//! finite-state machine, instantiated twice by the application lifecycle
//! (C7) — once for the business API, once for the admin API. Generalizes
//! the template's single inlined accept loop (bind -> per-connection
//! `tokio::spawn` -> TLS accept -> hyper serve) into a reusable struct.

mod state;

pub use state::{ListenerHandle, ListenerState, Phase, ShutdownKind};

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Router;
use axum::http::header::HeaderName;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::sensitive_headers::{SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer};
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::errors::CoreError;
use crate::middleware::SharedRateLimitLayer;

/// A bound HTTPS listener with a finite-state lifecycle. `axum::Router` is
/// the "Fiber-style" router the design calls for. The [`ListenerHandle`]
/// portion of the state is constructed before the router (the router's
/// admin/health handlers close over a clone of it), then handed to
/// [`Listener::new`] alongside the finished router.
pub struct Listener {
	pub name: &'static str,
	bind_addr: SocketAddr,
	router: Router<()>,
	tls_config: Arc<ServerConfig>,
	rate_limit: Option<SharedRateLimitLayer>,
	handle: ListenerHandle,
}

impl Listener {
	pub fn new(
		name: &'static str,
		bind_addr: SocketAddr,
		router: Router<()>,
		tls_config: Arc<ServerConfig>,
		handle: ListenerHandle,
	) -> Self {
		Self {
			name,
			bind_addr,
			router,
			tls_config,
			rate_limit: None,
			handle,
		}
	}

	/// Attach the shared in-process rate limiter (public listener only; the
	/// admin listener is trusted infrastructure and skips it).
	pub fn with_rate_limit(mut self, layer: SharedRateLimitLayer) -> Self {
		self.rate_limit = Some(layer);
		self
	}

	pub fn handle(&self) -> ListenerHandle {
		self.handle.clone()
	}

	/// Bind the TCP socket, record the actual (possibly dynamically
	/// allocated) port, and spawn the accept loop. Transitions `New ->
	/// Listening`.
	pub async fn start(&self) -> Result<(), CoreError> {
		{
			let state = self.handle.state.read().await;
			if state.phase != Phase::New {
				return Err(CoreError::Lifecycle(format!(
					"{} listener: start() called from phase {:?}",
					self.name, state.phase
				)));
			}
		}

		let tcp_listener = TcpListener::bind(self.bind_addr)
			.await
			.map_err(|e| CoreError::Lifecycle(format!("{} listener: bind failed: {}", self.name, e)))?;
		let actual_port = tcp_listener
			.local_addr()
			.map_err(|e| CoreError::Lifecycle(format!("{} listener: local_addr failed: {}", self.name, e)))?
			.port();

		{
			let mut state = self.handle.state.write().await;
			state.phase = Phase::Listening;
			state.actual_port = Some(actual_port);
		}

		tracing::info!(listener = self.name, port = actual_port, "listener bound");

		let acceptor = TlsAcceptor::from(self.tls_config.clone());
		let router = self.router.clone();
		let rate_limit = self.rate_limit.clone();
		let mut shutdown_rx = self.handle.shutdown_rx.clone();
		let in_flight = self.handle.in_flight.clone();
		let drained = self.handle.drained.clone();
		let name = self.name;

		tokio::spawn(async move {
			loop {
				tokio::select! {
					biased;
					_ = shutdown_rx.changed() => {
						if *shutdown_rx.borrow() {
							tracing::info!(listener = name, "accept loop stopping");
							break;
						}
					}
					accepted = tcp_listener.accept() => {
						let (tcp_stream, peer_addr) = match accepted {
							Ok(t) => t,
							Err(e) => {
								tracing::warn!(listener = name, error = %e, "accept error");
								continue;
							}
						};
						let acceptor = acceptor.clone();
						let router = router.clone();
						let rate_limit = rate_limit.clone();
						let in_flight = in_flight.clone();
						let drained = drained.clone();

						in_flight.fetch_add(1, Ordering::SeqCst);
						tokio::spawn(async move {
							serve_connection(acceptor, router, rate_limit, tcp_stream, peer_addr, name).await;
							if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
								drained.notify_waiters();
							}
						});
					}
				}
			}
		});

		Ok(())
	}

	pub async fn set_ready(&self, ready: bool) {
		self.handle.set_ready(ready).await;
	}

	pub async fn is_ready(&self) -> bool {
		self.handle.is_ready().await
	}

	pub async fn actual_port(&self) -> Option<u16> {
		self.handle.actual_port().await
	}

	pub async fn phase(&self) -> Phase {
		self.handle.phase().await
	}

	/// Stop accepting new connections and wait (up to `deadline`) for
	/// in-flight connections to finish. Idempotency depends on the
	/// [`ShutdownKind`] the handle was constructed with: the admin listener
	/// accepts repeated calls, the public listener reports
	/// `CoreError::Lifecycle` ("already shut down") on the second call.
	pub async fn shutdown(&self, deadline: Duration) -> Result<(), CoreError> {
		self.handle.begin_draining().await?;
		self.handle.finish_draining(deadline).await;
		tracing::info!(listener = self.name, "listener closed");
		Ok(())
	}
}

async fn serve_connection(
	acceptor: TlsAcceptor,
	router: Router<()>,
	rate_limit: Option<SharedRateLimitLayer>,
	tcp_stream: tokio::net::TcpStream,
	peer_addr: SocketAddr,
	name: &'static str,
) {
	let _ = tcp_stream.set_nodelay(true);

	let tls_stream = match acceptor.accept(tcp_stream).await {
		Ok(s) => s,
		Err(e) => {
			tracing::warn!(listener = name, peer = %peer_addr, error = %e, "TLS handshake failed");
			return;
		}
	};

	let req_headers: Arc<[HeaderName]> = Arc::from(
		vec![HeaderName::from_static("authorization"), HeaderName::from_static("cookie")].into_boxed_slice(),
	);
	let res_headers: Arc<[HeaderName]> = Arc::from(vec![HeaderName::from_static("set-cookie")].into_boxed_slice());

	// `Option<SharedRateLimitLayer>` itself implements `Layer` (blanket impl
	// over `Either`), so the admin listener (no rate limiter attached) and
	// the public listener share one stack shape.
	let svc = ServiceBuilder::new()
		.layer(CatchPanicLayer::new())
		.concurrency_limit(256)
		.load_shed()
		.timeout(Duration::from_secs(30))
		.layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
		.layer(RequestBodyTimeoutLayer::new(Duration::from_secs(30)))
		.layer(rate_limit)
		.layer(SetSensitiveRequestHeadersLayer::from_shared(req_headers.clone()))
		.layer(SetSensitiveResponseHeadersLayer::from_shared(res_headers.clone()))
		.layer(TraceLayer::new_for_http())
		.service(router);

	let hyper_svc = TowerToHyperService::new(svc);
	let io = TokioIo::new(tls_stream);
	let builder = AutoBuilder::new(TokioExecutor::new());

	if let Err(e) = builder.serve_connection(io, hyper_svc).await {
		tracing::debug!(listener = name, peer = %peer_addr, error = %e, "connection closed with error");
	}
}
