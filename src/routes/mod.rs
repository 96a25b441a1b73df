//! HTTP handlers, wired onto the public (`/service/**`, `/browser/**`) and
//! admin (`/admin/api/v1/**`) routers built by the application lifecycle
//! (C7) before each [`crate::listener::Listener`] is constructed.

pub mod admin;
pub mod health;
pub mod messages;
pub mod users;

use axum::Router;
use axum::extract::FromRef;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};

use crate::listener::ListenerHandle;
use crate::middleware::require_service_session;
use crate::state::AppState;

/// Combined router state: `AppState` (business state) plus the
/// `ListenerHandle` health/draining handlers need to read. `FromRef` lets
/// handlers extract either piece with a plain `State<AppState>` /
/// `State<ListenerHandle>`, instead of always unpacking the tuple.
#[derive(Clone)]
pub struct RouteState {
	pub app: AppState,
	pub listener: ListenerHandle,
}

impl FromRef<RouteState> for AppState {
	fn from_ref(input: &RouteState) -> Self {
		input.app.clone()
	}
}

impl FromRef<RouteState> for ListenerHandle {
	fn from_ref(input: &RouteState) -> Self {
		input.listener.clone()
	}
}

/// Build the admin router: `livez`/`readyz`/`shutdown` plus the ambient
/// Prometheus `metrics` endpoint. Unauthenticated — the admin listener is
/// assumed to be reachable only from trusted infrastructure.
pub fn admin_router(app: AppState, listener: ListenerHandle) -> Router<()> {
	Router::new()
		.route("/admin/api/v1/livez", get(admin::livez))
		.route("/admin/api/v1/readyz", get(admin::readyz))
		.route("/admin/api/v1/shutdown", post(admin::shutdown))
		.route("/admin/api/v1/metrics", get(admin::metrics))
		.with_state(RouteState { app, listener })
}

/// Build the public router: health endpoints under both `/service` and
/// `/browser` prefixes, plus the authenticated messaging and user-account
/// business routes.
pub fn public_router(app: AppState, listener: ListenerHandle) -> Router<()> {
	let state = RouteState { app: app.clone(), listener };

	let authenticated = Router::new()
		.route("/service/api/v1/messages/tx", put(messages::send))
		.route("/service/api/v1/messages/rx", get(messages::receive))
		.route("/service/api/v1/messages/{id}", delete(messages::delete))
		.route_layer(from_fn_with_state(app.clone(), require_service_session));

	Router::new()
		.route("/service/api/v1/health", get(health::service_health))
		.route("/browser/api/v1/health", get(health::browser_health))
		.route("/service/api/v1/users/register", post(users::register))
		.route("/service/api/v1/users/login", post(users::login))
		.merge(authenticated)
		.with_state(state)
}
