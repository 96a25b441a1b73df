//! Auth/Session Middleware (C4): extracts a bearer token, validates it
//! against the Session Store, and attaches the resolved [`Principal`] to
//! the request's extensions — or returns 401.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::db::models::SessionKind;
use crate::session::Principal;
use crate::state::AppState;

fn extract_bearer(req: &Request<Body>) -> Option<&str> {
	let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
	// Case-insensitive scheme match ("Bearer", "bearer", "BEARER", ...).
	let mut parts = header.splitn(2, ' ');
	let scheme = parts.next()?;
	let token = parts.next()?;
	if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
		Some(token)
	} else {
		None
	}
}

async fn require_session(kind: SessionKind, state: &AppState, req: &Request<Body>) -> Option<Principal> {
	let token = extract_bearer(req)?;
	match state.sessions.validate(kind, token).await {
		Ok(Some(principal)) => Some(principal),
		Ok(None) => None,
		Err(e) => {
			tracing::error!(error = %e, "session validation failed");
			None
		}
	}
}

fn unauthorized() -> Response {
	(StatusCode::UNAUTHORIZED, "unauthenticated").into_response()
}

/// Middleware for `/browser/**` routes.
pub async fn require_browser_session(
	State(state): State<AppState>,
	mut req: Request<Body>,
	next: Next,
) -> Response {
	match require_session(SessionKind::Browser, &state, &req).await {
		Some(principal) => {
			req.extensions_mut().insert(principal);
			next.run(req).await
		}
		None => {
			state.metrics.auth_failures_total.inc();
			unauthorized()
		}
	}
}

/// Middleware for `/service/**` routes.
pub async fn require_service_session(
	State(state): State<AppState>,
	mut req: Request<Body>,
	next: Next,
) -> Response {
	match require_session(SessionKind::Service, &state, &req).await {
		Some(principal) => {
			req.extensions_mut().insert(principal);
			next.run(req).await
		}
		None => {
			state.metrics.auth_failures_total.inc();
			unauthorized()
		}
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use axum::http::Request as HttpRequest;

	#[test]
	fn extract_bearer_is_case_insensitive_on_scheme() {
		let req = HttpRequest::builder()
			.header(AUTHORIZATION, "BEARER abc123")
			.body(Body::empty())
			.unwrap();
		assert_eq!(extract_bearer(&req), Some("abc123"));
	}

	#[test]
	fn extract_bearer_rejects_other_schemes() {
		let req = HttpRequest::builder()
			.header(AUTHORIZATION, "Basic abc123")
			.body(Body::empty())
			.unwrap();
		assert_eq!(extract_bearer(&req), None);
	}

	#[test]
	fn extract_bearer_rejects_missing_header() {
		let req = HttpRequest::builder().body(Body::empty()).unwrap();
		assert_eq!(extract_bearer(&req), None);
	}
}
