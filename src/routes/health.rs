//! Public listener (C5) health endpoints, registered under both the
//! `/service` and `/browser` prefixes. Both read the same draining flag.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::listener::ListenerHandle;

async fn health(handle: ListenerHandle) -> Response {
	if handle.is_draining().await {
		(StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "shutting down"}))).into_response()
	} else {
		(StatusCode::OK, Json(json!({"status": "healthy"}))).into_response()
	}
}

pub async fn service_health(State(handle): State<ListenerHandle>) -> Response {
	health(handle).await
}

pub async fn browser_health(State(handle): State<ListenerHandle>) -> Response {
	health(handle).await
}
