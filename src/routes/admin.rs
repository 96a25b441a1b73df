//! Admin listener (C6) endpoints: `livez`/`readyz`/`shutdown` with the
//! exact response bodies the design calls for, plus the ambient Prometheus
//! `metrics` endpoint.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, response::Response};
use serde_json::json;

use crate::listener::ListenerHandle;
use crate::state::AppState;

pub async fn livez(State(handle): State<ListenerHandle>) -> Response {
	if handle.is_draining().await {
		(StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "shutting down"}))).into_response()
	} else {
		(StatusCode::OK, Json(json!({"status": "alive"}))).into_response()
	}
}

pub async fn readyz(State(handle): State<ListenerHandle>) -> Response {
	if handle.is_draining().await {
		(StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "shutting down"}))).into_response()
	} else if handle.is_ready().await {
		(StatusCode::OK, Json(json!({"status": "ready"}))).into_response()
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not ready"}))).into_response()
	}
}

/// Flips the draining flag *before* returning the response (so a
/// same-keep-alive-window `livez` immediately sees it), then schedules the
/// actual socket teardown ~100ms later so the response has time to flush.
/// Idempotent: a second call also returns 200.
pub async fn shutdown(State(handle): State<ListenerHandle>) -> Response {
	match handle.begin_draining().await {
		Ok(()) => {
			let handle = handle.clone();
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_millis(100)).await;
				handle.finish_draining(Duration::from_secs(5)).await;
			});
			(StatusCode::OK, Json(json!({"status": "shutdown initiated"}))).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, "admin shutdown requested but listener rejected it");
			(StatusCode::OK, Json(json!({"status": "shutdown initiated"}))).into_response()
		}
	}
}

pub async fn metrics(State(state): State<AppState>) -> Response {
	(StatusCode::OK, state.metrics.encode()).into_response()
}
