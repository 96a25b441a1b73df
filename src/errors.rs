//! Shared error-kind taxonomy.
//!
//! Business and core code returns one of these kinds; only handler code
//! (see `routes`) converts a kind into an HTTP status via `IntoResponse`.
//! Nothing below `routes` should ever construct an `axum::http::StatusCode`
//! directly.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Top-level error kind, matching the error categories in the design:
/// Input / Authn-Authz / Resource / Cryptographic / Storage / Lifecycle / Transport.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
	#[error("invalid input: {0}")]
	Input(String),

	#[error("invalid credentials")]
	Unauthenticated,

	#[error("forbidden")]
	Forbidden,

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error(transparent)]
	Crypto(#[from] CryptoError),

	#[error("storage error: {0}")]
	Storage(String),

	#[error("lifecycle error: {0}")]
	Lifecycle(String),

	#[error("transport error: {0}")]
	Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
	#[error("unknown key id: {0}")]
	UnknownKeyId(String),

	#[error("authentication tag mismatch")]
	AuthTagMismatch,

	#[error("malformed ciphertext header: {0}")]
	HeaderMalformed(String),

	#[error("barrier rotation already in progress")]
	RotationInProgress,

	#[error("barrier key storage error: {0}")]
	Storage(String),
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
	message: String,
}

impl IntoResponse for CoreError {
	fn into_response(self) -> Response {
		let (status, code) = match &self {
			CoreError::Input(_) => (StatusCode::BAD_REQUEST, "input"),
			CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
			CoreError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
			CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
			CoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
			CoreError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cryptographic"),
			CoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
			CoreError::Lifecycle(_) => (StatusCode::SERVICE_UNAVAILABLE, "lifecycle"),
			CoreError::Transport(_) => (StatusCode::BAD_GATEWAY, "transport"),
		};

		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!(error = %self, "internal error");
		} else {
			tracing::debug!(error = %self, "request rejected");
		}

		let body = ErrorBody {
			error: code.to_string(),
			message: self.to_string(),
		};

		(status, Json(body)).into_response()
	}
}

pub type CoreResult<T> = Result<T, CoreError>;
