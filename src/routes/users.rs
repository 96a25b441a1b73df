//! `/service/api/v1/users/{register,login}` — account creation and bearer
//! token issuance, scoped to the single seeded default tenant.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::db::default_tenant_id;
use crate::db::models::SessionKind;
use crate::errors::{CoreError, CoreResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
	username: String,
	password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
	user_id: uuid::Uuid,
	username: String,
}

pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> Response {
	match do_register(&state, body).await {
		Ok(resp) => (StatusCode::CREATED, Json(resp)).into_response(),
		Err(e) => e.into_response(),
	}
}

async fn do_register(state: &AppState, body: RegisterRequest) -> CoreResult<RegisterResponse> {
	if body.username.is_empty() || body.password.is_empty() {
		return Err(CoreError::Input("username and password are required".to_string()));
	}

	let tenant_id = default_tenant_id();
	let realm = state
		.sessions
		.realm_for_tenant(tenant_id)
		.await?
		.ok_or_else(|| CoreError::NotFound("no active realm for default tenant".to_string()))?;

	crate::session::SessionService::validate_username_for_realm(&realm, &body.username)?;
	let password_hash = state.sessions.hash_password_for_realm(realm.id, &body.password).await?;
	let user = state.users.create(tenant_id, realm.id, &body.username, &password_hash).await?;

	Ok(RegisterResponse {
		user_id: user.id,
		username: user.username,
	})
}

#[derive(Deserialize)]
pub struct LoginRequest {
	username: String,
	password: String,
}

#[derive(Serialize)]
struct LoginResponse {
	token: String,
	expires_at: chrono::DateTime<chrono::Utc>,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
	match do_login(&state, body).await {
		Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
		Err(e) => e.into_response(),
	}
}

async fn do_login(state: &AppState, body: LoginRequest) -> CoreResult<LoginResponse> {
	if body.username.is_empty() || body.password.is_empty() {
		return Err(CoreError::Input("username and password are required".to_string()));
	}

	let tenant_id = default_tenant_id();
	let (token, expires_at) = state
		.sessions
		.authenticate(SessionKind::Service, tenant_id, &body.username, &body.password)
		.await?;
	state.metrics.sessions_active.inc();

	Ok(LoginResponse { token, expires_at })
}
