//! `/service/api/v1/messages/{tx,rx,{id}}` — the authenticated messaging
//! endpoints. `require_service_session` (C4) has already attached a
//! `Principal` to the request by the time these handlers run.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};
use crate::messaging;
use crate::session::Principal;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendRequest {
	receiver_ids: Vec<Uuid>,
	message: String,
}

#[derive(Serialize)]
struct SendResponse {
	message_id: Uuid,
}

pub async fn send(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Json(body): Json<SendRequest>,
) -> Response {
	match do_send(&state, principal, body).await {
		Ok(resp) => (StatusCode::CREATED, Json(resp)).into_response(),
		Err(e) => e.into_response(),
	}
}

async fn do_send(state: &AppState, principal: Principal, body: SendRequest) -> CoreResult<SendResponse> {
	if body.receiver_ids.is_empty() || body.message.is_empty() {
		return Err(CoreError::Input("receiver_ids and message are required".to_string()));
	}
	let sender_id = principal.user_id.ok_or(CoreError::Unauthenticated)?;

	let message_id = messaging::send(
		&state.messages,
		&state.barrier,
		&state.metrics,
		sender_id,
		&body.receiver_ids,
		&body.message,
	)
	.await?;

	Ok(SendResponse { message_id })
}

#[derive(Serialize)]
struct ReceivedMessageView {
	message_id: Uuid,
	sender_pub_key: String,
	encrypted_content: String,
	nonce: String,
	created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ReceiveResponse {
	messages: Vec<ReceivedMessageView>,
}

pub async fn receive(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> Response {
	let recipient_id = match principal.user_id.ok_or(CoreError::Unauthenticated) {
		Ok(id) => id,
		Err(e) => return e.into_response(),
	};
	match messaging::receive(&state.messages, &state.barrier, &state.metrics, recipient_id).await {
		Ok(decrypted) => {
			let messages = decrypted
				.into_iter()
				.map(|m| ReceivedMessageView {
					message_id: m.message_id,
					sender_pub_key: m.sender_pub_key,
					encrypted_content: m.encrypted_content,
					nonce: m.nonce,
					created_at: m.created_at,
				})
				.collect();
			(StatusCode::OK, Json(ReceiveResponse { messages })).into_response()
		}
		Err(e) => e.into_response(),
	}
}

pub async fn delete(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(message_id): Path<Uuid>,
) -> Response {
	let owner_id = match principal.user_id.ok_or(CoreError::Unauthenticated) {
		Ok(id) => id,
		Err(e) => return e.into_response(),
	};
	match messaging::delete(&state.messages, &state.metrics, owner_id, message_id).await {
		Ok(()) => StatusCode::NO_CONTENT.into_response(),
		Err(e) => e.into_response(),
	}
}
