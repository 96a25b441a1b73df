use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
	pub id: Uuid,
	pub sender_id: Uuid,
	pub jwe: String,
	pub created_at: DateTime<Utc>,
	pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRecipientJwk {
	pub id: Uuid,
	pub message_id: Uuid,
	pub recipient_id: Uuid,
	pub encrypted_jwk: Vec<u8>,
	pub created_at: DateTime<Utc>,
}

/// A `Message` joined with the caller's own `MessageRecipientJwk` row, the
/// shape the receive operation actually needs.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
	pub message: Message,
	pub encrypted_jwk: Vec<u8>,
	pub sender_username: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub realm_id: Uuid,
	pub username: String,
	pub password_hash: String,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
	Browser,
	Service,
}

/// `principal_id` is opaque text, not a `Uuid`: browser sessions always
/// store a user's UUID there, but a service session's principal reference
/// is a `client_id` that is not guaranteed to be UUID-shaped. Consumers
/// parse it back to a UUID where they need one (see `session::Principal`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
	pub id: String,
	pub tenant_id: Uuid,
	pub realm_id: Uuid,
	pub principal_id: String,
	pub issued_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub absolute_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Realm {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub active: bool,
	pub min_password_length: i32,
	pub max_session_duration_secs: i64,
	pub absolute_session_duration_secs: i64,

	// Password policy (C3 / session registration).
	pub require_uppercase: bool,
	pub require_lowercase: bool,
	pub require_digit: bool,
	pub require_symbol: bool,
	pub min_unique_chars: i32,
	pub max_consecutive_repeated_chars: i32,
	pub min_username_length: i32,
	pub max_username_length: i32,

	// MFA policy / rate-limit overrides: carried on the realm per the data
	// model; no MFA challenge flow or per-realm rate limiter is built.
	pub mfa_required: bool,
	pub rate_limit_rps_override: Option<i32>,
	pub rate_limit_burst_override: Option<i32>,
}
