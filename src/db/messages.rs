use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};

use super::models::{Message, MessageRecipientJwk, ReceivedMessage};

#[derive(sqlx::FromRow)]
struct ReceivedMessageRow {
	id: Uuid,
	sender_id: Uuid,
	jwe: String,
	created_at: chrono::DateTime<Utc>,
	read_at: Option<chrono::DateTime<Utc>>,
	encrypted_jwk: Vec<u8>,
	sender_username: String,
}

impl ReceivedMessageRow {
	fn into_received(self) -> ReceivedMessage {
		ReceivedMessage {
			message: Message {
				id: self.id,
				sender_id: self.sender_id,
				jwe: self.jwe,
				created_at: self.created_at,
				read_at: self.read_at,
			},
			encrypted_jwk: self.encrypted_jwk,
			sender_username: self.sender_username,
		}
	}
}

#[derive(Clone)]
pub struct MessageRepository {
	pool: PgPool,
}

impl MessageRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Insert the `Message` row and one `MessageRecipientJwk` row per
	/// recipient atomically — either all rows land or none do.
	pub async fn send(
		&self,
		sender_id: Uuid,
		jwe: &str,
		recipient_wrapped_jwks: &[(Uuid, Vec<u8>)],
	) -> CoreResult<Uuid> {
		let message_id = Uuid::now_v7();
		let now = Utc::now();

		let mut tx = self
			.pool
			.begin()
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))?;

		sqlx::query(
			"INSERT INTO messages (id, sender_id, jwe, created_at, read_at) VALUES ($1, $2, $3, $4, NULL)",
		)
		.bind(message_id)
		.bind(sender_id)
		.bind(jwe)
		.bind(now)
		.execute(&mut *tx)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))?;

		for (recipient_id, encrypted_jwk) in recipient_wrapped_jwks {
			sqlx::query(
				"INSERT INTO message_recipient_jwks (id, message_id, recipient_id, encrypted_jwk, created_at) \
				 VALUES ($1, $2, $3, $4, $5)",
			)
			.bind(Uuid::now_v7())
			.bind(message_id)
			.bind(recipient_id)
			.bind(encrypted_jwk)
			.bind(now)
			.execute(&mut *tx)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))?;
		}

		tx.commit().await.map_err(|e| CoreError::Storage(e.to_string()))?;

		Ok(message_id)
	}

	/// List messages addressed to `recipient_id`, most recent first
	/// (`created_at` DESC, UUIDv7 tie-break — UUIDv7 is itself
	/// time-ordered, so ordering by `id` DESC as the tiebreak is correct).
	pub async fn list_for_recipient(&self, recipient_id: Uuid) -> CoreResult<Vec<ReceivedMessage>> {
		let rows: Vec<ReceivedMessageRow> = sqlx::query_as(
			"SELECT m.id, m.sender_id, m.jwe, m.created_at, m.read_at, \
			        r.encrypted_jwk, u.username AS sender_username \
			 FROM messages m \
			 JOIN message_recipient_jwks r ON r.message_id = m.id \
			 JOIN users u ON u.id = m.sender_id \
			 WHERE r.recipient_id = $1 \
			 ORDER BY m.created_at DESC, m.id DESC",
		)
		.bind(recipient_id)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))?;

		Ok(rows.into_iter().map(ReceivedMessageRow::into_received).collect())
	}

	/// Best-effort mark-as-read: independent of whether the caller
	/// subsequently manages to decrypt the payload.
	pub async fn mark_as_read(&self, message_id: Uuid) -> CoreResult<()> {
		sqlx::query("UPDATE messages SET read_at = $1 WHERE id = $2 AND read_at IS NULL")
			.bind(Utc::now())
			.bind(message_id)
			.execute(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))?;
		Ok(())
	}

	/// Delete a message and cascade its recipient rows. Returns `Ok(())`
	/// whether or not a row existed (idempotent); the caller is responsible
	/// for the 404/403 authorization checks before calling this.
	pub async fn delete(&self, message_id: Uuid) -> CoreResult<()> {
		sqlx::query("DELETE FROM messages WHERE id = $1")
			.bind(message_id)
			.execute(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))?;
		Ok(())
	}

	pub async fn get(&self, message_id: Uuid) -> CoreResult<Option<Message>> {
		sqlx::query_as::<_, Message>("SELECT id, sender_id, jwe, created_at, read_at FROM messages WHERE id = $1")
			.bind(message_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))
	}

	#[allow(dead_code)]
	async fn recipient_row(&self, message_id: Uuid, recipient_id: Uuid) -> CoreResult<Option<MessageRecipientJwk>> {
		sqlx::query_as::<_, MessageRecipientJwk>(
			"SELECT id, message_id, recipient_id, encrypted_jwk, created_at FROM message_recipient_jwks \
			 WHERE message_id = $1 AND recipient_id = $2",
		)
		.bind(message_id)
		.bind(recipient_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))
	}
}
