//! Messaging Engine (C8): encrypts a message once under a freshly
//! generated CEK, stores the JWE, persists a barrier-wrapped copy of the
//! CEK per recipient, and serves receive/delete.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::barrier::SharedBarrier;
use crate::db::messages::MessageRepository;
use crate::errors::{CoreError, CoreResult};
use crate::jose::{self, ContentEncryptionKey};
use crate::observability::MetricsRegistry;

pub struct DecryptedMessage {
	pub message_id: Uuid,
	/// Open question left unresolved in the source: this field is
	/// populated with the sender's username, not a public key. Kept as-is.
	pub sender_pub_key: String,
	pub encrypted_content: String,
	pub nonce: String,
	pub created_at: DateTime<Utc>,
}

/// Encrypt `plaintext` once under a fresh CEK, then wrap that CEK under the
/// barrier once per recipient, and persist all of it in a single
/// transaction. Any failure before commit rolls back entirely.
pub async fn send(
	messages: &MessageRepository,
	barrier: &SharedBarrier,
	metrics: &MetricsRegistry,
	sender_id: Uuid,
	recipient_ids: &[Uuid],
	plaintext: &str,
) -> CoreResult<Uuid> {
	if recipient_ids.is_empty() {
		return Err(CoreError::Input("receiver_ids must not be empty".to_string()));
	}

	let cek = ContentEncryptionKey::generate();
	let jwe = jose::encrypt_compact(&cek, plaintext.as_bytes()).map_err(CoreError::Crypto)?;

	let mut wrapped_per_recipient = Vec::with_capacity(recipient_ids.len());
	for recipient_id in recipient_ids {
		let wrapped = barrier.wrap(&cek.0).await.map_err(CoreError::Crypto)?;
		metrics.barrier_wrap_total.inc();
		wrapped_per_recipient.push((*recipient_id, wrapped));
	}

	let message_id = messages.send(sender_id, &jwe, &wrapped_per_recipient).await?;
	metrics.messages_sent_total.inc();

	Ok(message_id)
}

/// Load every message addressed to `recipient_id`, mark each as read
/// (best-effort — a failure there does not abort the batch), then decrypt.
/// A message that fails to unwrap/decrypt is skipped silently rather than
/// surfacing partial data.
pub async fn receive(
	messages: &MessageRepository,
	barrier: &SharedBarrier,
	metrics: &MetricsRegistry,
	recipient_id: Uuid,
) -> CoreResult<Vec<DecryptedMessage>> {
	let rows = messages.list_for_recipient(recipient_id).await?;

	let mut out = Vec::with_capacity(rows.len());
	for row in rows {
		if let Err(e) = messages.mark_as_read(row.message.id).await {
			tracing::warn!(message_id = %row.message.id, error = %e, "mark_as_read failed");
		}

		let cek_bytes = match barrier.unwrap(&row.encrypted_jwk).await {
			Ok(bytes) => bytes,
			Err(e) => {
				tracing::warn!(message_id = %row.message.id, error = %e, "barrier unwrap failed, skipping");
				metrics.messaging_errors_total.inc();
				continue;
			}
		};
		metrics.barrier_unwrap_total.inc();

		let cek = match <[u8; 32]>::try_from(cek_bytes.as_slice()) {
			Ok(bytes) => ContentEncryptionKey(bytes),
			Err(_) => {
				tracing::warn!(message_id = %row.message.id, "unwrapped CEK has unexpected length, skipping");
				metrics.messaging_errors_total.inc();
				continue;
			}
		};

		let plaintext = match jose::decrypt_compact(&cek, &row.message.jwe) {
			Ok(p) => p,
			Err(e) => {
				tracing::warn!(message_id = %row.message.id, error = %e, "JWE decrypt failed, skipping");
				metrics.messaging_errors_total.inc();
				continue;
			}
		};

		let nonce = row
			.message
			.jwe
			.split('.')
			.nth(2)
			.map(str::to_string)
			.unwrap_or_default();

		out.push(DecryptedMessage {
			message_id: row.message.id,
			sender_pub_key: row.sender_username,
			encrypted_content: String::from_utf8_lossy(&plaintext).into_owned(),
			nonce,
			created_at: row.message.created_at,
		});
		metrics.messages_received_total.inc();
	}

	Ok(out)
}

/// Delete a message, enforcing that only its sender may do so. Both the
/// 404 (not found) and 403 (not sender) checks happen before any mutation.
pub async fn delete(
	messages: &MessageRepository,
	metrics: &MetricsRegistry,
	sender_id: Uuid,
	message_id: Uuid,
) -> CoreResult<()> {
	let message = messages
		.get(message_id)
		.await?
		.ok_or_else(|| CoreError::NotFound(format!("message {}", message_id)))?;

	if message.sender_id != sender_id {
		return Err(CoreError::Forbidden);
	}

	messages.delete(message_id).await?;
	metrics.messages_deleted_total.inc();
	Ok(())
}
