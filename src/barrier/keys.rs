use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use uuid::Uuid;

use crate::errors::CryptoError;

use super::secret::Secret;

/// Self-describing ciphertext produced by a wrap operation.
///
/// Wire shape: `[version: u8][content_key_id: 16 bytes][nonce: 12 bytes][aead ciphertext+tag]`.
pub struct WrappedPayload {
	pub ciphertext_version: u8,
	pub content_key_id: Uuid,
	pub nonce: [u8; 12],
	pub ciphertext: Vec<u8>,
}

const CURRENT_VERSION: u8 = 1;

impl WrappedPayload {
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(1 + 16 + 12 + self.ciphertext.len());
		out.push(self.ciphertext_version);
		out.extend_from_slice(self.content_key_id.as_bytes());
		out.extend_from_slice(&self.nonce);
		out.extend_from_slice(&self.ciphertext);
		out
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
		if bytes.len() < 1 + 16 + 12 {
			return Err(CryptoError::HeaderMalformed(format!(
				"ciphertext too short: {} bytes",
				bytes.len()
			)));
		}
		let ciphertext_version = bytes[0];
		if ciphertext_version != CURRENT_VERSION {
			return Err(CryptoError::HeaderMalformed(format!(
				"unsupported ciphertext version: {}",
				ciphertext_version
			)));
		}
		let content_key_id = Uuid::from_slice(&bytes[1..17])
			.map_err(|e| CryptoError::HeaderMalformed(format!("invalid content_key_id: {}", e)))?;
		let mut nonce = [0u8; 12];
		nonce.copy_from_slice(&bytes[17..29]);
		let ciphertext = bytes[29..].to_vec();
		Ok(Self {
			ciphertext_version,
			content_key_id,
			nonce,
			ciphertext,
		})
	}
}

/// A single AES-256-GCM key in any of the three barrier tiers. Rotation
/// never mutates an existing `BarrierKey`; it appends a new one and flips
/// the "current" pointer held by the owning tier.
pub struct BarrierKey {
	pub id: Uuid,
	secret: Secret<32>,
}

impl BarrierKey {
	pub fn generate() -> Self {
		Self {
			id: Uuid::now_v7(),
			secret: Secret::random(),
		}
	}

	pub fn from_secret(id: Uuid, secret: Secret<32>) -> Self {
		Self { id, secret }
	}

	fn cipher(&self) -> Aes256Gcm {
		Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.secret.as_bytes()))
	}

	/// AEAD-encrypt `plaintext` under this key with a fresh random nonce.
	pub fn seal(&self, plaintext: &[u8]) -> Result<WrappedPayload, CryptoError> {
		use rand::RngCore;
		let mut nonce_bytes = [0u8; 12];
		rand::thread_rng().fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = self
			.cipher()
			.encrypt(nonce, Payload { msg: plaintext, aad: &[] })
			.map_err(|_| CryptoError::AuthTagMismatch)?;

		Ok(WrappedPayload {
			ciphertext_version: CURRENT_VERSION,
			content_key_id: self.id,
			nonce: nonce_bytes,
			ciphertext,
		})
	}

	/// AEAD-decrypt a payload previously sealed by this key.
	pub fn open(&self, payload: &WrappedPayload) -> Result<Vec<u8>, CryptoError> {
		let nonce = Nonce::from_slice(&payload.nonce);
		self.cipher()
			.decrypt(nonce, Payload { msg: &payload.ciphertext, aad: &[] })
			.map_err(|_| CryptoError::AuthTagMismatch)
	}

	/// Wrap this key's raw secret bytes under `wrapping_key`, for storing a
	/// content key under its intermediate (or an intermediate under root).
	pub fn wrap_under(&self, wrapping_key: &BarrierKey) -> Result<WrappedPayload, CryptoError> {
		wrapping_key.seal(self.secret.as_bytes())
	}

	/// Recover a `BarrierKey` whose secret was wrapped under `wrapping_key`.
	pub fn unwrap_under(
		id: Uuid,
		wrapped: &WrappedPayload,
		wrapping_key: &BarrierKey,
	) -> Result<Self, CryptoError> {
		let raw = wrapping_key.open(wrapped)?;
		let bytes: [u8; 32] = raw
			.as_slice()
			.try_into()
			.map_err(|_| CryptoError::HeaderMalformed("unwrapped key has wrong length".to_string()))?;
		Ok(Self::from_secret(id, Secret::new(bytes)))
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn seal_then_open_round_trips() {
		let key = BarrierKey::generate();
		let payload = key.seal(b"hello barrier").unwrap();
		let plaintext = key.open(&payload).unwrap();
		assert_eq!(plaintext, b"hello barrier");
	}

	#[test]
	fn wrapped_payload_round_trips_through_bytes() {
		let key = BarrierKey::generate();
		let payload = key.seal(b"payload").unwrap();
		let bytes = payload.to_bytes();
		let parsed = WrappedPayload::from_bytes(&bytes).unwrap();
		assert_eq!(parsed.content_key_id, payload.content_key_id);
		let plaintext = key.open(&parsed).unwrap();
		assert_eq!(plaintext, b"payload");
	}

	#[test]
	fn tampered_ciphertext_fails_auth() {
		let key = BarrierKey::generate();
		let mut payload = key.seal(b"payload").unwrap();
		let last = payload.ciphertext.len() - 1;
		payload.ciphertext[last] ^= 0xFF;
		assert!(key.open(&payload).is_err());
	}

	#[test]
	fn wrap_unwrap_key_under_key_round_trips() {
		let root = BarrierKey::generate();
		let intermediate = BarrierKey::generate();
		let wrapped = intermediate.wrap_under(&root).unwrap();
		let recovered = BarrierKey::unwrap_under(intermediate.id, &wrapped, &root).unwrap();
		let payload = intermediate.seal(b"content").unwrap();
		let via_recovered = recovered.open(&payload).unwrap();
		assert_eq!(via_recovered, b"content");
	}
}
