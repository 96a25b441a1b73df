//! Stand-in for the spec's opaque `JOSEService` collaborator.
//!
//! Restricted to the one mode the messaging engine actually selects: `dir`
//! key management (the content-encryption key is used directly, no key
//! wrapping segment) with `A256GCM` content encryption, serialized as a
//! compact JWE. ECDH-ES/RSA-OAEP/PBES2 key management and other content
//! encryption algorithms are not built — the messaging engine never
//! chooses them.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::errors::CryptoError;

/// A freshly generated, per-message content-encryption key.
pub struct ContentEncryptionKey(pub [u8; 32]);

impl ContentEncryptionKey {
	pub fn generate() -> Self {
		use rand::RngCore;
		let mut bytes = [0u8; 32];
		rand::thread_rng().fill_bytes(&mut bytes);
		Self(bytes)
	}
}

#[derive(Serialize, Deserialize)]
struct JweHeader {
	alg: String,
	enc: String,
}

/// Encrypt `plaintext` under `cek`, producing a `dir`+`A256GCM` compact JWE.
pub fn encrypt_compact(cek: &ContentEncryptionKey, plaintext: &[u8]) -> Result<String, CryptoError> {
	let header = JweHeader {
		alg: "dir".to_string(),
		enc: "A256GCM".to_string(),
	};
	let header_json = serde_json::to_vec(&header)
		.map_err(|e| CryptoError::HeaderMalformed(format!("failed to serialize JWE header: {}", e)))?;
	let header_b64 = URL_SAFE_NO_PAD.encode(header_json);

	let mut iv_bytes = [0u8; 12];
	{
		use rand::RngCore;
		rand::thread_rng().fill_bytes(&mut iv_bytes);
	}
	let iv = Nonce::from_slice(&iv_bytes);

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&cek.0));
	// The protected header is authenticated as JWE AAD, matching the spec
	// for compact serialization.
	let mut sealed = cipher
		.encrypt(
			iv,
			Payload {
				msg: plaintext,
				aad: header_b64.as_bytes(),
			},
		)
		.map_err(|_| CryptoError::AuthTagMismatch)?;

	// `aes_gcm::Aes256Gcm::encrypt` appends the 16-byte tag to the
	// ciphertext; JWE compact serialization carries them as separate
	// base64url segments.
	let tag = sealed.split_off(sealed.len() - 16);
	let ciphertext = sealed;

	Ok(format!(
		"{}..{}.{}.{}",
		header_b64,
		URL_SAFE_NO_PAD.encode(iv_bytes),
		URL_SAFE_NO_PAD.encode(ciphertext),
		URL_SAFE_NO_PAD.encode(tag)
	))
}

/// Decrypt a compact JWE produced by [`encrypt_compact`] under `cek`.
pub fn decrypt_compact(cek: &ContentEncryptionKey, jwe: &str) -> Result<Vec<u8>, CryptoError> {
	let parts: Vec<&str> = jwe.split('.').collect();
	if parts.len() != 5 {
		return Err(CryptoError::HeaderMalformed(format!(
			"expected 5 compact JWE segments, got {}",
			parts.len()
		)));
	}
	let [header_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] =
		[parts[0], parts[1], parts[2], parts[3], parts[4]];

	if !encrypted_key_b64.is_empty() {
		return Err(CryptoError::HeaderMalformed(
			"non-empty encrypted key segment for dir key management".to_string(),
		));
	}

	let header_json = URL_SAFE_NO_PAD
		.decode(header_b64)
		.map_err(|e| CryptoError::HeaderMalformed(format!("invalid header base64: {}", e)))?;
	let header: JweHeader = serde_json::from_slice(&header_json)
		.map_err(|e| CryptoError::HeaderMalformed(format!("invalid header JSON: {}", e)))?;
	if header.alg != "dir" || header.enc != "A256GCM" {
		return Err(CryptoError::HeaderMalformed(format!(
			"unsupported alg/enc: {}/{}",
			header.alg, header.enc
		)));
	}

	let iv = URL_SAFE_NO_PAD
		.decode(iv_b64)
		.map_err(|e| CryptoError::HeaderMalformed(format!("invalid iv base64: {}", e)))?;
	let ciphertext = URL_SAFE_NO_PAD
		.decode(ciphertext_b64)
		.map_err(|e| CryptoError::HeaderMalformed(format!("invalid ciphertext base64: {}", e)))?;
	let tag = URL_SAFE_NO_PAD
		.decode(tag_b64)
		.map_err(|e| CryptoError::HeaderMalformed(format!("invalid tag base64: {}", e)))?;

	if iv.len() != 12 {
		return Err(CryptoError::HeaderMalformed("iv must be 12 bytes".to_string()));
	}

	let mut combined = ciphertext;
	combined.extend_from_slice(&tag);

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&cek.0));
	cipher
		.decrypt(
			Nonce::from_slice(&iv),
			Payload {
				msg: &combined,
				aad: header_b64.as_bytes(),
			},
		)
		.map_err(|_| CryptoError::AuthTagMismatch)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn encrypt_then_decrypt_round_trips() {
		let cek = ContentEncryptionKey::generate();
		let jwe = encrypt_compact(&cek, b"hello, recipient").unwrap();
		assert_eq!(jwe.split('.').count(), 5);
		let plaintext = decrypt_compact(&cek, &jwe).unwrap();
		assert_eq!(plaintext, b"hello, recipient");
	}

	#[test]
	fn wrong_cek_fails_to_decrypt() {
		let cek = ContentEncryptionKey::generate();
		let other = ContentEncryptionKey::generate();
		let jwe = encrypt_compact(&cek, b"secret").unwrap();
		assert!(decrypt_compact(&other, &jwe).is_err());
	}

	#[test]
	fn malformed_jwe_is_rejected() {
		let cek = ContentEncryptionKey::generate();
		assert!(decrypt_compact(&cek, "not.a.valid.jwe").is_err());
	}
}
