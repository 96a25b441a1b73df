use std::path::PathBuf;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::CryptoError;

use super::keys::BarrierKey;
use super::secret::Secret;

/// Derive the root key's database row id from the secret bytes themselves,
/// so the same physical root secret always resolves to the same
/// `barrier_root_keys` row across restarts — `Uuid::now_v7` would mint a
/// fresh id every process start and orphan every previously-persisted
/// intermediate/content key.
fn derive_root_key_id(secret_bytes: &[u8; 32]) -> Uuid {
	let digest = Sha256::digest(secret_bytes);
	let mut bytes = [0u8; 16];
	bytes.copy_from_slice(&digest[..16]);
	Uuid::from_bytes(bytes)
}

/// The barrier root key is an input, not something this crate manufactures
/// in production. `BarrierRootKeySource` is the seam a deployment plugs a
/// real key-management integration into; no KMS/HSM client is built here.
pub trait BarrierRootKeySource: Send + Sync {
	fn load_root_key(&self) -> Result<BarrierKey, CryptoError>;
}

/// Reads a 32-byte root key from `SIGNET_BARRIER_ROOT_KEY_HEX` if set,
/// otherwise from a file at the configured path (raw 32 bytes, or hex text).
pub struct EnvFileRootKeySource {
	path: PathBuf,
}

impl EnvFileRootKeySource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	fn decode_hex(hex: &str) -> Result<[u8; 32], CryptoError> {
		let hex = hex.trim();
		if hex.len() != 64 {
			return Err(CryptoError::HeaderMalformed(
				"root key hex must be 64 characters (32 bytes)".to_string(),
			));
		}
		let mut out = [0u8; 32];
		for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
			let s = std::str::from_utf8(chunk)
				.map_err(|_| CryptoError::HeaderMalformed("root key is not valid UTF-8 hex".to_string()))?;
			out[i] = u8::from_str_radix(s, 16)
				.map_err(|_| CryptoError::HeaderMalformed("root key contains invalid hex digits".to_string()))?;
		}
		Ok(out)
	}
}

impl BarrierRootKeySource for EnvFileRootKeySource {
	fn load_root_key(&self) -> Result<BarrierKey, CryptoError> {
		if let Ok(hex) = std::env::var("SIGNET_BARRIER_ROOT_KEY_HEX") {
			let bytes = Self::decode_hex(&hex)?;
			return Ok(BarrierKey::from_secret(derive_root_key_id(&bytes), Secret::new(bytes)));
		}

		let raw = std::fs::read(&self.path).map_err(|e| {
			CryptoError::HeaderMalformed(format!(
				"failed to read barrier root key file {}: {}",
				self.path.display(),
				e
			))
		})?;

		let bytes: [u8; 32] = if raw.len() == 32 {
			raw.try_into().expect("length checked above")
		} else {
			let text = String::from_utf8_lossy(&raw);
			Self::decode_hex(&text)?
		};

		Ok(BarrierKey::from_secret(derive_root_key_id(&bytes), Secret::new(bytes)))
	}
}

/// Test-only root source holding an already-generated secret in memory.
#[cfg(feature = "unit-tests")]
pub struct StaticRootKeySource {
	secret: Secret<32>,
}

#[cfg(feature = "unit-tests")]
impl StaticRootKeySource {
	pub fn new(secret: Secret<32>) -> Self {
		Self { secret }
	}
}

#[cfg(feature = "unit-tests")]
impl BarrierRootKeySource for StaticRootKeySource {
	fn load_root_key(&self) -> Result<BarrierKey, CryptoError> {
		Ok(BarrierKey::from_secret(derive_root_key_id(self.secret.as_bytes()), self.secret.clone()))
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn hex_env_var_takes_precedence_over_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("root.key");
		std::fs::write(&path, [0u8; 32]).unwrap();

		unsafe { std::env::set_var("SIGNET_BARRIER_ROOT_KEY_HEX", "ab".repeat(32)) };
		let source = EnvFileRootKeySource::new(&path);
		// Two independent loads of the same env-supplied hex must yield the
		// same secret bytes (proving the all-zero file was NOT used), which
		// we verify by cross-decrypting rather than peeking at the secret.
		let key1 = source.load_root_key().unwrap();
		let key2 = source.load_root_key().unwrap();
		let payload = key1.seal(b"probe").unwrap();
		let plaintext = key2.open(&payload).unwrap();
		assert_eq!(plaintext, b"probe");
		unsafe { std::env::remove_var("SIGNET_BARRIER_ROOT_KEY_HEX") };
	}
}
