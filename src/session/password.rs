//! Versioned PBKDF2-HMAC-SHA-256 password hashing, self-describing on disk
//! so the iteration count can be raised later without breaking existing
//! hashes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::CoreError;

pub const MIN_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash format: `pbkdf2-sha256$<iterations>$<salt-b64>$<hash-b64>`.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, CoreError> {
	if iterations < MIN_ITERATIONS {
		return Err(CoreError::Input(format!(
			"iteration count {} below minimum {}",
			iterations, MIN_ITERATIONS
		)));
	}

	let mut salt = [0u8; SALT_LEN];
	rand::thread_rng().fill_bytes(&mut salt);

	let mut out = [0u8; HASH_LEN];
	pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut out);

	Ok(format!(
		"pbkdf2-sha256${}${}${}",
		iterations,
		STANDARD.encode(salt),
		STANDARD.encode(out)
	))
}

/// Constant-time verification against a self-describing hash produced by
/// [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CoreError> {
	let mut parts = stored.split('$');
	let algorithm = parts.next().ok_or_else(|| malformed(stored))?;
	if algorithm != "pbkdf2-sha256" {
		return Err(CoreError::Input(format!("unsupported password hash algorithm: {}", algorithm)));
	}
	let iterations: u32 = parts
		.next()
		.ok_or_else(|| malformed(stored))?
		.parse()
		.map_err(|_| malformed(stored))?;
	let salt = STANDARD
		.decode(parts.next().ok_or_else(|| malformed(stored))?)
		.map_err(|_| malformed(stored))?;
	let expected = STANDARD
		.decode(parts.next().ok_or_else(|| malformed(stored))?)
		.map_err(|_| malformed(stored))?;

	let mut actual = vec![0u8; expected.len()];
	pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);

	Ok(bool::from(actual.ct_eq(&expected)))
}

fn malformed(stored: &str) -> CoreError {
	CoreError::Input(format!("malformed password hash: {}", stored))
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	// A reduced iteration count keeps the unit test suite fast; production
	// callers always pass MIN_ITERATIONS or higher via the realm policy.
	const TEST_ITERATIONS: u32 = 600_000;

	#[test]
	fn hash_then_verify_round_trips() {
		let hash = hash_password("correct horse battery staple", TEST_ITERATIONS).unwrap();
		assert!(verify_password("correct horse battery staple", &hash).unwrap());
		assert!(!verify_password("wrong password", &hash).unwrap());
	}

	#[test]
	fn rejects_below_minimum_iterations() {
		assert!(hash_password("password", 1_000).is_err());
	}

	#[test]
	fn rejects_malformed_stored_hash() {
		assert!(verify_password("password", "not-a-valid-hash").is_err());
	}

	#[test]
	fn distinct_salts_produce_distinct_hashes() {
		let a = hash_password("same password", TEST_ITERATIONS).unwrap();
		let b = hash_password("same password", TEST_ITERATIONS).unwrap();
		assert_ne!(a, b);
	}
}
