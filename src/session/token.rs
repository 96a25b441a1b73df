//! Opaque bearer tokens: a random token is handed to the caller once, and
//! only its digest is ever persisted, so a database read can't recover a
//! usable credential.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

pub struct IssuedToken {
	/// Returned to the caller exactly once; never persisted.
	pub bearer_token: String,
	/// Persisted as the session row's primary key.
	pub digest: String,
}

pub fn issue() -> IssuedToken {
	let mut bytes = [0u8; TOKEN_BYTES];
	rand::thread_rng().fill_bytes(&mut bytes);
	let bearer_token = URL_SAFE_NO_PAD.encode(bytes);
	IssuedToken {
		digest: digest(&bearer_token),
		bearer_token,
	}
}

pub fn digest(bearer_token: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(bearer_token.as_bytes());
	hex::encode(hasher.finalize())
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn issued_token_digest_is_deterministic() {
		let issued = issue();
		assert_eq!(digest(&issued.bearer_token), issued.digest);
	}

	#[test]
	fn two_issued_tokens_differ() {
		let a = issue();
		let b = issue();
		assert_ne!(a.bearer_token, b.bearer_token);
		assert_ne!(a.digest, b.digest);
	}
}
