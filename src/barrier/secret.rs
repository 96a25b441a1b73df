use zeroize::{Zeroize, ZeroizeOnDrop};

/// Fixed-length secret key material that zeroizes on drop and never prints
/// its contents via `Debug`/`Display`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret<const LENGTH: usize> {
	bytes: [u8; LENGTH],
}

impl<const LENGTH: usize> Secret<LENGTH> {
	pub fn new(bytes: [u8; LENGTH]) -> Self {
		Self { bytes }
	}

	pub fn random() -> Self {
		use rand::RngCore;
		let mut bytes = [0u8; LENGTH];
		rand::thread_rng().fill_bytes(&mut bytes);
		Self { bytes }
	}

	pub fn as_bytes(&self) -> &[u8; LENGTH] {
		&self.bytes
	}
}

impl<const LENGTH: usize> std::fmt::Debug for Secret<LENGTH> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Secret<{}>(REDACTED)", LENGTH)
	}
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn debug_does_not_leak_bytes() {
		let secret = Secret::<32>::new([0xAB; 32]);
		let rendered = format!("{:?}", secret);
		assert!(!rendered.contains("171")); // 0xAB as decimal
		assert!(rendered.contains("REDACTED"));
	}
}
