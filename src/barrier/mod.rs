//! Barrier Service (C2): stateless per-call content wrap/unwrap over a
//! 3-tier key hierarchy (root -> intermediate -> content).
//!
//! The root key is an external input (see [`BarrierRootKeySource`]); no
//! KMS/HSM integration is built. Intermediate and content keys are
//! persisted rows (see [`store::BarrierKeyStore`]) mirrored into an
//! in-memory cache guarded by a `tokio::sync::RwLock` — reads (wrap/unwrap)
//! take the read lock, rotation takes the write lock, matching the
//! concurrent-read/single-writer model the design calls for. Rotation
//! appends a new row and flips the current pointer; nothing is ever
//! deleted while a `MessageRecipientJwk` might still reference it.

mod keys;
mod root_source;
mod secret;
mod store;

pub use keys::{BarrierKey, WrappedPayload};
pub use root_source::{BarrierRootKeySource, EnvFileRootKeySource};
pub use secret::Secret;
pub use store::{BarrierKeyStore, ContentKeyRow, IntermediateKeyRow};

#[cfg(feature = "unit-tests")]
pub use store::InMemoryBarrierKeyStore;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::CryptoError;

struct BarrierState {
	intermediates: HashMap<Uuid, BarrierKey>,
	current_intermediate_id: Uuid,
	content_keys: HashMap<Uuid, BarrierKey>,
	current_content_key_id: Uuid,
	rotating: bool,
}

pub struct BarrierService {
	root: BarrierKey,
	repo: Arc<dyn BarrierKeyStore>,
	state: RwLock<BarrierState>,
}

impl BarrierService {
	/// Bootstrap the hierarchy for `source`'s root key: if a hierarchy was
	/// already persisted under this root (a restart), every historical
	/// intermediate/content key is loaded and unwrapped so old ciphertext
	/// keeps decrypting; otherwise a fresh one is minted and persisted.
	pub async fn bootstrap(source: &dyn BarrierRootKeySource, repo: Arc<dyn BarrierKeyStore>) -> Result<Self, CryptoError> {
		let root = source.load_root_key()?;
		repo.ensure_root(root.id).await?;

		let intermediate_rows = repo.load_intermediates(root.id).await?;

		if intermediate_rows.is_empty() {
			let intermediate = BarrierKey::generate();
			let wrapped_intermediate = intermediate.wrap_under(&root)?;
			let intermediate_id = intermediate.id;
			repo.insert_intermediate(IntermediateKeyRow {
				id: intermediate_id,
				root_key_id: root.id,
				wrapped_key: wrapped_intermediate.to_bytes(),
				rotated_at: None,
			})
			.await?;

			let content = BarrierKey::generate();
			let wrapped_content = content.wrap_under(&intermediate)?;
			let content_id = content.id;
			repo.insert_content_key(ContentKeyRow {
				id: content_id,
				intermediate_key_id: intermediate_id,
				wrapped_key: wrapped_content.to_bytes(),
				rotated_at: None,
			})
			.await?;

			let mut intermediates = HashMap::new();
			intermediates.insert(intermediate_id, intermediate);
			let mut content_keys = HashMap::new();
			content_keys.insert(content_id, content);

			return Ok(Self {
				root,
				repo,
				state: RwLock::new(BarrierState {
					intermediates,
					current_intermediate_id: intermediate_id,
					content_keys,
					current_content_key_id: content_id,
					rotating: false,
				}),
			});
		}

		let mut intermediates = HashMap::new();
		let mut current_intermediate_id = None;
		for row in &intermediate_rows {
			let wrapped = WrappedPayload::from_bytes(&row.wrapped_key)?;
			let intermediate = BarrierKey::unwrap_under(row.id, &wrapped, &root)?;
			if row.rotated_at.is_none() {
				current_intermediate_id = Some(row.id);
			}
			intermediates.insert(row.id, intermediate);
		}
		let current_intermediate_id = current_intermediate_id.ok_or_else(|| {
			CryptoError::HeaderMalformed("no current (non-rotated) intermediate key on record".to_string())
		})?;

		let intermediate_ids: Vec<Uuid> = intermediate_rows.iter().map(|r| r.id).collect();
		let content_rows = repo.load_content_keys(&intermediate_ids).await?;

		let mut content_keys = HashMap::new();
		let mut current_content_key_id = None;
		for row in &content_rows {
			let wrapping_intermediate = intermediates
				.get(&row.intermediate_key_id)
				.ok_or_else(|| CryptoError::UnknownKeyId(row.intermediate_key_id.to_string()))?;
			let wrapped = WrappedPayload::from_bytes(&row.wrapped_key)?;
			let content = BarrierKey::unwrap_under(row.id, &wrapped, wrapping_intermediate)?;
			if row.rotated_at.is_none() && row.intermediate_key_id == current_intermediate_id {
				current_content_key_id = Some(row.id);
			}
			content_keys.insert(row.id, content);
		}
		let current_content_key_id = current_content_key_id
			.ok_or_else(|| CryptoError::HeaderMalformed("no current (non-rotated) content key on record".to_string()))?;

		Ok(Self {
			root,
			repo,
			state: RwLock::new(BarrierState {
				intermediates,
				current_intermediate_id,
				content_keys,
				current_content_key_id,
				rotating: false,
			}),
		})
	}

	/// Encrypt `plaintext` under the current content key.
	pub async fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
		let state = self.state.read().await;
		let content_key = state
			.content_keys
			.get(&state.current_content_key_id)
			.expect("current_content_key_id always present in content_keys");
		let payload = content_key.seal(plaintext)?;
		Ok(payload.to_bytes())
	}

	/// Decrypt a ciphertext previously produced by [`Self::wrap`]. Any
	/// non-rotated-away content key can decrypt; only the current one can
	/// encrypt.
	pub async fn unwrap(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
		let payload = WrappedPayload::from_bytes(ciphertext)?;
		let state = self.state.read().await;
		let content_key = state
			.content_keys
			.get(&payload.content_key_id)
			.ok_or_else(|| CryptoError::UnknownKeyId(payload.content_key_id.to_string()))?;
		content_key.open(&payload)
	}

	/// Append a new intermediate (wrapped under root) and a new content key
	/// (wrapped under the new intermediate), persist both, mark the
	/// previous current rows rotated, then flip the current pointers. Old
	/// keys remain in the cache, decrypt-only. Concurrent rotations are
	/// rejected rather than interleaved.
	pub async fn rotate(&self) -> Result<(), CryptoError> {
		let mut state = self.state.write().await;
		if state.rotating {
			return Err(CryptoError::RotationInProgress);
		}
		state.rotating = true;

		let result = self.rotate_locked(&mut state).await;
		state.rotating = false;
		result
	}

	async fn rotate_locked(&self, state: &mut BarrierState) -> Result<(), CryptoError> {
		let previous_intermediate_id = state.current_intermediate_id;
		let previous_content_id = state.current_content_key_id;

		let new_intermediate = BarrierKey::generate();
		let wrapped_intermediate = new_intermediate.wrap_under(&self.root)?;
		let new_intermediate_id = new_intermediate.id;

		let new_content = BarrierKey::generate();
		let wrapped_content = new_content.wrap_under(&new_intermediate)?;
		let new_content_id = new_content.id;

		self.repo
			.insert_intermediate(IntermediateKeyRow {
				id: new_intermediate_id,
				root_key_id: self.root.id,
				wrapped_key: wrapped_intermediate.to_bytes(),
				rotated_at: None,
			})
			.await?;
		self.repo
			.insert_content_key(ContentKeyRow {
				id: new_content_id,
				intermediate_key_id: new_intermediate_id,
				wrapped_key: wrapped_content.to_bytes(),
				rotated_at: None,
			})
			.await?;
		self.repo.mark_intermediate_rotated(previous_intermediate_id).await?;
		self.repo.mark_content_key_rotated(previous_content_id).await?;

		state.intermediates.insert(new_intermediate_id, new_intermediate);
		state.content_keys.insert(new_content_id, new_content);
		state.current_intermediate_id = new_intermediate_id;
		state.current_content_key_id = new_content_id;

		Ok(())
	}

	pub async fn current_content_key_id(&self) -> Uuid {
		self.state.read().await.current_content_key_id
	}
}

pub type SharedBarrier = Arc<BarrierService>;

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	fn test_root_source() -> root_source::StaticRootKeySource {
		root_source::StaticRootKeySource::new(Secret::random())
	}

	#[tokio::test]
	async fn wrap_then_unwrap_round_trips() {
		let barrier = BarrierService::bootstrap(&test_root_source(), Arc::new(InMemoryBarrierKeyStore::new()))
			.await
			.unwrap();
		let ciphertext = barrier.wrap(b"per-recipient CEK bytes").await.unwrap();
		let plaintext = barrier.unwrap(&ciphertext).await.unwrap();
		assert_eq!(plaintext, b"per-recipient CEK bytes");
	}

	#[tokio::test]
	async fn unknown_content_key_id_is_rejected() {
		let barrier = BarrierService::bootstrap(&test_root_source(), Arc::new(InMemoryBarrierKeyStore::new()))
			.await
			.unwrap();
		let mut ciphertext = barrier.wrap(b"x").await.unwrap();
		// Corrupt the content_key_id field (bytes [1..17]) so it no longer
		// matches any cached key.
		for b in &mut ciphertext[1..17] {
			*b ^= 0xFF;
		}
		let err = barrier.unwrap(&ciphertext).await.unwrap_err();
		assert!(matches!(err, CryptoError::UnknownKeyId(_)));
	}

	#[tokio::test]
	async fn old_content_keys_still_decrypt_after_rotation() {
		let barrier = BarrierService::bootstrap(&test_root_source(), Arc::new(InMemoryBarrierKeyStore::new()))
			.await
			.unwrap();
		let ciphertext = barrier.wrap(b"before rotation").await.unwrap();

		barrier.rotate().await.unwrap();

		let plaintext = barrier.unwrap(&ciphertext).await.unwrap();
		assert_eq!(plaintext, b"before rotation");

		let new_ciphertext = barrier.wrap(b"after rotation").await.unwrap();
		assert_ne!(
			WrappedPayload::from_bytes(&ciphertext).unwrap().content_key_id,
			WrappedPayload::from_bytes(&new_ciphertext).unwrap().content_key_id
		);
	}

	/// Proves the fix directly: bootstrapping a second `BarrierService`
	/// against the same root source and the same repository (simulating a
	/// process restart against the same database) must reload the exact
	/// same hierarchy, so ciphertext from before the "restart" still opens.
	#[tokio::test]
	async fn bootstrap_reloads_persisted_hierarchy_on_restart() {
		let root_source = test_root_source();
		let repo: Arc<dyn BarrierKeyStore> = Arc::new(InMemoryBarrierKeyStore::new());

		let first = BarrierService::bootstrap(&root_source, repo.clone()).await.unwrap();
		let ciphertext = first.wrap(b"persisted across restart").await.unwrap();

		let second = BarrierService::bootstrap(&root_source, repo.clone()).await.unwrap();
		let plaintext = second.unwrap(&ciphertext).await.unwrap();
		assert_eq!(plaintext, b"persisted across restart");

		// The reloaded hierarchy's current content key must be the same one
		// `first` encrypted under, not a freshly minted one.
		assert_eq!(first.current_content_key_id().await, second.current_content_key_id().await);
	}

	#[tokio::test]
	async fn bootstrap_is_idempotent_when_called_twice_without_intervening_writes() {
		let root_source = test_root_source();
		let repo: Arc<dyn BarrierKeyStore> = Arc::new(InMemoryBarrierKeyStore::new());

		let first = BarrierService::bootstrap(&root_source, repo.clone()).await.unwrap();
		let second = BarrierService::bootstrap(&root_source, repo.clone()).await.unwrap();

		assert_eq!(first.current_content_key_id().await, second.current_content_key_id().await);
	}
}
