//! Persistence seam for the intermediate/content tiers of the barrier key
//! hierarchy. `BarrierService` talks to this trait, never to `sqlx`
//! directly, so the in-memory double below can stand in for tests that
//! don't want a real Postgres instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::CryptoError;

/// A persisted, wrapped intermediate key row.
#[derive(Debug, Clone)]
pub struct IntermediateKeyRow {
	pub id: Uuid,
	pub root_key_id: Uuid,
	pub wrapped_key: Vec<u8>,
	pub rotated_at: Option<DateTime<Utc>>,
}

/// A persisted, wrapped content key row.
#[derive(Debug, Clone)]
pub struct ContentKeyRow {
	pub id: Uuid,
	pub intermediate_key_id: Uuid,
	pub wrapped_key: Vec<u8>,
	pub rotated_at: Option<DateTime<Utc>>,
}

/// Storage seam for the barrier key hierarchy: every intermediate/content
/// key is a row, rotated by appending a new row and flipping which one is
/// current — nothing is ever deleted while a `MessageRecipientJwk` might
/// still reference it.
#[async_trait]
pub trait BarrierKeyStore: Send + Sync {
	/// Idempotently record that `root_id` exists. A root key is never
	/// rotated by this crate (rotation only replaces intermediate/content
	/// tiers), so this is a plain insert-if-absent.
	async fn ensure_root(&self, root_id: Uuid) -> Result<(), CryptoError>;

	/// Every intermediate key ever wrapped under `root_id`, current and
	/// historical alike.
	async fn load_intermediates(&self, root_id: Uuid) -> Result<Vec<IntermediateKeyRow>, CryptoError>;

	/// Every content key ever wrapped under any of `intermediate_ids`.
	async fn load_content_keys(&self, intermediate_ids: &[Uuid]) -> Result<Vec<ContentKeyRow>, CryptoError>;

	async fn insert_intermediate(&self, row: IntermediateKeyRow) -> Result<(), CryptoError>;

	async fn insert_content_key(&self, row: ContentKeyRow) -> Result<(), CryptoError>;

	async fn mark_intermediate_rotated(&self, id: Uuid) -> Result<(), CryptoError>;

	async fn mark_content_key_rotated(&self, id: Uuid) -> Result<(), CryptoError>;
}

/// Test-only in-memory store, mirroring `StaticRootKeySource`'s pattern of
/// keeping unit/lifecycle tests Postgres-free.
#[cfg(feature = "unit-tests")]
pub struct InMemoryBarrierKeyStore {
	inner: tokio::sync::Mutex<InMemoryState>,
}

#[cfg(feature = "unit-tests")]
#[derive(Default)]
struct InMemoryState {
	roots: std::collections::HashSet<Uuid>,
	intermediates: Vec<IntermediateKeyRow>,
	content_keys: Vec<ContentKeyRow>,
}

#[cfg(feature = "unit-tests")]
impl InMemoryBarrierKeyStore {
	pub fn new() -> Self {
		Self {
			inner: tokio::sync::Mutex::new(InMemoryState::default()),
		}
	}
}

#[cfg(feature = "unit-tests")]
impl Default for InMemoryBarrierKeyStore {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(feature = "unit-tests")]
#[async_trait]
impl BarrierKeyStore for InMemoryBarrierKeyStore {
	async fn ensure_root(&self, root_id: Uuid) -> Result<(), CryptoError> {
		self.inner.lock().await.roots.insert(root_id);
		Ok(())
	}

	async fn load_intermediates(&self, root_id: Uuid) -> Result<Vec<IntermediateKeyRow>, CryptoError> {
		let state = self.inner.lock().await;
		Ok(state.intermediates.iter().filter(|r| r.root_key_id == root_id).cloned().collect())
	}

	async fn load_content_keys(&self, intermediate_ids: &[Uuid]) -> Result<Vec<ContentKeyRow>, CryptoError> {
		let state = self.inner.lock().await;
		Ok(state
			.content_keys
			.iter()
			.filter(|r| intermediate_ids.contains(&r.intermediate_key_id))
			.cloned()
			.collect())
	}

	async fn insert_intermediate(&self, row: IntermediateKeyRow) -> Result<(), CryptoError> {
		self.inner.lock().await.intermediates.push(row);
		Ok(())
	}

	async fn insert_content_key(&self, row: ContentKeyRow) -> Result<(), CryptoError> {
		self.inner.lock().await.content_keys.push(row);
		Ok(())
	}

	async fn mark_intermediate_rotated(&self, id: Uuid) -> Result<(), CryptoError> {
		let mut state = self.inner.lock().await;
		if let Some(row) = state.intermediates.iter_mut().find(|r| r.id == id) {
			row.rotated_at = Some(Utc::now());
		}
		Ok(())
	}

	async fn mark_content_key_rotated(&self, id: Uuid) -> Result<(), CryptoError> {
		let mut state = self.inner.lock().await;
		if let Some(row) = state.content_keys.iter_mut().find(|r| r.id == id) {
			row.rotated_at = Some(Utc::now());
		}
		Ok(())
	}
}
