use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::barrier::{BarrierKeyStore, ContentKeyRow, IntermediateKeyRow};
use crate::errors::CryptoError;

/// Postgres-backed `BarrierKeyStore`, over the `barrier_root_keys` /
/// `barrier_intermediate_keys` / `barrier_content_keys` tables.
#[derive(Clone)]
pub struct BarrierKeyRepository {
	pool: PgPool,
}

impl BarrierKeyRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl BarrierKeyStore for BarrierKeyRepository {
	async fn ensure_root(&self, root_id: Uuid) -> Result<(), CryptoError> {
		sqlx::query("INSERT INTO barrier_root_keys (id, created_at) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
			.bind(root_id)
			.bind(Utc::now())
			.execute(&self.pool)
			.await
			.map_err(|e| CryptoError::Storage(e.to_string()))?;
		Ok(())
	}

	async fn load_intermediates(&self, root_id: Uuid) -> Result<Vec<IntermediateKeyRow>, CryptoError> {
		let rows: Vec<(Uuid, Uuid, Vec<u8>, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
			"SELECT id, root_key_id, wrapped_key, rotated_at FROM barrier_intermediate_keys WHERE root_key_id = $1",
		)
		.bind(root_id)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| CryptoError::Storage(e.to_string()))?;

		Ok(rows
			.into_iter()
			.map(|(id, root_key_id, wrapped_key, rotated_at)| IntermediateKeyRow {
				id,
				root_key_id,
				wrapped_key,
				rotated_at,
			})
			.collect())
	}

	async fn load_content_keys(&self, intermediate_ids: &[Uuid]) -> Result<Vec<ContentKeyRow>, CryptoError> {
		let rows: Vec<(Uuid, Uuid, Vec<u8>, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
			"SELECT id, intermediate_key_id, wrapped_key, rotated_at \
			 FROM barrier_content_keys WHERE intermediate_key_id = ANY($1)",
		)
		.bind(intermediate_ids)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| CryptoError::Storage(e.to_string()))?;

		Ok(rows
			.into_iter()
			.map(|(id, intermediate_key_id, wrapped_key, rotated_at)| ContentKeyRow {
				id,
				intermediate_key_id,
				wrapped_key,
				rotated_at,
			})
			.collect())
	}

	async fn insert_intermediate(&self, row: IntermediateKeyRow) -> Result<(), CryptoError> {
		sqlx::query(
			"INSERT INTO barrier_intermediate_keys (id, root_key_id, wrapped_key, created_at) \
			 VALUES ($1, $2, $3, $4)",
		)
		.bind(row.id)
		.bind(row.root_key_id)
		.bind(row.wrapped_key)
		.bind(Utc::now())
		.execute(&self.pool)
		.await
		.map_err(|e| CryptoError::Storage(e.to_string()))?;
		Ok(())
	}

	async fn insert_content_key(&self, row: ContentKeyRow) -> Result<(), CryptoError> {
		sqlx::query(
			"INSERT INTO barrier_content_keys (id, intermediate_key_id, wrapped_key, created_at) \
			 VALUES ($1, $2, $3, $4)",
		)
		.bind(row.id)
		.bind(row.intermediate_key_id)
		.bind(row.wrapped_key)
		.bind(Utc::now())
		.execute(&self.pool)
		.await
		.map_err(|e| CryptoError::Storage(e.to_string()))?;
		Ok(())
	}

	async fn mark_intermediate_rotated(&self, id: Uuid) -> Result<(), CryptoError> {
		sqlx::query("UPDATE barrier_intermediate_keys SET rotated_at = $2 WHERE id = $1 AND rotated_at IS NULL")
			.bind(id)
			.bind(Utc::now())
			.execute(&self.pool)
			.await
			.map_err(|e| CryptoError::Storage(e.to_string()))?;
		Ok(())
	}

	async fn mark_content_key_rotated(&self, id: Uuid) -> Result<(), CryptoError> {
		sqlx::query("UPDATE barrier_content_keys SET rotated_at = $2 WHERE id = $1 AND rotated_at IS NULL")
			.bind(id)
			.bind(Utc::now())
			.execute(&self.pool)
			.await
			.map_err(|e| CryptoError::Storage(e.to_string()))?;
		Ok(())
	}
}
