use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};

use super::models::User;

#[derive(Clone)]
pub struct UserRepository {
	pool: PgPool,
}

impl UserRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn create(
		&self,
		tenant_id: Uuid,
		realm_id: Uuid,
		username: &str,
		password_hash: &str,
	) -> CoreResult<User> {
		let id = Uuid::now_v7();
		let now = chrono::Utc::now();

		sqlx::query(
			"INSERT INTO users (id, tenant_id, realm_id, username, password_hash, created_at) \
			 VALUES ($1, $2, $3, $4, $5, $6)",
		)
		.bind(id)
		.bind(tenant_id)
		.bind(realm_id)
		.bind(username)
		.bind(password_hash)
		.bind(now)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(db) if db.is_unique_violation() => {
				CoreError::Conflict(format!("username {} already exists for tenant", username))
			}
			other => CoreError::Storage(other.to_string()),
		})?;

		Ok(User {
			id,
			tenant_id,
			realm_id,
			username: username.to_string(),
			password_hash: password_hash.to_string(),
			created_at: now,
		})
	}

	pub async fn find_by_username(&self, tenant_id: Uuid, username: &str) -> CoreResult<Option<User>> {
		sqlx::query_as::<_, User>(
			"SELECT id, tenant_id, realm_id, username, password_hash, created_at FROM users \
			 WHERE tenant_id = $1 AND username = $2",
		)
		.bind(tenant_id)
		.bind(username)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))
	}

	pub async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<User>> {
		sqlx::query_as::<_, User>(
			"SELECT id, tenant_id, realm_id, username, password_hash, created_at FROM users WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))
	}
}
