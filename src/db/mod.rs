//! Persistence: connection pool + repositories, standing in for the spec's
//! "transactional relational store" collaborator. PostgreSQL only, via
//! `sqlx` — matching the template's existing dependency; SQLite is not
//! built.

pub mod barrier_keys;
pub mod models;
pub mod realms;
pub mod sessions;
pub mod users;

pub mod messages;

use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

/// The single tenant seeded by migration `1004_seed_default_tenant`. The
/// public API is domain-neutral (no tenant in the request body), so every
/// `/service/api/v1/users/*` call operates within this tenant.
pub fn default_tenant_id() -> Uuid {
	Uuid::nil()
}

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
	PgPoolOptions::new()
		.max_connections(20)
		.connect(database_url)
		.await
}

/// Connect with retry/backoff, for environments where the database
/// container may still be starting up.
pub async fn connect_with_retry(
	database_url: &str,
	max_attempts: u32,
	backoff: std::time::Duration,
) -> Result<PgPool, sqlx::Error> {
	let mut last_err = None;
	for attempt in 1..=max_attempts {
		match connect(database_url).await {
			Ok(pool) => return Ok(pool),
			Err(e) => {
				tracing::warn!(attempt, max_attempts, error = %e, "database connect attempt failed");
				last_err = Some(e);
				if attempt < max_attempts {
					tokio::time::sleep(backoff).await;
				}
			}
		}
	}
	Err(last_err.expect("loop runs at least once"))
}
