use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};

use super::models::{SessionKind, SessionRow};

/// Separate tables for browser and service sessions, per the data model —
/// same row shape, different tables, so a leaked browser session token can
/// never be looked up as a service session or vice versa.
#[derive(Clone)]
pub struct SessionRepository {
	pool: PgPool,
}

impl SessionRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	fn table(kind: SessionKind) -> &'static str {
		match kind {
			SessionKind::Browser => "browser_sessions",
			SessionKind::Service => "service_sessions",
		}
	}

	/// `browser_sessions.principal_id` is still a `UUID` column (it always
	/// references a real user); `service_sessions.principal_id` is `TEXT`
	/// (an opaque client_id). The caller always passes text — cast it back
	/// to `uuid` on the way in for the browser table.
	fn principal_param(kind: SessionKind) -> &'static str {
		match kind {
			SessionKind::Browser => "$4::uuid",
			SessionKind::Service => "$4",
		}
	}

	/// `id` is the opaque token's digest, never the raw bearer token.
	/// `principal_id` is text: a stringified user UUID for browser sessions,
	/// an opaque client_id for service sessions.
	pub async fn create(
		&self,
		kind: SessionKind,
		id: &str,
		tenant_id: Uuid,
		realm_id: Uuid,
		principal_id: &str,
		expires_at: DateTime<Utc>,
		absolute_expires_at: DateTime<Utc>,
	) -> CoreResult<()> {
		let now = Utc::now();
		let query = format!(
			"INSERT INTO {} (id, tenant_id, realm_id, principal_id, issued_at, expires_at, absolute_expires_at) \
			 VALUES ($1, $2, $3, {}, $5, $6, $7)",
			Self::table(kind),
			Self::principal_param(kind)
		);
		sqlx::query(&query)
			.bind(id)
			.bind(tenant_id)
			.bind(realm_id)
			.bind(principal_id)
			.bind(now)
			.bind(expires_at)
			.bind(absolute_expires_at)
			.execute(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))?;
		Ok(())
	}

	/// Look up a session by its token digest. Returns `None` for unknown or
	/// expired sessions; the middleware maps that to 401. `principal_id` is
	/// cast to `text` so the same `SessionRow` shape fits both tables.
	pub async fn find_valid(&self, kind: SessionKind, id: &str) -> CoreResult<Option<SessionRow>> {
		let query = format!(
			"SELECT id, tenant_id, realm_id, principal_id::text AS principal_id, issued_at, expires_at, \
			 absolute_expires_at FROM {} WHERE id = $1 AND expires_at > now() AND absolute_expires_at > now()",
			Self::table(kind)
		);
		sqlx::query_as::<_, SessionRow>(&query)
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))
	}

	pub async fn revoke(&self, kind: SessionKind, id: &str) -> CoreResult<()> {
		let query = format!("DELETE FROM {} WHERE id = $1", Self::table(kind));
		sqlx::query(&query)
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))?;
		Ok(())
	}
}
