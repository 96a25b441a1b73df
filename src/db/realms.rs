use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};

use super::models::Realm;

#[derive(Clone)]
pub struct RealmRepository {
	pool: PgPool,
}

impl RealmRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	const COLUMNS: &'static str = "id, tenant_id, active, min_password_length, max_session_duration_secs, \
		 absolute_session_duration_secs, require_uppercase, require_lowercase, require_digit, \
		 require_symbol, min_unique_chars, max_consecutive_repeated_chars, min_username_length, \
		 max_username_length, mfa_required, rate_limit_rps_override, rate_limit_burst_override";

	/// The active realm for a tenant. Invariant: at least one `active=true`
	/// realm exists per tenant; a `None` here indicates a misprovisioned
	/// tenant, not a normal "not found".
	pub async fn find_active_for_tenant(&self, tenant_id: Uuid) -> CoreResult<Option<Realm>> {
		sqlx::query_as::<_, Realm>(&format!(
			"SELECT {} FROM realms WHERE tenant_id = $1 AND active = true LIMIT 1",
			Self::COLUMNS
		))
		.bind(tenant_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))
	}

	pub async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Realm>> {
		sqlx::query_as::<_, Realm>(&format!("SELECT {} FROM realms WHERE id = $1", Self::COLUMNS))
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| CoreError::Storage(e.to_string()))
	}
}
