//! Session Store & Validator (C3).
//!
//! Persists browser and service sessions, validates bearer tokens down to a
//! `(tenant_id, realm_id, principal)` triple, and enforces realm password
//! policy at hashing time.

pub mod password;
pub mod token;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::db::models::{Realm, SessionKind};
use crate::db::realms::RealmRepository;
use crate::db::sessions::SessionRepository;
use crate::db::users::UserRepository;
use crate::errors::{CoreError, CoreResult};

/// The `(tenant_id, realm_id, principal)` triple a validated bearer token
/// resolves to. `client_id` is the raw principal reference as stored —
/// always present. `user_id` is `client_id` parsed as a UUID; it is only
/// `None` for a service session whose client_id never was UUID-shaped.
/// Handlers that need an authenticated user MUST treat `user_id: None` as
/// unauthenticated, never fall back to `client_id`.
#[derive(Debug, Clone)]
pub struct Principal {
	pub tenant_id: Uuid,
	pub realm_id: Uuid,
	pub client_id: String,
	pub user_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct SessionService {
	users: UserRepository,
	sessions: SessionRepository,
	realms: RealmRepository,
}

impl SessionService {
	pub fn new(users: UserRepository, sessions: SessionRepository, realms: RealmRepository) -> Self {
		Self { users, sessions, realms }
	}

	/// The active realm for a tenant — the policy bundle registration and
	/// login both need before touching passwords or sessions.
	pub async fn realm_for_tenant(&self, tenant_id: Uuid) -> CoreResult<Option<Realm>> {
		self.realms.find_active_for_tenant(tenant_id).await
	}

	/// Hash a new password under the target realm's policy (the iteration
	/// count floor is a crate-wide constant, not per-realm).
	pub async fn hash_password_for_realm(&self, realm_id: Uuid, password: &str) -> CoreResult<String> {
		let realm = self
			.realms
			.find_by_id(realm_id)
			.await?
			.ok_or_else(|| CoreError::NotFound(format!("realm {}", realm_id)))?;

		validate_password_policy(&realm, password)?;

		password::hash_password(password, password::MIN_ITERATIONS)
	}

	/// Check a candidate username against the realm's length bounds. Does
	/// not touch the database; the caller already has the realm in hand.
	pub fn validate_username_for_realm(realm: &Realm, username: &str) -> CoreResult<()> {
		let len = username.chars().count();
		if len < realm.min_username_length as usize {
			return Err(CoreError::Input(format!(
				"username shorter than realm policy minimum of {} characters",
				realm.min_username_length
			)));
		}
		if len > realm.max_username_length as usize {
			return Err(CoreError::Input(format!(
				"username longer than realm policy maximum of {} characters",
				realm.max_username_length
			)));
		}
		Ok(())
	}

	/// Verify a username/password pair against the active realm for a
	/// tenant and, on success, issue a new session of the given kind.
	pub async fn authenticate(
		&self,
		kind: SessionKind,
		tenant_id: Uuid,
		username: &str,
		password: &str,
	) -> CoreResult<(String, chrono::DateTime<Utc>)> {
		let user = self
			.users
			.find_by_username(tenant_id, username)
			.await?
			.ok_or(CoreError::Unauthenticated)?;

		if !password::verify_password(password, &user.password_hash)? {
			return Err(CoreError::Unauthenticated);
		}

		let realm = self
			.realms
			.find_by_id(user.realm_id)
			.await?
			.ok_or_else(|| CoreError::NotFound(format!("realm {}", user.realm_id)))?;

		let issued = token::issue();
		let now = Utc::now();
		let expires_at = now + Duration::seconds(realm.max_session_duration_secs);
		let absolute_expires_at = now + Duration::seconds(realm.absolute_session_duration_secs);

		self.sessions
			.create(
				kind,
				&issued.digest,
				tenant_id,
				user.realm_id,
				&user.id.to_string(),
				expires_at,
				absolute_expires_at,
			)
			.await?;

		Ok((issued.bearer_token, expires_at))
	}

	/// Resolve a raw bearer token to its principal. Returns `None` for an
	/// unknown, expired, or malformed token — the middleware maps that to
	/// 401, never a more specific error (no session-enumeration signal).
	///
	/// `client_id` is exposed regardless of shape; `user_id` is only set
	/// when `client_id` parses as a UUID. A service session whose client_id
	/// is not UUID-shaped resolves to a `Principal` with `user_id: None` —
	/// callers that need an authenticated user must treat that as absent.
	pub async fn validate(&self, kind: SessionKind, bearer_token: &str) -> CoreResult<Option<Principal>> {
		let digest = token::digest(bearer_token);
		let row = self.sessions.find_valid(kind, &digest).await?;
		Ok(row.map(|r| Principal {
			tenant_id: r.tenant_id,
			realm_id: r.realm_id,
			user_id: Uuid::parse_str(&r.principal_id).ok(),
			client_id: r.principal_id,
		}))
	}

	pub async fn revoke(&self, kind: SessionKind, bearer_token: &str) -> CoreResult<()> {
		let digest = token::digest(bearer_token);
		self.sessions.revoke(kind, &digest).await
	}
}

/// Five rules from the realm's password policy: minimum length, mandatory
/// character classes, minimum unique characters, and maximum run of
/// consecutive identical characters.
fn validate_password_policy(realm: &Realm, password: &str) -> CoreResult<()> {
	if password.len() < realm.min_password_length as usize {
		return Err(CoreError::Input(format!(
			"password shorter than realm policy minimum of {} characters",
			realm.min_password_length
		)));
	}
	if realm.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
		return Err(CoreError::Input("password must contain an uppercase character".to_string()));
	}
	if realm.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
		return Err(CoreError::Input("password must contain a lowercase character".to_string()));
	}
	if realm.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
		return Err(CoreError::Input("password must contain a digit".to_string()));
	}
	if realm.require_symbol && !password.chars().any(|c| !c.is_alphanumeric()) {
		return Err(CoreError::Input("password must contain a symbol".to_string()));
	}

	let unique_chars: HashSet<char> = password.chars().collect();
	if unique_chars.len() < realm.min_unique_chars as usize {
		return Err(CoreError::Input(format!(
			"password must contain at least {} unique characters",
			realm.min_unique_chars
		)));
	}

	if max_consecutive_run(password) > realm.max_consecutive_repeated_chars as usize {
		return Err(CoreError::Input(format!(
			"password must not repeat a character more than {} times in a row",
			realm.max_consecutive_repeated_chars
		)));
	}

	Ok(())
}

/// Longest run of the same character repeated consecutively, e.g. `"aaab"`
/// is 3.
fn max_consecutive_run(s: &str) -> usize {
	let mut longest = 0;
	let mut current = 0;
	let mut prev: Option<char> = None;
	for c in s.chars() {
		if Some(c) == prev {
			current += 1;
		} else {
			current = 1;
			prev = Some(c);
		}
		longest = longest.max(current);
	}
	longest
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_realm() -> Realm {
		Realm {
			id: Uuid::now_v7(),
			tenant_id: Uuid::now_v7(),
			active: true,
			min_password_length: 8,
			max_session_duration_secs: 3600,
			absolute_session_duration_secs: 86400,
			require_uppercase: true,
			require_lowercase: true,
			require_digit: true,
			require_symbol: false,
			min_unique_chars: 5,
			max_consecutive_repeated_chars: 2,
			min_username_length: 3,
			max_username_length: 32,
			mfa_required: false,
			rate_limit_rps_override: None,
			rate_limit_burst_override: None,
		}
	}

	#[test]
	fn max_consecutive_run_counts_longest_streak() {
		assert_eq!(max_consecutive_run("aaab"), 3);
		assert_eq!(max_consecutive_run("abab"), 1);
		assert_eq!(max_consecutive_run(""), 0);
	}

	#[test]
	fn password_policy_rejects_short_password() {
		let err = validate_password_policy(&test_realm(), "Ab1").unwrap_err();
		assert!(matches!(err, CoreError::Input(_)));
	}

	#[test]
	fn password_policy_rejects_missing_character_class() {
		let err = validate_password_policy(&test_realm(), "lowercase1only").unwrap_err();
		assert!(matches!(err, CoreError::Input(_)));
	}

	#[test]
	fn password_policy_rejects_too_few_unique_chars() {
		let err = validate_password_policy(&test_realm(), "Aa1Aa1Aa").unwrap_err();
		assert!(matches!(err, CoreError::Input(_)));
	}

	#[test]
	fn password_policy_rejects_long_repeat_run() {
		let err = validate_password_policy(&test_realm(), "Aaa111bbC").unwrap_err();
		assert!(matches!(err, CoreError::Input(_)));
	}

	#[test]
	fn password_policy_accepts_compliant_password() {
		validate_password_policy(&test_realm(), "Sunrise7Over").unwrap();
	}

	#[test]
	fn username_bounds_reject_too_short_and_too_long() {
		let realm = test_realm();
		assert!(SessionService::validate_username_for_realm(&realm, "ab").is_err());
		let too_long: String = std::iter::repeat('a').take(64).collect();
		assert!(SessionService::validate_username_for_realm(&realm, &too_long).is_err());
		assert!(SessionService::validate_username_for_realm(&realm, "alice").is_ok());
	}

	#[test]
	fn principal_user_id_is_none_for_non_uuid_client_id() {
		let principal = Principal {
			tenant_id: Uuid::now_v7(),
			realm_id: Uuid::now_v7(),
			client_id: "svc-billing-worker".to_string(),
			user_id: "svc-billing-worker".parse::<Uuid>().ok(),
		};
		assert!(principal.user_id.is_none());
	}
}
