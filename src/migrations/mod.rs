//! Migration Runner (C9).
//!
//! Applies ordered SQL schema migrations from a layered embedded
//! filesystem: template migrations numbered `[1001, 1999]`, service
//! migrations numbered `[2001, ∞)`. The two embeds are merged into one
//! ascending sequence; a numeric-prefix collision (the same id claimed by
//! both layers) is a startup-failing programming error, not a runtime one.
//! Applied ids are tracked in `_schema_migrations` so reruns are idempotent.

use std::collections::BTreeMap;

use include_dir::{Dir, include_dir};
use sqlx::PgPool;

use crate::errors::{CoreError, CoreResult};

static TEMPLATE_MIGRATIONS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/migrations/template");
static SERVICE_MIGRATIONS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/migrations/service");

const TEMPLATE_RANGE_START: u64 = 1001;
const TEMPLATE_RANGE_END: u64 = 1999;
const SERVICE_RANGE_START: u64 = 2001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
	Template,
	Service,
}

struct MigrationFile {
	id: u64,
	description: String,
	sql: String,
	layer: Layer,
}

fn parse_filename(name: &str) -> Option<(u64, String)> {
	let (prefix, rest) = name.split_once('_')?;
	let id: u64 = prefix.parse().ok()?;
	let description = rest.trim_end_matches(".sql").replace('_', " ");
	Some((id, description))
}

fn collect(dir: &'static Dir<'static>, layer: Layer) -> CoreResult<Vec<MigrationFile>> {
	let mut out = Vec::new();
	for file in dir.files() {
		let Some(name) = file.path().file_name().and_then(|n| n.to_str()) else {
			continue;
		};
		if !name.ends_with(".sql") {
			continue;
		}
		let (id, description) = parse_filename(name)
			.ok_or_else(|| CoreError::Lifecycle(format!("migration file {} has no numeric prefix", name)))?;

		match layer {
			Layer::Template if !(TEMPLATE_RANGE_START..=TEMPLATE_RANGE_END).contains(&id) => {
				return Err(CoreError::Lifecycle(format!(
					"template migration {} outside reserved range [{}, {}]",
					id, TEMPLATE_RANGE_START, TEMPLATE_RANGE_END
				)));
			}
			Layer::Service if id < SERVICE_RANGE_START => {
				return Err(CoreError::Lifecycle(format!(
					"service migration {} below reserved range start {}",
					id, SERVICE_RANGE_START
				)));
			}
			_ => {}
		}

		let sql = file
			.contents_utf8()
			.ok_or_else(|| CoreError::Lifecycle(format!("migration file {} is not valid UTF-8", name)))?
			.to_string();

		out.push(MigrationFile {
			id,
			description,
			sql,
			layer,
		});
	}
	Ok(out)
}

/// Merge the two embedded filesystems into one ascending sequence. A
/// numeric id claimed by both layers is rejected outright rather than
/// silently preferring one side.
fn merge() -> CoreResult<Vec<MigrationFile>> {
	let template = collect(&TEMPLATE_MIGRATIONS, Layer::Template)?;
	let service = collect(&SERVICE_MIGRATIONS, Layer::Service)?;

	let mut by_id: BTreeMap<u64, MigrationFile> = BTreeMap::new();
	for m in template.into_iter().chain(service.into_iter()) {
		if let Some(existing) = by_id.get(&m.id) {
			return Err(CoreError::Lifecycle(format!(
				"migration id {} claimed by both {:?} and {:?}",
				m.id, existing.layer, m.layer
			)));
		}
		by_id.insert(m.id, m);
	}

	Ok(by_id.into_values().collect())
}

async fn ensure_tracking_table(pool: &PgPool) -> CoreResult<()> {
	sqlx::raw_sql(
		"CREATE TABLE IF NOT EXISTS _schema_migrations ( \
		     version BIGINT PRIMARY KEY, \
		     description TEXT NOT NULL, \
		     applied_at TIMESTAMPTZ NOT NULL \
		 )",
	)
	.execute(pool)
	.await
	.map_err(|e| CoreError::Storage(e.to_string()))?;
	Ok(())
}

async fn is_applied(pool: &PgPool, version: u64) -> CoreResult<bool> {
	let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM _schema_migrations WHERE version = $1")
		.bind(version as i64)
		.fetch_optional(pool)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))?;
	Ok(row.is_some())
}

/// Apply all unapplied migrations in ascending order, one transaction per
/// migration.
pub async fn run(pool: &PgPool) -> CoreResult<usize> {
	ensure_tracking_table(pool).await?;
	let migrations = merge()?;

	let mut applied_count = 0;
	for migration in migrations {
		if is_applied(pool, migration.id).await? {
			continue;
		}

		let mut tx = pool.begin().await.map_err(|e| CoreError::Storage(e.to_string()))?;

		sqlx::raw_sql(&migration.sql)
			.execute(&mut *tx)
			.await
			.map_err(|e| {
				CoreError::Storage(format!("migration {} failed: {}", migration.id, e))
			})?;

		sqlx::query(
			"INSERT INTO _schema_migrations (version, description, applied_at) VALUES ($1, $2, now())",
		)
		.bind(migration.id as i64)
		.bind(&migration.description)
		.execute(&mut *tx)
		.await
		.map_err(|e| CoreError::Storage(e.to_string()))?;

		tx.commit().await.map_err(|e| CoreError::Storage(e.to_string()))?;

		tracing::info!(version = migration.id, description = %migration.description, "applied migration");
		applied_count += 1;
	}

	Ok(applied_count)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn merge_produces_ascending_disjoint_sequence() {
		let merged = merge().expect("no collisions in the shipped migration set");
		let ids: Vec<u64> = merged.iter().map(|m| m.id).collect();
		let mut sorted = ids.clone();
		sorted.sort_unstable();
		assert_eq!(ids, sorted, "merge() must already be ascending");
		assert!(ids.contains(&1001));
		assert!(ids.contains(&2001));
	}

	#[test]
	fn filename_parsing_rejects_missing_prefix() {
		assert!(parse_filename("no_numeric_prefix_here.sql").is_none());
		assert_eq!(
			parse_filename("1001_create_messages.sql"),
			Some((1001, "create messages".to_string()))
		);
	}
}
