use std::sync::Arc;

use crate::barrier::SharedBarrier;
use crate::db::messages::MessageRepository;
use crate::db::users::UserRepository;
use crate::observability::MetricsRegistry;
use crate::session::SessionService;

/// Application state shared across handlers via Axum's `State` extractor.
/// Cheap to clone: every field is internally `Arc`-backed or itself a thin
/// handle over a connection pool.
#[derive(Clone)]
pub struct AppState {
	pub sessions: SessionService,
	pub users: UserRepository,
	pub messages: MessageRepository,
	pub barrier: SharedBarrier,
	pub metrics: Arc<MetricsRegistry>,
}
