use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Notify, RwLock, watch};

use crate::errors::{CoreError, CoreResult};

/// Finite states of a [`super::Listener`]: `New -> Listening -> Ready ->
/// Draining -> Closed`. Transitions backwards (e.g. `Ready -> Listening`)
/// never happen; only `SetReady(false)` flips `Ready` back to `Listening`
/// without leaving the listening phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	New,
	Listening,
	Ready,
	Draining,
	Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct ListenerState {
	pub phase: Phase,
	pub actual_port: Option<u16>,
}

impl ListenerState {
	pub fn new() -> Self {
		Self {
			phase: Phase::New,
			actual_port: None,
		}
	}
}

impl Default for ListenerState {
	fn default() -> Self {
		Self::new()
	}
}

/// Whether a second call to `shutdown()` succeeds or is rejected. The admin
/// listener is idempotent (it can be triggered from multiple orchestration
/// paths); the public listener is not (its lifecycle is always driven by a
/// single owner) — a deliberate asymmetry, not an oversight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
	Idempotent,
	OnceOnly,
}

/// The part of a [`super::Listener`] that needs to be shared with the
/// router it serves — admin handlers read `ready`/`draining` state and
/// trigger shutdown through this handle before the `Listener` itself
/// (which owns the router) finishes construction.
#[derive(Clone)]
pub struct ListenerHandle {
	pub(super) state: Arc<RwLock<ListenerState>>,
	pub(super) shutdown_tx: watch::Sender<bool>,
	pub(super) shutdown_rx: watch::Receiver<bool>,
	pub(super) in_flight: Arc<AtomicUsize>,
	pub(super) drained: Arc<Notify>,
	pub(super) shutdown_called: Arc<AtomicBool>,
	pub(super) shutdown_kind: ShutdownKind,
}

impl ListenerHandle {
	pub fn new(shutdown_kind: ShutdownKind) -> Self {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		Self {
			state: Arc::new(RwLock::new(ListenerState::new())),
			shutdown_tx,
			shutdown_rx,
			in_flight: Arc::new(AtomicUsize::new(0)),
			drained: Arc::new(Notify::new()),
			shutdown_called: Arc::new(AtomicBool::new(false)),
			shutdown_kind,
		}
	}

	pub async fn phase(&self) -> Phase {
		self.state.read().await.phase
	}

	pub async fn is_ready(&self) -> bool {
		self.state.read().await.phase == Phase::Ready
	}

	pub async fn is_draining(&self) -> bool {
		matches!(self.state.read().await.phase, Phase::Draining | Phase::Closed)
	}

	pub async fn actual_port(&self) -> Option<u16> {
		self.state.read().await.actual_port
	}

	pub async fn set_ready(&self, ready: bool) {
		let mut state = self.state.write().await;
		if ready {
			if state.phase == Phase::Listening {
				state.phase = Phase::Ready;
			}
		} else if state.phase == Phase::Ready {
			state.phase = Phase::Listening;
		}
	}

	/// Flip the draining flag synchronously; the caller (the admin
	/// `/shutdown` handler) must do this *before* writing its HTTP
	/// response, then schedule the actual socket teardown afterwards —
	/// otherwise `livez`/`readyz` can race the router close.
	pub async fn begin_draining(&self) -> CoreResult<()> {
		let already_called = self.shutdown_called.swap(true, Ordering::SeqCst);
		if already_called && self.shutdown_kind == ShutdownKind::OnceOnly {
			return Err(CoreError::Lifecycle("listener already shut down".to_string()));
		}

		let mut state = self.state.write().await;
		if state.phase != Phase::Closed {
			state.phase = Phase::Draining;
		}
		Ok(())
	}

	/// Stop the accept loop and wait (up to `deadline`) for in-flight
	/// connections to finish, then transition to `Closed`. Called either
	/// directly by [`super::Listener::shutdown`] or, for the admin
	/// listener, from a task scheduled ~100ms after the `/shutdown`
	/// response was flushed.
	pub async fn finish_draining(&self, deadline: std::time::Duration) {
		let _ = self.shutdown_tx.send(true);

		if self.in_flight.load(Ordering::SeqCst) > 0 {
			let wait = self.drained.notified();
			if tokio::time::timeout(deadline, wait).await.is_err() {
				tracing::warn!(
					remaining = self.in_flight.load(Ordering::SeqCst),
					"shutdown deadline exceeded with connections still in flight"
				);
			}
		}

		let mut state = self.state.write().await;
		state.phase = Phase::Closed;
	}
}
