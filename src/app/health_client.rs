//! Thin `reqwest` client over the admin listener's health/shutdown surface,
//! used by deployment tooling (and integration tests) to drive the
//! lifecycle from outside the process. Per-call timeouts are ordered
//! liveness < readiness < shutdown, since a hung shutdown is far more
//! costly to mistake for "still running" than a hung liveness probe.
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);
const READINESS_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct StatusBody {
	status: String,
}

pub struct HealthClient {
	base_url: String,
	client: reqwest::Client,
}

impl HealthClient {
	/// `base_url` is expected to be the admin listener's origin, e.g.
	/// `https://127.0.0.1:8444`. TLS material is often self-signed (`Auto`
	/// mode), so certificate verification is disabled for this client —
	/// it never leaves the operator's own trust boundary.
	pub fn new(base_url: impl Into<String>) -> Result<Self> {
		let client = reqwest::Client::builder()
			.danger_accept_invalid_certs(true)
			.build()
			.context("failed to build health check client")?;
		Ok(Self {
			base_url: base_url.into(),
			client,
		})
	}

	pub async fn send_liveness_check(&self) -> Result<bool> {
		self.probe("/admin/api/v1/livez", LIVENESS_TIMEOUT, "alive").await
	}

	pub async fn send_readiness_check(&self) -> Result<bool> {
		self.probe("/admin/api/v1/readyz", READINESS_TIMEOUT, "ready").await
	}

	async fn probe(&self, path: &str, timeout: Duration, healthy_status: &str) -> Result<bool> {
		let resp = self
			.client
			.get(format!("{}{}", self.base_url, path))
			.timeout(timeout)
			.send()
			.await
			.with_context(|| format!("request to {} failed", path))?;

		let status_code = resp.status();
		let body: StatusBody = resp
			.json()
			.await
			.with_context(|| format!("{} returned a non-JSON body", path))?;

		if status_code.is_success() {
			Ok(body.status == healthy_status)
		} else {
			Ok(false)
		}
	}

	/// POST `/admin/api/v1/shutdown`. A non-2xx response is treated as a
	/// hard failure — unlike the probes, there is no ambiguous "not ready
	/// yet" reading for a rejected shutdown request.
	pub async fn send_shutdown_request(&self) -> Result<()> {
		let resp = self
			.client
			.post(format!("{}/admin/api/v1/shutdown", self.base_url))
			.timeout(SHUTDOWN_TIMEOUT)
			.send()
			.await
			.context("shutdown request failed")?;

		if !resp.status().is_success() {
			bail!("shutdown request returned status {}", resp.status());
		}
		Ok(())
	}
}
