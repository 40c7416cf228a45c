//! `/health` endpoint.

use std::time::Instant;

use liftoff_core::Phase;
use serde::Serialize;

use crate::coordinator::CoordinatorStatus;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered peers.
    pub connections: usize,
    /// Session phase.
    pub phase: Phase,
    /// Distinct participants since the last reset.
    pub click_count: usize,
    /// Configured threshold.
    pub threshold: u32,
}

/// Build a health response from the coordinator's status.
pub fn health_check(start_time: Instant, status: &CoordinatorStatus) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: status.connections,
        phase: status.phase,
        click_count: status.snapshot.click_count,
        threshold: status.threshold.get(),
    }
}
