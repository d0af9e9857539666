//! Fetcher endpoint handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::mailbox::{PollStats, StatsSnapshot};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<PollStats>,
}

impl AppState {
    pub fn new(stats: Arc<PollStats>) -> Self {
        Self { stats }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Poll Stats
// =============================================================================

/// Poll counters since process start.
pub async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_ok() {
        let Json(response) = health().await;
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_stats_reports_snapshot() {
        let poll_stats = Arc::new(PollStats::new());
        poll_stats.record_cycle();
        poll_stats.record_publish_failure();

        let Json(snapshot) = stats(State(AppState::new(poll_stats))).await;

        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.delivered, 0);
    }
}
