use axum::{extract::State, Json};
use std::sync::Arc;

use crate::metrics::CounterSnapshot;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────

/// Current counters as JSON, handy for curl / debugging.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}
