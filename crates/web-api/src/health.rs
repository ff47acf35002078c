//! Store health endpoint.
//!
//! `GET /api/health` reports the row count of every table and the number of
//! connected observers. A failing count query marks the store unhealthy.

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Row count of one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableHealth {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy".
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub tables: Vec<TableHealth>,
    /// Live websocket observers.
    pub observers: usize,
}

impl HealthResponse {
    fn new(tables: Option<Vec<TableHealth>>, observers: usize) -> (StatusCode, Self) {
        let (code, status, tables) = match tables {
            Some(tables) => (StatusCode::OK, "healthy", tables),
            None => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Vec::new()),
        };
        (
            code,
            Self {
                status,
                timestamp: Utc::now(),
                tables,
                observers,
            },
        )
    }
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let tables = match state.db.table_counts().await {
        Ok(counts) => Some(
            counts
                .into_iter()
                .map(|(table, rows)| TableHealth { table, rows })
                .collect(),
        ),
        Err(e) => {
            tracing::error!("Failed to count table rows: {}", e);
            None
        }
    };

    let (code, response) = HealthResponse::new(tables, state.notifier.observer_count());
    (code, Json(response))
}
