//! Liveness and readiness probes.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct LivenessReport {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Process is up. Never touches the store.
pub async fn health() -> Json<LivenessReport> {
    Json(LivenessReport {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Outcome of probing one dependency.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DependencyCheck {
    Ok { latency_ms: u64 },
    Error { error: String },
}

#[derive(Serialize)]
pub struct ReadinessReport {
    pub status: &'static str,
    pub checks: BTreeMap<&'static str, DependencyCheck>,
}

/// Ready when the record store answers a ping; 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let store = match state.store.ping().await {
        Ok(()) => DependencyCheck::Ok {
            latency_ms: started.elapsed().as_millis() as u64,
        },
        Err(e) => DependencyCheck::Error { error: e.to_string() },
    };

    let healthy = matches!(store, DependencyCheck::Ok { .. });
    let report = ReadinessReport {
        status: if healthy { "ready" } else { "degraded" },
        checks: BTreeMap::from([("store", store)]),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}
