use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::http::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
}

#[derive(Serialize, Deserialize)]
pub struct LimiterStatus {
    pub tracked_keys: usize,
    pub max_tracked_keys: usize,
    pub burst_limit: u32,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
}

#[derive(Serialize, Deserialize)]
pub struct InvalidationResult {
    pub tenant_id: String,
    pub removed: usize,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache().stats())
}

pub async fn get_limiter(State(state): State<AppState>) -> Json<LimiterStatus> {
    let config = &state.config.rate_limit;
    Json(LimiterStatus {
        tracked_keys: state.pipeline.limiter().tracked_keys(),
        max_tracked_keys: config.max_tracked_keys,
        burst_limit: config.burst_limit,
        requests_per_minute: config.requests_per_minute,
        requests_per_hour: config.requests_per_hour,
    })
}

/// Called by document ingestion after a tenant's corpus changes.
pub async fn invalidate_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Json<InvalidationResult> {
    let removed = state.pipeline.invalidate_tenant(&tenant_id);
    Json(InvalidationResult { tenant_id, removed })
}
