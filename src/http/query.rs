//! Tenant query endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::pipeline::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBody {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub text: String,
    pub sources: Vec<String>,
    pub cached: bool,
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(serde_json::json!({ "detail": detail }))).into_response()
}

pub async fn query_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<QueryBody>,
) -> Response {
    // Unset unless a trusted proxy asserted it.
    let Some(tenant_id) = identity.tenant_id.as_deref() else {
        return error_response(StatusCode::BAD_REQUEST, "Missing X-Tenant-Id header");
    };

    match state.pipeline.serve(tenant_id, &body.query).await {
        Ok(served) => Json(QueryResponse {
            text: served.answer.text,
            sources: served.answer.sources,
            cached: served.cached,
        })
        .into_response(),
        Err(_) => error_response(StatusCode::BAD_GATEWAY, "Answer service unavailable"),
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
