//! Audit trail for sensitive endpoints.
//!
//! Emits one structured event on the `audit` target per audited request,
//! after the response is known. Shipping the events somewhere durable is the
//! log pipeline's job.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::http::middleware::identity::{header_str, request_meta};
use crate::http::server::AppState;
use crate::pipeline::Identity;

pub async fn audit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let audit = &state.config.audit;
    let path = request.uri().path().to_string();
    if !audit.enabled || !audit.audited_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let identity = match request.extensions().get::<Identity>() {
        Some(identity) => identity.clone(),
        None => state.pipeline.resolve_identity(&request_meta(&request)),
    };
    let tenant = identity.tenant_id.clone().unwrap_or_else(|| "-".to_string());
    let user_agent = header_str(request.headers(), header::USER_AGENT.as_str())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(request).await;

    tracing::info!(
        target: "audit",
        audit_id = %Uuid::new_v4(),
        user = identity.user_id.as_deref().unwrap_or("anonymous"),
        tenant = %tenant,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        ip = %identity.client_ip,
        user_agent = %user_agent,
        "AUDIT"
    );

    response
}
