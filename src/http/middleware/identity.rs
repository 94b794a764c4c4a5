//! Client identity middleware.
//! Resolves who the request belongs to before anything else looks at it.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::pipeline::RequestMeta;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
/// Authenticated user id, set by the auth layer in front of the gateway.
/// Honored only from trusted peers, like `X-Tenant-Id`.
pub const X_USER_ID: &str = "x-user-id";
pub const X_TENANT_ID: &str = "x-tenant-id";

/// Read a header as trimmed text, ignoring non-UTF-8 values.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The full `X-Forwarded-For` list.
///
/// Repeated header lines form one comma-separated list, in arrival order, so
/// a hop appended as a separate line is still seen by the trust walk.
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let joined = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

/// Build the identity inputs from connection info and headers.
pub fn request_meta(req: &Request<Body>) -> RequestMeta {
    let headers = req.headers();
    RequestMeta {
        peer: req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
        forwarded_for: forwarded_for(headers),
        user_id: header_str(headers, X_USER_ID).map(str::to_string),
        tenant_id: header_str(headers, X_TENANT_ID).map(str::to_string),
    }
}

/// Attach an [`Identity`](crate::pipeline::Identity) extension to the request.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let identity = state.pipeline.resolve_identity(&request_meta(&req));
    tracing::trace!(client_ip = %identity.client_ip, rate_key = %identity.rate_key, "Identity resolved");
    req.extensions_mut().insert(identity);
    next.run(req).await
}
