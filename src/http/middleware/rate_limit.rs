//! Rate limiting middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::middleware::identity::request_meta;
use crate::http::server::AppState;
use crate::pipeline::Identity;
use crate::security::rate_limit::{Decision, Rejection, Window};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Body of a 429 response.
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub detail: &'static str,
    pub window: Window,
    pub retry_after: u64,
}

fn detail(window: Window) -> &'static str {
    match window {
        Window::Burst => "Too many requests. Please slow down.",
        Window::Minute => "Rate limit exceeded. Try again in a minute.",
        Window::Hour => "Hourly rate limit exceeded.",
    }
}

fn rejection_response(rejection: Rejection) -> Response {
    let retry_after = rejection.retry_after_secs();
    let body = RejectionBody {
        detail: detail(rejection.window),
        window: rejection.window,
        retry_after,
    };
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(body),
    )
        .into_response()
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let rate_limit = &state.config.rate_limit;
    if !rate_limit.enabled || rate_limit.exempt_paths.iter().any(|p| p == request.uri().path()) {
        return next.run(request).await;
    }

    let identity = match request.extensions().get::<Identity>() {
        Some(identity) => identity.clone(),
        None => state.pipeline.resolve_identity(&request_meta(&request)),
    };

    let quota = match state.pipeline.admit(&identity) {
        Decision::Allowed(quota) => quota,
        Decision::Rejected(rejection) => return rejection_response(rejection),
    };

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    response
}
