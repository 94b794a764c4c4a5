//! Requests from peers outside the trusted-proxy list, driven in-process.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use query_gateway::pipeline::UpstreamAnswerService;
use query_gateway::security::RateKey;
use query_gateway::HttpServer;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

const PROXY: [u8; 4] = [127, 0, 0, 1];
const STRANGER: [u8; 4] = [203, 0, 113, 66];

async fn server(burst_limit: u32) -> (HttpServer, Arc<std::sync::atomic::AtomicUsize>) {
    let (backend, calls) = common::start_answer_backend().await;
    let mut config = common::config_for(backend);
    config.rate_limit.burst_limit = burst_limit;
    let answers = Arc::new(UpstreamAnswerService::new(&config.answer).unwrap());
    (HttpServer::new(config, answers), calls)
}

fn query_from(peer: [u8; 4], headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/query")
        .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(json!({ "query": "quarterly numbers" }).to_string()))
        .unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_rotating_user_ids_do_not_reset_the_limit() {
    let (server, _) = server(2).await;
    let router = server.router();

    let mut statuses = Vec::new();
    for n in 0..6 {
        let user = format!("made-up-{n}");
        let req = query_from(STRANGER, &[("x-tenant-id", "acme"), ("x-user-id", user.as_str())]);
        statuses.push(send(&router, req).await.0);
    }

    // Both assertions are dropped, so the tenant is missing; the limiter
    // still counts the stranger by address.
    assert_eq!(
        statuses,
        vec![
            StatusCode::BAD_REQUEST,
            StatusCode::BAD_REQUEST,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );

    let limiter = server.state().pipeline.limiter();
    assert_eq!(limiter.tracked_keys(), 1);
    assert_eq!(limiter.event_count(&RateKey::ip("203.0.113.66")), 2);
}

#[tokio::test]
async fn test_stranger_cannot_read_another_tenant() {
    let (server, calls) = server(10).await;
    let router = server.router();

    // Warm globex's cache through the trusted proxy.
    let (status, body) = send(&router, query_from(PROXY, &[("x-tenant-id", "globex")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);

    let (status, body) = send(&router, query_from(STRANGER, &[("x-tenant-id", "globex")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing X-Tenant-Id header");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stranger_forwarded_for_is_ignored() {
    let (server, _) = server(1).await;
    let router = server.router();

    let spoof = |ip: &'static str| {
        query_from(STRANGER, &[("x-tenant-id", "acme"), ("x-forwarded-for", ip)])
    };
    send(&router, spoof("1.1.1.1")).await;
    let (status, _) = send(&router, spoof("2.2.2.2")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
