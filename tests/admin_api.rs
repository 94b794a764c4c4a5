//! Admin API tests, driven in-process through the routers.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use query_gateway::pipeline::UpstreamAnswerService;
use query_gateway::HttpServer;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

const KEY: &str = "test-admin-key";

async fn server() -> (HttpServer, Arc<std::sync::atomic::AtomicUsize>) {
    let (backend, calls) = common::start_answer_backend().await;
    let mut config = common::config_for(backend);
    config.admin.enabled = true;
    config.admin.api_key = KEY.to_string();
    let answers = Arc::new(UpstreamAnswerService::new(&config.answer).unwrap());
    (HttpServer::new(config, answers), calls)
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn admin(method: &str, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
        .body(Body::empty())
        .unwrap()
}

/// A query arriving through the local auth proxy.
fn query(tenant: &str, q: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50000))))
        .uri("/api/query")
        .header("x-tenant-id", tenant)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "query": q }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_requires_bearer_key() {
    let (server, _) = server().await;
    let admin_router = server.admin_router();

    let anonymous = Request::builder()
        .uri("/admin/status")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&admin_router, anonymous).await.0, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/status")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&admin_router, wrong).await.0, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&admin_router, admin("GET", "/admin/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn test_invalidate_tenant_forces_recompute() {
    let (server, calls) = server().await;
    let public = server.router();
    let admin_router = server.admin_router();

    assert_eq!(send(&public, query("acme", "refunds?")).await.0, StatusCode::OK);
    assert_eq!(send(&public, query("globex", "refunds?")).await.0, StatusCode::OK);

    let (_, cache) = send(&admin_router, admin("GET", "/admin/cache")).await;
    assert_eq!(cache["entries"], 2);
    assert_eq!(cache["capacity"], 500);
    assert_eq!(cache["ttl_seconds"], 300);

    let (status, result) = send(
        &admin_router,
        admin("POST", "/admin/tenants/acme/invalidate"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["tenant_id"], "acme");
    assert_eq!(result["removed"], 1);

    let (_, acme) = send(&public, query("acme", "refunds?")).await;
    let (_, globex) = send(&public, query("globex", "refunds?")).await;
    assert_eq!(acme["cached"], false);
    assert_eq!(globex["cached"], true);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_limiter_status() {
    let (server, _) = server().await;
    let public = server.router();
    let admin_router = server.admin_router();

    send(&public, query("acme", "q")).await;

    let (status, body) = send(&admin_router, admin("GET", "/admin/limiter")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked_keys"], 1);
    assert_eq!(body["requests_per_minute"], 30);
    assert_eq!(body["burst_limit"], 10);
    assert_eq!(
        server.state().pipeline.limiter().event_count(
            &query_gateway::security::RateKey::ip("127.0.0.1")
        ),
        1
    );
}
