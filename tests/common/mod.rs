//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use query_gateway::config::GatewayConfig;
use query_gateway::pipeline::UpstreamAnswerService;
use query_gateway::{HttpServer, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Start a mock answer service that echoes the tenant and query.
///
/// Queries equal to `"explode"` get a 500. The returned counter tracks calls.
pub async fn start_answer_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));

    async fn answer(
        State(calls): State<Arc<AtomicUsize>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let tenant = body["tenant_id"].as_str().unwrap_or_default().to_string();
        let query = body["query"].as_str().unwrap_or_default().to_string();
        if query == "explode" {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "boom" })));
        }
        (
            StatusCode::OK,
            Json(json!({
                "text": format!("answer #{n} for {tenant}: {query}"),
                "sources": [format!("{tenant}/handbook.pdf")],
            })),
        )
    }

    let app = Router::new()
        .route("/query", post(answer))
        .with_state(calls.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, calls)
}

/// Config pointing at `backend`, with metrics off.
pub fn config_for(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.answer.upstream_url = format!("http://{backend}/query");
    config.answer.timeout_secs = 5;
    config.observability.metrics_enabled = false;
    config
}

/// Run a live gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let answers = Arc::new(UpstreamAnswerService::new(&config.answer).unwrap());
    let server = HttpServer::new(config, answers);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
