//! Emulator server
//!
//! Exposes any [`WriteService`] over the JSON API consumed by
//! [`crate::service::HttpService`]. Usually backed by a
//! [`crate::service::MemoryService`] so samples can run against a local
//! endpoint.

pub mod handlers;
pub mod metrics;
pub mod routes;

use axum::{extract::Extension, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::service::WriteService;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: String,
    /// HTTP port
    pub http_port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1".to_string(),
            http_port: 8086,
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_addr, self.http_port)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn WriteService>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(service: Arc<dyn WriteService>, config: ServerConfig) -> Self {
        Self { service, config }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}

/// Builds the full router for `state`.
pub fn router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let app = Router::new()
        .merge(routes::service_routes())
        .merge(routes::health_routes())
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serves on an already bound listener until the process is interrupted.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    metrics::init_metrics();
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

/// Binds `config.bind_addr()` and serves `service`.
pub async fn start_server(config: ServerConfig, service: Arc<dyn WriteService>) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!("🚀 Write service emulator listening on http://{}", addr);
    info!("📊 Metrics: http://{}/_metrics", addr);
    info!("💚 Health: http://{}/health", addr);

    serve(listener, AppState::new(service, config)).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MemoryService;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(AppState::new(
            Arc::new(MemoryService::default()),
            ServerConfig::default(),
        ))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let app = test_router();
        let body = json!({"databaseName": "sample_db"});

        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/databases", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["databaseName"], "sample_db");

        let response = app
            .oneshot(json_request("POST", "/v1/databases", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "Conflict");
    }

    #[tokio::test]
    async fn test_missing_database_is_404() {
        let response = test_router()
            .oneshot(
                Request::get("/v1/databases/missing_db")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "ResourceNotFound");
    }

    #[tokio::test]
    async fn test_rejected_records_body() {
        let app = test_router();
        app.clone()
            .oneshot(json_request("POST", "/v1/databases", json!({"databaseName": "sample_db"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request(
                "POST",
                "/v1/databases/sample_db/tables",
                json!({"tableName": "sample_table"}),
            ))
            .await
            .unwrap();

        let record = |value: &str, version: i64| {
            json!({
                "dimensions": [{"name": "hostname", "value": "host1"}],
                "measureName": "cpu_utilization",
                "measureValue": value,
                "measureValueType": "DOUBLE",
                "time": "1000",
                "version": version
            })
        };

        let uri = "/v1/databases/sample_db/tables/sample_table/records";
        let response = app
            .clone()
            .oneshot(json_request("POST", uri, json!({"records": [record("13.5", 5)]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["recordsIngested"]["total"], 1);

        let response = app
            .oneshot(json_request("POST", uri, json!({"records": [record("20.0", 4)]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "RejectedRecords");
        assert_eq!(body["rejectedRecords"][0]["recordIndex"], 0);
        assert_eq!(body["rejectedRecords"][0]["existingVersion"], 5);
    }

    #[tokio::test]
    async fn test_malformed_requests_return_error_body() {
        let app = test_router();
        app.clone()
            .oneshot(json_request("POST", "/v1/databases", json!({"databaseName": "sample_db"})))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request(
                "POST",
                "/v1/databases/sample_db/tables",
                json!({"tableName": "sample_table"}),
            ))
            .await
            .unwrap();

        let body = json!({"records": [{
            "measureName": "cpu",
            "measureValue": "1",
            "measureValueType": "FLOAT",
            "time": "1"
        }]});
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/databases/sample_db/tables/sample_table/records",
                body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "Validation");
        assert!(body["message"].as_str().unwrap().contains("measureValueType"));

        let response = app
            .oneshot(
                Request::get("/v1/databases?maxResults=lots")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "Validation");
    }

    #[tokio::test]
    async fn test_delete_returns_no_content() {
        let app = test_router();
        app.clone()
            .oneshot(json_request("POST", "/v1/databases", json!({"databaseName": "sample_db"})))
            .await
            .unwrap();
        let response = app
            .oneshot(
                Request::delete("/v1/databases/sample_db")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
