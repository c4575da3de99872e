//! HTTP server for PDF upload and table browsing

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, ServerConfig};
use crate::error::{Error, Result};
use state::AppState;

/// pdf-tables HTTP server
pub struct PdfTablesServer {
    config: AppConfig,
    state: AppState,
}

impl PdfTablesServer {
    /// Create a server, opening the configured database
    pub fn new(config: AppConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state.clone(), &self.config.server);

        tracing::info!("Starting pdf-tables server on http://{}", addr);
        tracing::info!("API info: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes::api_routes(server.max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = AppConfig::default();
        let state = AppState::with_store(config.clone(), Arc::new(SqliteStore::in_memory().unwrap()));
        build_router(state, &config.server)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart(field: &str, filename: &str, content: &str) -> Request<Body> {
        let boundary = "X-PDF-TABLES-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
            b = boundary,
            field = field,
            filename = filename,
            content = content,
        );

        Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("OK"));
    }

    #[tokio::test]
    async fn test_ingest_then_browse() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_json(
                "/api/ingest",
                json!({
                    "filename": "q1.pdf",
                    "tables": {
                        "table_1": [
                            {"Region": "North", "Revenue": "1,200"},
                            {"Region": "South", "Revenue": 800}
                        ],
                        "table_2": [{"A": "n/a"}]
                    },
                    "text_fields": {"quarter": "Q1"},
                    "full_text": "Quarterly revenue report"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let pdf_id = body["pdf_id"].as_i64().unwrap();
        let table = format!("pdf_table_1_{}", pdf_id);
        assert_eq!(body["created_tables"], json!([table.clone()]));
        assert_eq!(body["manifest"]["discarded_tables"], json!(["table_2"]));
        assert_eq!(body["manifest"]["rows_inserted"][&table], json!(2));

        let (_, tables) = send(&app, get("/api/tables")).await;
        assert_eq!(tables["tables"], json!([table.clone()]));

        let (status, rows) = send(&app, get(&format!("/api/table/{}", table))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows[0]["region"], json!("North"));
        assert_eq!(rows[0]["revenue"], json!(1200));

        let (_, stats) = send(&app, get(&format!("/api/analytics/{}", table))).await;
        assert_eq!(stats["revenue"]["avg"], json!(1000.0));
        assert_eq!(stats["revenue"]["count"], json!(2));

        let (status, record) = send(&app, get(&format!("/api/raw/row/{}", pdf_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["filename"], json!("q1.pdf"));

        let (_, all) = send(&app, get("/api/raw/data")).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        let (status, text) = send(&app, get(&format!("/api/text/{}", pdf_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text["full_text"], json!("Quarterly revenue report"));
        assert_eq!(text["text_fields"]["quarter"], json!("Q1"));

        let (_, found) = send(&app, get("/api/text/search/REVENUE")).await;
        assert_eq!(found["pdf_ids"], json!([pdf_id]));
    }

    #[tokio::test]
    async fn test_not_found_responses() {
        let app = test_app();

        let (status, body) = send(&app, get("/api/table/pdf_data")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], json!("not_found"));

        let (status, _) = send(&app, get("/api/analytics/pdf_missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/api/raw/row/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/api/text/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_requests() {
        let app = test_app();

        let (status, body) = send(&app, multipart("file", "notes.txt", "hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], json!("unsupported_type"));

        let (status, body) = send(&app, multipart("other", "report.pdf", "%PDF-1.4")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], json!("invalid_request"));
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.upload_dir = dir.path().to_path_buf();
        let state = AppState::with_store(config.clone(), Arc::new(SqliteStore::in_memory().unwrap()));
        let app = build_router(state, &config.server);

        let (status, body) = send(&app, multipart("file", "broken.pdf", "not really a pdf")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], json!("parse_error"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
