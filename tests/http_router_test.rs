//! Integration tests for the HTTP routes.
//!
//! Requests go through the full router (CORS and tracing layers included)
//! with `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use sql_agent::agent::{Agent, AgentOptions};
use sql_agent::config::PoolOptions;
use sql_agent::db::DbPool;
use sql_agent::error::{AgentError, AgentResult};
use sql_agent::llm::{CompletionService, Prompt};
use sql_agent::models::ConnectionConfig;
use sql_agent::server::router;
use sql_agent::snapshot::PoolCatalog;
use sql_agent::sql::SqlDialect;
use std::future::Future;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Completion service with a canned outcome.
#[derive(Clone)]
enum Canned {
    Reply(&'static str),
    Unavailable,
}

impl CompletionService for Canned {
    fn complete(&self, _prompt: &Prompt) -> impl Future<Output = AgentResult<String>> + Send {
        let outcome = match self {
            Canned::Reply(text) => Ok(text.to_string()),
            Canned::Unavailable => Err(AgentError::completion("HTTP 503: overloaded", Some(503))),
        };
        async move { outcome }
    }
}

async fn setup_router(canned: Canned) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("app.db").display());

    let writable = ConnectionConfig::new(&url, true, None, PoolOptions::default()).unwrap();
    let writer = DbPool::connect(&writable).await.unwrap();
    if let DbPool::SQLite(p) = &writer {
        sqlx::query("CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, price REAL)")
            .execute(p)
            .await
            .unwrap();
        sqlx::query("INSERT INTO products VALUES (1, 'Pen', 1.5), (2, 'Book', 12.0)")
            .execute(p)
            .await
            .unwrap();
    }
    writer.close().await;

    let read_only = ConnectionConfig::new(&url, false, None, PoolOptions::default()).unwrap();
    let pool = DbPool::connect(&read_only).await.unwrap();
    let options = AgentOptions {
        dialect: SqlDialect::Limit,
        default_schema: Some("main".to_string()),
        ..AgentOptions::default()
    };
    let catalog = PoolCatalog::new(pool.clone(), "main");
    let agent = Arc::new(Agent::new(pool, canned, catalog, options));
    (dir, router(agent))
}

fn ask_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_dir, app) = setup_router(Canned::Reply("SELECT 1")).await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_index_and_favicon() {
    let (_dir, app) = setup_router(Canned::Reply("SELECT 1")).await;

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("fetch(\"/ask\""));

    let response = app.oneshot(get("/favicon.ico")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_ask_success() {
    let (_dir, app) = setup_router(Canned::Reply(
        "sql: SELECT name, price FROM products ORDER BY price DESC",
    ))
    .await;

    let response = app
        .oneshot(ask_request(r#"{"question": "What is the most expensive product?"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(
        body["sql"],
        "SELECT name, price FROM main.products ORDER BY price DESC LIMIT 50;"
    );
    assert_eq!(body["columns"], serde_json::json!(["name", "price"]));
    assert_eq!(body["rows"][0]["name"], "Book");
    assert_eq!(body["rows"][1]["price"], 1.5);
    assert_eq!(body["truncated"], false);
    assert!(body["execution_time_ms"].is_u64());
}

#[tokio::test]
async fn test_ask_blank_question_is_bad_request() {
    let (_dir, app) = setup_router(Canned::Reply("SELECT 1")).await;
    let response = app.oneshot(ask_request(r#"{"question": "  "}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_ask_rejected_sql_is_unprocessable() {
    let (_dir, app) = setup_router(Canned::Reply("UPDATE products SET price = 0")).await;
    let response = app
        .oneshot(ask_request(r#"{"question": "Make everything free"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("SELECT"), "detail: {}", detail);
}

#[tokio::test]
async fn test_ask_completion_failure_is_bad_gateway() {
    let (_dir, app) = setup_router(Canned::Unavailable).await;
    let response = app
        .oneshot(ask_request(r#"{"question": "Anything"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("503"));
}

#[tokio::test]
async fn test_ask_database_error_is_internal() {
    let (_dir, app) = setup_router(Canned::Reply("SELECT * FROM invoices")).await;
    let response = app
        .oneshot(ask_request(r#"{"question": "Show invoices"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("invoices"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (_dir, app) = setup_router(Canned::Reply("SELECT 1")).await;
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
