//! Integration tests for the OpenAI-compatible client against a local fake
//! chat-completions endpoint.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use sql_agent::error::AgentError;
use sql_agent::llm::{CompletionService, OpenAiClient, Prompt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// What the fake endpoint saw and how it answers.
#[derive(Default)]
struct FakeApi {
    status: Option<StatusCode>,
    reply: Value,
    delay: Option<Duration>,
    seen_auth: Mutex<Option<String>>,
    seen_body: Mutex<Option<Value>>,
}

async fn chat_completions(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    *api.seen_auth.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *api.seen_body.lock().unwrap() = Some(body);

    if let Some(delay) = api.delay {
        tokio::time::sleep(delay).await;
    }
    (api.status.unwrap_or(StatusCode::OK), Json(api.reply.clone()))
}

/// Serve the fake API on an ephemeral port and return its base URL.
async fn spawn_fake(api: Arc<FakeApi>) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(api);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1/", addr)
}

fn prompt() -> Prompt {
    Prompt {
        system: "You generate SQL queries.".to_string(),
        user: "Question: how many orders?".to_string(),
    }
}

#[tokio::test]
async fn test_complete_returns_content() {
    let api = Arc::new(FakeApi {
        reply: serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "SELECT COUNT(*) FROM orders"}}]
        }),
        ..FakeApi::default()
    });
    let base_url = spawn_fake(api.clone()).await;

    let client =
        OpenAiClient::new("sk-test", "gpt-4o-mini", &base_url, Duration::from_secs(5)).unwrap();
    let text = client.complete(&prompt()).await.unwrap();
    assert_eq!(text, "SELECT COUNT(*) FROM orders");

    assert_eq!(
        api.seen_auth.lock().unwrap().as_deref(),
        Some("Bearer sk-test")
    );
    let body = api.seen_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["messages"][0]["content"], "You generate SQL queries.");
    assert_eq!(body["messages"][1]["content"], "Question: how many orders?");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let api = Arc::new(FakeApi {
        status: Some(StatusCode::UNAUTHORIZED),
        reply: serde_json::json!({"error": {"message": "Incorrect API key provided"}}),
        ..FakeApi::default()
    });
    let base_url = spawn_fake(api).await;

    let client =
        OpenAiClient::new("sk-wrong", "gpt-4o-mini", &base_url, Duration::from_secs(5)).unwrap();
    let err = client.complete(&prompt()).await.unwrap_err();
    match &err {
        AgentError::Completion { message, status } => {
            assert_eq!(*status, Some(401));
            assert!(message.contains("Incorrect API key"));
        }
        other => panic!("expected Completion, got: {:?}", other),
    }
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_blank_content_is_unusable() {
    let api = Arc::new(FakeApi {
        reply: serde_json::json!({"choices": [{"message": {"content": ""}}]}),
        ..FakeApi::default()
    });
    let base_url = spawn_fake(api).await;

    let client =
        OpenAiClient::new("sk-test", "gpt-4o-mini", &base_url, Duration::from_secs(5)).unwrap();
    let err = client.complete(&prompt()).await.unwrap_err();
    assert!(matches!(err, AgentError::Completion { status: None, .. }));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let api = Arc::new(FakeApi {
        reply: serde_json::json!({"choices": [{"message": {"content": "SELECT 1"}}]}),
        delay: Some(Duration::from_secs(3)),
        ..FakeApi::default()
    });
    let base_url = spawn_fake(api).await;

    let client =
        OpenAiClient::new("sk-test", "gpt-4o-mini", &base_url, Duration::from_millis(200)).unwrap();
    let err = client.complete(&prompt()).await.unwrap_err();
    assert!(
        matches!(err, AgentError::Timeout { .. }),
        "expected Timeout, got: {:?}",
        err
    );
}

#[tokio::test]
async fn test_unreachable_service() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OpenAiClient::new(
        "sk-test",
        "gpt-4o-mini",
        &format!("http://{}/v1", addr),
        Duration::from_secs(2),
    )
    .unwrap();
    let err = client.complete(&prompt()).await.unwrap_err();
    assert!(matches!(err, AgentError::Completion { .. }));
}
