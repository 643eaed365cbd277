//! Routes of the chat gateway.

use crate::agent::Agent;
use crate::error::AgentError;
use crate::llm::CompletionService;
use crate::models::{AskRequest, QueryResult};
use crate::snapshot::CatalogSource;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("assets/index.html");

/// Build the router: chat page, favicon, health and `/ask`.
pub fn router<L, C>(agent: Arc<Agent<L, C>>) -> Router
where
    L: CompletionService + 'static,
    C: CatalogSource + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/favicon.ico", get(favicon))
        .route("/health", get(health))
        .route("/ask", post(ask::<L, C>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(agent)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ask<L, C>(
    State(agent): State<Arc<Agent<L, C>>>,
    Json(body): Json<AskRequest>,
) -> Result<Json<QueryResult>, AgentError>
where
    L: CompletionService + 'static,
    C: CatalogSource + 'static,
{
    let result = agent.ask(&body.question).await?;
    Ok(Json(result))
}
