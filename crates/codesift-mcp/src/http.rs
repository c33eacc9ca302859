use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use codesift_graph::KnowledgeGraph;
use codesift_vector::VectorStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::hybrid::HybridEngine;
use crate::registry::ToolRegistry;

pub struct AppState {
    pub engine: HybridEngine,
    pub registry: Arc<ToolRegistry>,
    pub vector_store: Arc<VectorStore>,
    pub knowledge_graph: Option<Arc<KnowledgeGraph>>,
}

#[derive(Deserialize)]
pub struct ProcessRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Builds the engine's HTTP surface (spec §6): `POST /api/v1/mcp/process`,
/// `GET /api/v1/mcp/tools`, `POST /api/l3agent/generate-embeddings`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/mcp/process", post(process_handler))
        .route("/api/v1/mcp/tools", get(list_tools_handler))
        .route("/api/l3agent/generate-embeddings", post(generate_embeddings_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    info!(%addr, "codesift http surface listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn process_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorBody>)> {
    let result = state.engine.process(&request.query).await;
    serde_json::to_value(&result)
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody { error: e.to_string() }),
            )
        })
}

async fn list_tools_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "tools": state.registry.list_schemas() }))
}

#[derive(Deserialize)]
pub struct GenerateEmbeddingsRequest {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

async fn generate_embeddings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateEmbeddingsRequest>,
) -> Json<Value> {
    if let Some(graph) = &state.knowledge_graph {
        let graph = graph.clone();
        let path = std::path::PathBuf::from(&request.path);
        let recursive = request.recursive;
        let build_result = tokio::task::spawn_blocking(move || graph.build(&path, recursive)).await;
        match build_result {
            Ok(Ok((entities, relationships))) => {
                return Json(json!({
                    "accepted": true,
                    "entities_indexed": entities,
                    "relationships_indexed": relationships,
                }))
            }
            Ok(Err(e)) => return Json(json!({ "accepted": false, "error": e.to_string() })),
            Err(e) => return Json(json!({ "accepted": false, "error": e.to_string() })),
        }
    }
    Json(json!({ "accepted": false, "error": "knowledge graph is not configured" }))
}
