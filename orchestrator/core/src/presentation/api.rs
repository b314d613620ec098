// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! Task-style access to the request pipeline: submit a natural-language
//! request, poll its task, list capabilities, receive coordination server
//! webhooks. Structured routes queue an already-known action, bypassing
//! interpretation but not dispatch.
//!
//! | Route | Auth | Description |
//! |-------|------|-------------|
//! | `GET /health` | no | liveness |
//! | `POST /requests` | yes | queue a request, returns `task_id` |
//! | `POST /infrastructure/action` | yes | queue a network change |
//! | `POST /game/deploy` | yes | queue a game server deployment |
//! | `POST /llm/generate` | yes | raw completion from the gateway |
//! | `POST /llm/embed` | yes | embedding of a text |
//! | `GET /tasks` | yes | all tasks, newest first |
//! | `GET /tasks/{task_id}` | yes | one task |
//! | `POST /webhook` | yes | coordination server events (logged) |
//! | `GET /capabilities` | yes | registered capabilities and health |

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::task_board::{TaskBoard, TaskId};
use crate::domain::intent::{ActionKind, Intent, Parameters};
use crate::domain::llm::GenerationOptions;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct ApiState {
    pub board: TaskBoard,
    pub api_key: Option<Arc<str>>,
}

impl ApiState {
    pub fn new(board: TaskBoard, api_key: Option<String>) -> Self {
        Self {
            board,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/requests", post(submit_request_handler))
        .route("/infrastructure/action", post(infrastructure_action_handler))
        .route("/game/deploy", post(game_deploy_handler))
        .route("/llm/generate", post(llm_generate_handler))
        .route("/llm/embed", post(llm_embed_handler))
        .route("/tasks", get(list_tasks_handler))
        .route("/tasks/{task_id}", get(get_task_handler))
        .route("/webhook", post(webhook_handler))
        .route("/capabilities", get(capabilities_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("API listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn require_api_key(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_ref()) {
            return error_response(StatusCode::UNAUTHORIZED, "Invalid API key");
        }
    }
    next.run(request).await
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

async fn submit_request_handler(State(state): State<ApiState>, Json(payload): Json<SubmitRequest>) -> Response {
    if payload.text.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "text must not be empty");
    }
    let task_id = state.board.submit(payload.text);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "task_id": task_id, "status": "queued" })),
    )
        .into_response()
}

fn queued_response(task_id: TaskId, message: String) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "task_id": task_id, "status": "queued", "message": message })),
    )
        .into_response()
}

/// Tell peers a structured task was queued. Best effort.
async fn announce(state: &ApiState, event_type: &str, data: serde_json::Value) {
    if let Err(e) = state.board.orchestrator().coordination().publish(event_type, data).await {
        warn!(event_type, error = %e, "Failed to notify coordination server");
    }
}

#[derive(Debug, Deserialize)]
pub struct InfrastructureActionRequest {
    /// create, read, update or delete.
    pub action_type: String,
    /// firewall_rule, nat, vlan, alias, wireguard_peer.
    pub resource_type: String,
    #[serde(default)]
    pub parameters: Parameters,
}

async fn infrastructure_action_handler(
    State(state): State<ApiState>,
    Json(payload): Json<InfrastructureActionRequest>,
) -> Response {
    if payload.action_type.trim().is_empty() || payload.resource_type.trim().is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "action_type and resource_type must not be empty",
        );
    }

    let mut parameters = Parameters::new();
    // Fields the network agent keys its lock and item lookup on.
    for key in ["uuid", "vlan", "interface", "resource_key", "host"] {
        if let Some(value) = payload.parameters.get(key) {
            parameters.insert(key.to_string(), value.clone());
        }
    }
    parameters.insert("action_type".into(), payload.action_type.clone().into());
    parameters.insert("resource_type".into(), payload.resource_type.clone().into());
    parameters.insert("parameters".into(), serde_json::Value::Object(payload.parameters));

    let message = format!("Performing {} on {}", payload.action_type, payload.resource_type);
    let intent = Intent::new(message.clone(), ActionKind::NetworkConfig, parameters, 1.0);
    let task_id = state.board.submit_intent(intent);

    announce(
        &state,
        "infrastructure_action_started",
        json!({
            "task_id": task_id,
            "action_type": payload.action_type,
            "resource_type": payload.resource_type,
        }),
    )
    .await;
    queued_response(task_id, message)
}

#[derive(Debug, Deserialize)]
pub struct GameDeployRequest {
    /// minecraft, cs2 or valheim.
    pub game_type: String,
    pub server_name: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Container memory, e.g. "4G".
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub additional_settings: Option<Parameters>,
}

async fn game_deploy_handler(State(state): State<ApiState>, Json(payload): Json<GameDeployRequest>) -> Response {
    if payload.game_type.trim().is_empty() || payload.server_name.trim().is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "game_type and server_name must not be empty",
        );
    }

    let mut parameters = Parameters::new();
    parameters.insert("game_type".into(), payload.game_type.clone().into());
    parameters.insert("server_name".into(), payload.server_name.clone().into());
    if let Some(port) = payload.port {
        parameters.insert("port".into(), port.into());
    }
    if let Some(memory) = payload.memory {
        parameters.insert("memory".into(), memory.into());
    }
    if let Some(host) = payload.host {
        parameters.insert("host".into(), host.into());
    }
    if let Some(settings) = payload.additional_settings {
        parameters.insert("settings".into(), serde_json::Value::Object(settings));
    }

    let message = format!("Deploying {} server '{}'", payload.game_type, payload.server_name);
    let intent = Intent::new(message.clone(), ActionKind::GameServerDeploy, parameters, 1.0);
    let task_id = state.board.submit_intent(intent);

    announce(
        &state,
        "game_server_deployment_started",
        json!({
            "task_id": task_id,
            "game_type": payload.game_type,
            "server_name": payload.server_name,
        }),
    )
    .await;
    queued_response(task_id, message)
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

async fn llm_generate_handler(State(state): State<ApiState>, Json(payload): Json<GenerateRequest>) -> Response {
    if payload.prompt.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "prompt must not be empty");
    }

    let prompt = match &payload.system {
        Some(system) => format!("{}\n\n{}", system, payload.prompt),
        None => payload.prompt.clone(),
    };
    let options = GenerationOptions {
        max_tokens: payload.max_tokens,
        temperature: payload.temperature,
        json_mode: false,
    };

    let llm = state.board.orchestrator().interpreter().llm().clone();
    match llm.generate(&prompt, &options).await {
        Ok(response) => Json(json!({
            "text": response.text,
            "model": response.model,
            "provider": response.provider,
            "usage": {
                "prompt_tokens": response.usage.prompt_tokens,
                "completion_tokens": response.usage.completion_tokens,
            },
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Generation failed");
            error_response(StatusCode::BAD_GATEWAY, format!("Generation failed: {}", e))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

async fn llm_embed_handler(State(state): State<ApiState>, Json(payload): Json<EmbedRequest>) -> Response {
    if payload.text.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "text must not be empty");
    }
    match state.board.orchestrator().context().embed(&payload.text).await {
        Ok(embedding) => Json(json!({ "embedding": embedding })).into_response(),
        Err(e) => {
            warn!(error = %e, "Embedding failed");
            error_response(StatusCode::BAD_GATEWAY, format!("Embedding failed: {}", e))
        }
    }
}

async fn list_tasks_handler(State(state): State<ApiState>) -> Response {
    Json(state.board.list()).into_response()
}

async fn get_task_handler(State(state): State<ApiState>, Path(task_id): Path<String>) -> Response {
    let Ok(uuid) = Uuid::parse_str(&task_id) else {
        return error_response(StatusCode::BAD_REQUEST, format!("Invalid task id {}", task_id));
    };
    match state.board.get(&TaskId(uuid)) {
        Some(task) => Json(task).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Task {} not found", task_id)),
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

async fn webhook_handler(Json(event): Json<WebhookEvent>) -> Json<serde_json::Value> {
    let source = event.source.as_deref().unwrap_or("unknown");
    match event.event_type.as_str() {
        "game_server_status_changed" => info!(
            source,
            server = %event.data.get("server_name").unwrap_or(&serde_json::Value::Null),
            status = %event.data.get("status").unwrap_or(&serde_json::Value::Null),
            "Game server status changed"
        ),
        "action_result" => info!(source, data = %event.data, "Peer action result"),
        other if other.is_empty() => warn!(source, "Webhook without event type"),
        other => info!(source, event_type = other, "Webhook received"),
    }
    Json(json!({ "status": "ok" }))
}

async fn capabilities_handler(State(state): State<ApiState>) -> Response {
    let capabilities = state.board.orchestrator().dispatcher().registry().capabilities();
    Json(capabilities).into_response()
}
