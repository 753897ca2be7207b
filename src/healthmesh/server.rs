//! Thin HTTP surface over the orchestration core (cargo feature `server`).
//!
//! Routes:
//!
//! - `POST /health-assist` — run the batch pipeline, return the full [`WellnessPlan`]
//! - `POST /recommendations` — run the pipeline, return only query + recommendations
//! - `POST /follow-up` — answer a follow-up question against the user's last plan
//! - `POST /chat_stream` — Server-Sent-Events stream of [`StreamEvent`]s
//!   (`text/event-stream`, each event as `data: <json>\n\n`)
//! - `GET /history/{user_id}` — the user's stored plans
//! - `GET /` — greeting
//!
//! Errors surface as `{"error": message}` with a status per condition (400 invalid
//! input, 503 key pool exhausted, 500 otherwise). Once `/chat_stream` has started
//! streaming it can no longer downgrade to an HTTP error — mid-run failures arrive
//! as a terminal `thought` event instead.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

use crate::healthmesh::agents::send_with_rotation;
use crate::healthmesh::client_wrapper::Message;
use crate::healthmesh::error::HealthMeshError;
use crate::healthmesh::intent;
use crate::healthmesh::orchestrator::{Orchestrator, WellnessPlan};
use crate::healthmesh::streaming::StreamEvent;

/// Canned rejection for queries the intent filter turns away.
const OFF_TOPIC_MESSAGE: &str = "This is a wellness specialized system. Please ask about \
     symptoms, lifestyle, diet, exercise, or other health-related topics.";

/// System prompt of the follow-up endpoint's single model call.
const FOLLOW_UP_SYSTEM_PROMPT: &str =
    "You are a cautious wellness assistant answering follow-up questions \
     about an existing wellness plan. Use the provided summary and \
     recommendations as context. You may clarify, reorder, or restate \
     information, but do NOT diagnose, do NOT prescribe medicines, and \
     always remind the user to follow their doctor's advice.";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The orchestration core; carries the key pool, client factory,
    /// knowledge base, and history store.
    pub orchestrator: Orchestrator,
}

impl IntoResponse for HealthMeshError {
    fn into_response(self) -> Response {
        let status = match &self {
            HealthMeshError::Input(_) => StatusCode::BAD_REQUEST,
            HealthMeshError::PoolExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            HealthMeshError::Provider(_) | HealthMeshError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
struct HealthAssistRequest {
    #[serde(default)]
    symptoms: String,
    #[serde(default)]
    medical_report: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

fn default_user_id() -> String {
    "guest".to_string()
}

#[derive(Deserialize)]
struct FollowUpRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    question: String,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/health-assist", post(health_assist))
        .route("/recommendations", post(recommendations_only))
        .route("/follow-up", post(follow_up))
        .route("/chat_stream", post(chat_stream))
        .route("/history/{user_id}", get(history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn welcome() -> &'static str {
    "Welcome to Health & Diet Care"
}

/// Reject empty or off-topic queries before spending model calls on them.
async fn check_query(state: &AppState, symptoms: &str) -> Result<(), HealthMeshError> {
    if symptoms.trim().is_empty() {
        return Err(HealthMeshError::Input("Symptoms required".to_string()));
    }
    let orchestrator = &state.orchestrator;
    if !intent::is_health_query(&orchestrator.factory, &orchestrator.pool, symptoms).await {
        return Err(HealthMeshError::Input(OFF_TOPIC_MESSAGE.to_string()));
    }
    Ok(())
}

async fn health_assist(
    State(state): State<AppState>,
    Json(req): Json<HealthAssistRequest>,
) -> Result<Json<WellnessPlan>, HealthMeshError> {
    check_query(&state, &req.symptoms).await?;

    let plan = state
        .orchestrator
        .orchestrate(&req.symptoms, &req.medical_report, &req.user_id)
        .await?;
    Ok(Json(plan))
}

async fn recommendations_only(
    State(state): State<AppState>,
    Json(req): Json<HealthAssistRequest>,
) -> Result<Json<serde_json::Value>, HealthMeshError> {
    check_query(&state, &req.symptoms).await?;

    let plan = state
        .orchestrator
        .orchestrate(&req.symptoms, &req.medical_report, &req.user_id)
        .await?;
    Ok(Json(json!({
        "query": plan.query,
        "recommendations": plan.recommendations,
    })))
}

async fn follow_up(
    State(state): State<AppState>,
    Json(req): Json<FollowUpRequest>,
) -> Result<Json<serde_json::Value>, HealthMeshError> {
    if req.user_id.trim().is_empty() || req.question.trim().is_empty() {
        return Err(HealthMeshError::Input(
            "user_id and question are required".to_string(),
        ));
    }

    let orchestrator = &state.orchestrator;
    let history = orchestrator.history.list(&req.user_id).await?;
    let Some(last) = history.last() else {
        return Err(HealthMeshError::Input(
            "No previous wellness session found for this user".to_string(),
        ));
    };

    let context_text = format!(
        "Previous wellness plan summary:\n{}\n\nKey recommendations:\n{}",
        last.synthesized_guidance,
        last.recommendations.join("\n")
    );

    let messages = [
        Message::system(FOLLOW_UP_SYSTEM_PROMPT),
        Message::user(context_text),
        Message::user(format!("User follow-up question: {}", req.question)),
    ];

    let reply = send_with_rotation(&*orchestrator.factory, &orchestrator.pool, &messages).await?;
    Ok(Json(json!({ "answer": reply.content })))
}

async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<HealthAssistRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, HealthMeshError> {
    // SSE still needs a normal HTTP error before any event is sent.
    check_query(&state, &req.symptoms).await?;

    let events = state
        .orchestrator
        .stream_events(req.symptoms, req.medical_report)
        .map(|event: StreamEvent| Event::default().json_data(&event));

    Ok(Sse::new(events))
}

async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, HealthMeshError> {
    let entries = state.orchestrator.history.list(&user_id).await?;
    Ok(Json(json!({ "user_id": user_id, "history": entries })))
}

/// Serve the router on the given address until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("healthmesh server listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
