use std::sync::Arc;

use action_registry::{ActionRegistry, BrowserFacade};
use agent_core::{AgentCore, AgentHistoryList, AgentRequest, AgentSettings, LlmProvider, RunState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Dependencies the HTTP control surface needs to build an `AgentCore` for
/// each incoming `/agent/start` call (SPEC_FULL.md §6.1).
#[derive(Clone)]
pub struct AgentServerDeps {
    pub registry: Arc<ActionRegistry>,
    pub facade: Arc<dyn BrowserFacade>,
    pub llm: Arc<dyn LlmProvider>,
    pub settings: AgentSettings,
}

struct RunSlot {
    core: Arc<AgentCore>,
    history: Arc<Mutex<Option<AgentHistoryList>>>,
}

#[derive(Clone)]
pub struct AppState {
    deps: AgentServerDeps,
    active: Arc<Mutex<Option<RunSlot>>>,
}

pub fn build_router(deps: AgentServerDeps) -> Router {
    let state = AppState {
        deps,
        active: Arc::new(Mutex::new(None)),
    };

    Router::new()
        .route("/agent/start", post(start))
        .route("/agent/stop", post(stop))
        .route("/agent/pause", post(pause))
        .route("/agent/resume", post(resume))
        .route("/agent/status", get(status))
        .route("/agent/history", get(history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub task_id: String,
    pub goal: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub task_id: String,
}

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("a task is already running")]
    AlreadyRunning,
    #[error("no task is currently running")]
    NoActiveTask,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            ServerError::AlreadyRunning => StatusCode::CONFLICT,
            ServerError::NoActiveTask => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ServerError> {
    let mut active = state.active.lock().await;
    if active.is_some() {
        return Err(ServerError::AlreadyRunning);
    }

    let agent_request = AgentRequest::new(request.task_id.clone(), request.goal);
    let core = Arc::new(AgentCore::new(
        agent_request,
        state.deps.settings.clone(),
        state.deps.registry.clone(),
        state.deps.facade.clone(),
        state.deps.llm.clone(),
    ));
    let history_slot = Arc::new(Mutex::new(None));

    let spawned_core = core.clone();
    let spawned_history = history_slot.clone();
    tokio::spawn(async move {
        let result = spawned_core.run().await;
        let history = result.unwrap_or_default();
        *spawned_history.lock().await = Some(history);
        info!("agent run finished");
    });

    *active = Some(RunSlot {
        core,
        history: history_slot,
    });

    Ok(Json(StartResponse {
        task_id: request.task_id,
    }))
}

async fn stop(State(state): State<AppState>) -> Result<StatusCode, ServerError> {
    let active = state.active.lock().await;
    let slot = active.as_ref().ok_or(ServerError::NoActiveTask)?;
    slot.core.stop();
    Ok(StatusCode::ACCEPTED)
}

async fn pause(State(state): State<AppState>) -> Result<StatusCode, ServerError> {
    let active = state.active.lock().await;
    let slot = active.as_ref().ok_or(ServerError::NoActiveTask)?;
    slot.core.pause().await;
    Ok(StatusCode::ACCEPTED)
}

async fn resume(State(state): State<AppState>) -> Result<StatusCode, ServerError> {
    let active = state.active.lock().await;
    let slot = active.as_ref().ok_or(ServerError::NoActiveTask)?;
    slot.core.resume().await;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: &'static str,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let active = state.active.lock().await;
    let run_state = match active.as_ref() {
        Some(slot) => match slot.core.status().await {
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
        },
        None => "inactive",
    };
    Json(StatusResponse { state: run_state })
}

async fn history(State(state): State<AppState>) -> Result<Json<AgentHistoryList>, ServerError> {
    let active = state.active.lock().await;
    let slot = active.as_ref().ok_or(ServerError::NoActiveTask)?;
    let history = slot.history.lock().await.clone().unwrap_or_default();
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_registry::{single_tab, ScriptedBrowserFacade};
    use agent_core::MockLlmProvider;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn deps() -> AgentServerDeps {
        let registry = Arc::new(ActionRegistry::new());
        action_registry::builtin_catalog()
            .into_iter()
            .for_each(|def| registry.register(def, false).unwrap());
        let facade = Arc::new(ScriptedBrowserFacade::new(vec![single_tab(
            "https://example.com",
            "Example",
        )]));
        AgentServerDeps {
            registry,
            facade,
            llm: Arc::new(MockLlmProvider::scripted_success_after(1)),
            settings: AgentSettings::default(),
        }
    }

    #[tokio::test]
    async fn status_reports_inactive_before_any_task_started() {
        let app = build_router(deps());
        let response = app
            .oneshot(Request::builder().uri("/agent/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["state"], "inactive");
    }

    #[tokio::test]
    async fn start_then_status_reports_a_run_state() {
        let app = build_router(deps());
        let start_body = serde_json::to_vec(&StartRequest {
            task_id: "t1".to_string(),
            goal: "do something".to_string(),
        })
        .unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/agent/start")
                    .header("content-type", "application/json")
                    .body(Body::from(start_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let status_response = app
            .oneshot(Request::builder().uri("/agent/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(status_response.status(), StatusCode::OK);
    }
}
