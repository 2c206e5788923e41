//! HTTP handlers for the session and flow endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use std::time::Instant;

use crate::application::demo::demo_flow;
use crate::application::orchestrator::{EngineError, Orchestrator};
use crate::domain::flow::{validate_flow, FlowConfig};
use crate::domain::foundation::{DomainError, ErrorCode, FlowId, SessionId, Timestamp};
use crate::domain::session::SessionState;
use crate::ports::{FlowRepository, FlowRepositoryError, StoreError};

use super::dto::*;

/// Shared state for the REST surface.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub flows: Arc<dyn FlowRepository>,
    pub started_at: Instant,
}

impl AppState {
    /// Creates app state, stamping the process start time.
    pub fn new(orchestrator: Arc<Orchestrator>, flows: Arc<dyn FlowRepository>) -> Self {
        Self {
            orchestrator,
            flows,
            started_at: Instant::now(),
        }
    }
}

fn engine_error_response(e: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, error) = match e {
        EngineError::Store(StoreError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            DomainError::new(ErrorCode::SessionNotFound, format!("Session not found: {}", id))
                .with_detail("session_id", id.to_string()),
        ),
        EngineError::Store(StoreError::LockHeld(id)) => (
            StatusCode::CONFLICT,
            DomainError::new(
                ErrorCode::SessionBusy,
                format!("Session {} is processing another step; retry shortly", id),
            ),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            DomainError::new(ErrorCode::InternalError, other.to_string()),
        ),
    };
    (status, Json(ErrorResponse::from(error)))
}

fn store_error_response(e: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    engine_error_response(EngineError::Store(e))
}

// ============================================
// Session endpoints
// ============================================

/// POST /api/sessions
///
/// Validates the flow, creates the session, and executes the start
/// state's `onEnter`. Returns the session id plus validator warnings.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let session_id = match request.session_id.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<SessionId>() {
            Ok(id) => Some(id),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::bad_request("Invalid session_id format")),
                )
                    .into_response();
            }
        },
    };

    let validated = match validate_flow(&request.flow) {
        Ok(validated) => validated,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::invalid_flow(e.to_string())),
            )
                .into_response();
        }
    };

    match state
        .orchestrator
        .create_session(validated.config, session_id)
        .await
    {
        Ok(session_id) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                session_id: session_id.to_string(),
                warnings: validated.warnings,
            }),
        )
            .into_response(),
        Err(e) => engine_error_response(e).into_response(),
    }
}

/// POST /api/sessions/demo
pub async fn create_demo_session(State(state): State<AppState>) -> impl IntoResponse {
    let validated = match validate_flow(&demo_flow()) {
        Ok(validated) => validated,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal(e.to_string())),
            )
                .into_response();
        }
    };
    let flow_name = validated.config.meta.name.clone();

    match state.orchestrator.create_session(validated.config, None).await {
        Ok(session_id) => (
            StatusCode::CREATED,
            Json(DemoSessionResponse {
                session_id: session_id.to_string(),
                flow_name,
            }),
        )
            .into_response(),
        Err(e) => engine_error_response(e).into_response(),
    }
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Ok(session_id) = session_id.parse::<SessionId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid session ID format")),
        )
            .into_response();
    };

    match state.orchestrator.store().load_state(&session_id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

/// POST /api/sessions/:id/input
pub async fn post_input(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<InputRequest>,
) -> impl IntoResponse {
    let Ok(session_id) = session_id.parse::<SessionId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid session ID format")),
        )
            .into_response();
    };
    let Some(text) = request.text.filter(|text| !text.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Missing 'text'")),
        )
            .into_response();
    };

    match state
        .orchestrator
        .process_user_input(&session_id, &text)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(OkResponse::new())).into_response(),
        Err(e) => engine_error_response(e).into_response(),
    }
}

/// GET /api/sessions/:id/events?since=N
pub async fn get_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let Ok(session_id) = session_id.parse::<SessionId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid session ID format")),
        )
            .into_response();
    };

    match state
        .orchestrator
        .store()
        .read_events(&session_id, query.since.unwrap_or(0))
        .await
    {
        Ok(events) => (StatusCode::OK, Json(EventsResponse { events })).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Ok(session_id) = session_id.parse::<SessionId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid session ID format")),
        )
            .into_response();
    };

    match state.orchestrator.store().delete_session(&session_id).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse::new())).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

// ============================================
// Flow info (visualization)
// ============================================

/// GET /api/flow-info?session_id=...
///
/// Describes a flow graph for visualization. With a session id, returns
/// that session's bound flow plus its live position; without one, the
/// demo flow.
pub async fn flow_info(
    State(state): State<AppState>,
    Query(query): Query<FlowInfoQuery>,
) -> impl IntoResponse {
    let (flow, session): (FlowConfig, Option<SessionState>) = match &query.session_id {
        Some(raw) => {
            let Ok(session_id) = raw.parse::<SessionId>() else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::bad_request("Invalid session ID format")),
                )
                    .into_response();
            };
            let store = state.orchestrator.store();
            match tokio::try_join!(store.load_flow(&session_id), store.load_state(&session_id)) {
                Ok((flow, session)) => (flow, Some(session)),
                Err(e) => return store_error_response(e).into_response(),
            }
        }
        None => match validate_flow(&demo_flow()) {
            Ok(validated) => (validated.config, None),
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::internal(e.to_string())),
                )
                    .into_response();
            }
        },
    };

    let states = flow
        .states
        .iter()
        .map(|(name, def)| FlowInfoState {
            name: name.clone(),
            terminal: def.is_terminal(),
            targets: def
                .transitions
                .iter()
                .flat_map(|t| t.targets())
                .map(str::to_string)
                .collect(),
        })
        .collect();

    let response = FlowInfoResponse {
        meta: serde_json::to_value(&flow.meta).unwrap_or_default(),
        start: flow.start.clone(),
        states,
        intents: flow.intents.keys().cloned().collect(),
        tools: flow.tools.keys().cloned().collect(),
        session: session.map(|s| FlowInfoSession {
            session_id: s.session_id.to_string(),
            current_state: s.current_state,
            context: s.context,
        }),
    };
    (StatusCode::OK, Json(response)).into_response()
}

// ============================================
// Flow CRUD
// ============================================

fn flow_repo_error_response(e: FlowRepositoryError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        FlowRepositoryError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Flow", &id.to_string())),
        ),
        FlowRepositoryError::Backend(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(message)),
        ),
    }
}

fn parse_flow_id(raw: &str) -> Result<FlowId, (StatusCode, Json<ErrorResponse>)> {
    raw.parse::<FlowId>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid flow ID format")),
        )
    })
}

/// GET /api/flows
pub async fn list_flows(State(state): State<AppState>) -> impl IntoResponse {
    match state.flows.list().await {
        Ok(records) => (
            StatusCode::OK,
            Json(
                records
                    .into_iter()
                    .map(FlowRecordResponse::from)
                    .collect::<Vec<_>>(),
            ),
        )
            .into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// POST /api/flows
pub async fn create_flow(
    State(state): State<AppState>,
    Json(request): Json<SaveFlowRequest>,
) -> impl IntoResponse {
    let validated = match validate_flow(&request.definition) {
        Ok(validated) => validated,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::invalid_flow(e.to_string())),
            )
                .into_response();
        }
    };
    let name = request
        .name
        .unwrap_or_else(|| validated.config.meta.name.clone());

    match state.flows.create(&name, &request.definition).await {
        Ok(record) => (StatusCode::CREATED, Json(FlowRecordResponse::from(record))).into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// GET /api/flows/:id
pub async fn get_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> impl IntoResponse {
    let flow_id = match parse_flow_id(&flow_id) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };

    match state.flows.get(&flow_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(FlowRecordResponse::from(record))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Flow", &flow_id.to_string())),
        )
            .into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// PUT /api/flows/:id
pub async fn update_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Json(request): Json<SaveFlowRequest>,
) -> impl IntoResponse {
    let flow_id = match parse_flow_id(&flow_id) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };
    if let Err(e) = validate_flow(&request.definition) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::invalid_flow(e.to_string())),
        )
            .into_response();
    }

    match state
        .flows
        .update(&flow_id, request.name.as_deref(), &request.definition)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(FlowRecordResponse::from(record))).into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// DELETE /api/flows/:id
pub async fn delete_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> impl IntoResponse {
    let flow_id = match parse_flow_id(&flow_id) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };

    match state.flows.delete(&flow_id).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse::new())).into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// POST /api/flows/:id/publish
pub async fn publish_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> impl IntoResponse {
    let flow_id = match parse_flow_id(&flow_id) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };

    match state.flows.publish(&flow_id).await {
        Ok(record) => (StatusCode::OK, Json(FlowRecordResponse::from(record))).into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// GET /api/flows/:id/versions
pub async fn flow_versions(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> impl IntoResponse {
    let flow_id = match parse_flow_id(&flow_id) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };

    match state.flows.versions(&flow_id).await {
        Ok(records) => (
            StatusCode::OK,
            Json(
                records
                    .into_iter()
                    .map(FlowRecordResponse::from)
                    .collect::<Vec<_>>(),
            ),
        )
            .into_response(),
        Err(e) => flow_repo_error_response(e).into_response(),
    }
}

/// POST /api/flows/validate
pub async fn validate_flow_endpoint(
    Json(request): Json<ValidateFlowRequest>,
) -> impl IntoResponse {
    let response = match validate_flow(&request.definition) {
        Ok(validated) => ValidateFlowResponse {
            valid: true,
            errors: Vec::new(),
            warnings: validated.warnings,
        },
        Err(e) => ValidateFlowResponse {
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    };
    (StatusCode::OK, Json(response))
}

// ============================================
// Health
// ============================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            timestamp: Timestamp::now().to_rfc3339(),
            uptime_secs: state.started_at.elapsed().as_secs(),
        }),
    )
}
