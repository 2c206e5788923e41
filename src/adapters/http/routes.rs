//! Route table for the REST surface.

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::handlers::{
    create_demo_session, create_flow, create_session, delete_flow, delete_session, flow_info,
    flow_versions, get_events, get_flow, get_session, health, list_flows, post_input,
    publish_flow, update_flow, validate_flow_endpoint, AppState,
};

/// Builds the full REST router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/demo", post(create_demo_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id", delete(delete_session))
        .route("/api/sessions/:id/input", post(post_input))
        .route("/api/sessions/:id/events", get(get_events))
        .route("/api/flow-info", get(flow_info))
        .route("/api/flows", get(list_flows))
        .route("/api/flows", post(create_flow))
        .route("/api/flows/validate", post(validate_flow_endpoint))
        .route("/api/flows/:id", get(get_flow))
        .route("/api/flows/:id", put(update_flow))
        .route("/api/flows/:id", delete(delete_flow))
        .route("/api/flows/:id/publish", post(publish_flow))
        .route("/api/flows/:id/versions", get(flow_versions))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::classifier::PatternClassifier;
    use crate::adapters::memory::{InMemoryFlowRepository, InMemorySessionStore};
    use crate::application::orchestrator::{Orchestrator, ToolRegistry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let store = Arc::new(InMemorySessionStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            store,
            Arc::new(PatternClassifier::new()),
            Arc::new(ToolRegistry::new()),
        ));
        AppState::new(orchestrator, Arc::new(InMemoryFlowRepository::new()))
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let response = api_routes(test_state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_returns_not_found() {
        let response = api_routes(test_state())
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/sessions/{}",
                        crate::domain::foundation::SessionId::new()
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_session_rejects_invalid_flow() {
        let response = api_routes(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"flow": {"meta": {"name": "x"}, "start": "Gone", "states": {"A": {}}}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn demo_session_creates_and_serves_state() {
        let state = test_state();
        let app = api_routes(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions/demo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let session_id = created["session_id"].as_str().unwrap().to_string();
        assert_eq!(created["flow_name"], "restaurant-reservation");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn input_without_text_is_bad_request() {
        let app = api_routes(test_state());

        let create = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions/demo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(create.into_body(), usize::MAX)
            .await
            .unwrap();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let session_id = created["session_id"].as_str().unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/sessions/{}/input", session_id))
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn flow_crud_round_trip() {
        let app = api_routes(test_state());
        let definition = crate::application::demo::demo_flow();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/flows")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"definition": definition}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let record: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(record["name"], "restaurant-reservation");
        assert_eq!(record["version"], 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/flows/{}", record["id"].as_str().unwrap()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn validate_endpoint_reports_errors_without_rejecting() {
        let response = api_routes(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/flows/validate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"definition": {"states": {}}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let verdict: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(verdict["valid"], false);
    }
}
