pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/interview/turns", post(handlers::handle_turn))
        .route(
            "/api/v1/interview/sessions/:id/summary",
            get(handlers::handle_get_summary),
        )
        .route(
            "/api/v1/interview/sessions/:id",
            delete(handlers::handle_close_session),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::interview::registry::SessionRegistry;
    use crate::interview::service::InterviewService;
    use crate::interview::worker::{channel, TurnJob};
    use crate::llm_client::fake::ScriptedModel;

    fn app(replies: Vec<&str>) -> (Router, mpsc::Receiver<TurnJob>) {
        let (queue, mut shards) = channel(8, 1);
        let service = InterviewService::new(
            Arc::new(SessionRegistry::new(3)),
            Arc::new(ScriptedModel::new(replies)),
            queue,
        );
        let state = AppState {
            interview: Arc::new(service),
        };
        (build_router(state), shards.remove(0))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_turn(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/interview/turns")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _rx) = app(vec![]);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "interview-api");
    }

    #[tokio::test]
    async fn test_turn_then_summary_then_close() {
        let (app, _rx) = app(vec!["What do you work on day to day?"]);

        let response = app
            .clone()
            .oneshot(post_turn(r#"{"session_id":"s1","user_id":"u1","message":"Hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["reply"], "What do you work on day to day?");
        assert_eq!(body["turn_index"], 1);
        assert_eq!(body["topic_depth"], 0);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/interview/sessions/s1/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["total_nodes"], 1);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/interview/sessions/s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (app, _rx) = app(vec![]);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/interview/sessions/nope/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "NOT_FOUND");

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/interview/sessions/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let (app, _rx) = app(vec![]);
        let response = app
            .oneshot(post_turn(r#"{"user_id":"u1","message":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generation_failure_is_llm_error() {
        let (app, _rx) = app(vec![]);
        let response = app
            .oneshot(post_turn(r#"{"user_id":"u1","message":"Hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"]["code"], "LLM_ERROR");
    }
}
