//! Axum router configuration with middleware.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/organize", post(handlers::organize))
        .route("/process", post(handlers::process))
        .route("/status/{batch_id}/{chunk_id}", get(handlers::status))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use shelver_types::config::ShelverConfig;
    use tower::ServiceExt;

    /// Real wiring against unreachable backends: handlers that do not reach
    /// the network (health, status miss, validation failures) are exercised
    /// end to end through the router.
    async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let config = ShelverConfig {
            database_path: dir
                .path()
                .join("api_test.db")
                .display()
                .to_string(),
            store_base_url: "http://127.0.0.1:1".to_string(),
            orchestrator_base_url: "http://127.0.0.1:1".to_string(),
            llm_base_url: "http://127.0.0.1:1".to_string(),
            ..ShelverConfig::default()
        };
        AppState::init(config).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(&dir).await);

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_miss_is_not_found_body() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(&dir).await);

        let response = router
            .oneshot(
                Request::get("/status/no_batch/no_chunk")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "not_found");
    }

    #[tokio::test]
    async fn organize_rejects_empty_file_list() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(&dir).await);

        let body = serde_json::json!({
            "directory_path": "/box",
            "files": []
        });
        let response = router
            .oneshot(
                Request::post("/organize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn process_accepts_a_batch() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(&dir).await);

        let body = serde_json::json!({
            "batch_id": "b_router_test",
            "chunk_id": "c0",
            "ids": ["ent_1", "ent_2"]
        });
        let response = router
            .oneshot(
                Request::post("/process")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["total"], 2);
    }
}
