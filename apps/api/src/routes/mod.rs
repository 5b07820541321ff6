pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::import::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.import_body_limit_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/profile", get(handlers::handle_get_profile))
        .route(
            "/api/v1/profile/import",
            post(handlers::handle_import).layer(DefaultBodyLimit::max(body_limit)),
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
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::{Config, StoreBackend};
    use crate::store::{EntityKind, MemoryStore, ProfileStore, StoreError};

    fn app(store: MemoryStore) -> Router {
        build_router(AppState {
            store: Arc::new(store),
            config: Config {
                store_backend: StoreBackend::Memory,
                database_url: None,
                db_max_connections: 1,
                port: 0,
                rust_log: "info".into(),
                json_logs: false,
                import_body_limit_bytes: 64 * 1024,
            },
        })
    }

    async fn post_raw(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_import(app: Router, owner: Uuid, payload: Value) -> (StatusCode, Value) {
        let uri = format!("/api/v1/profile/import?user_id={owner}");
        post_raw(app, &uri, payload.to_string()).await
    }

    async fn get_profile(app: Router, owner: Uuid) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(format!("/api/v1/profile?user_id={owner}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_import_returns_counts() {
        let (status, body) = post_import(
            app(MemoryStore::new()),
            Uuid::new_v4(),
            json!({
                "name": "Ada",
                "experiences": [{
                    "company": "Acme", "title": "Engineer",
                    "startDate": "2020-01-01", "description": "Built things"
                }],
                "skills": ["Go", "Go"]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(
            body["imported"],
            json!({
                "name": true,
                "summary": false,
                "experiencesImported": 1,
                "projectsImported": 0,
                "skillsImported": 1,
                "educationsImported": 0
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_payload_lists_fields() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let (status, body) = post_import(
            app(store.clone()),
            owner,
            json!({ "name": "Ada", "experiences": [{ "location": "Berlin" }] }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
        assert_eq!(body["fields"][0]["field"], json!("experiences[0]"));
        assert!(matches!(
            store.load_profile(owner).await,
            Err(StoreError::OwnerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_generic() {
        let store = MemoryStore::new();
        store.inject_failure(EntityKind::Skill, 1).unwrap();
        let (status, body) =
            post_import(app(store), Uuid::new_v4(), json!({ "skills": ["Go"] })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({
            "error": "An internal server error occurred",
            "code": "INTERNAL_ERROR"
        }));
    }

    #[tokio::test]
    async fn test_profile_reflects_import() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        post_import(app(store.clone()), owner, json!({ "summary": "Hi", "skills": ["Rust"] })).await;

        let (status, body) = get_profile(app(store), owner).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bio"], json!("Hi"));
        assert_eq!(body["skills"][0]["name"], json!("Rust"));
        assert_eq!(body["skills"][0]["category"], json!("Other"));
    }

    #[tokio::test]
    async fn test_unknown_owner_profile_is_not_found() {
        let (status, body) = get_profile(app(MemoryStore::new()), Uuid::new_v4()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("NOT_FOUND"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_json_error() {
        let uri = format!("/api/v1/profile/import?user_id={}", Uuid::new_v4());
        let (status, body) = post_raw(app(MemoryStore::new()), &uri, "{not json".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("BAD_REQUEST"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_user_id_is_a_json_error() {
        let (status, body) =
            post_raw(app(MemoryStore::new()), "/api/v1/profile/import", "{}".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("BAD_REQUEST"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_body_is_a_json_error() {
        let payload = json!({ "summary": "x".repeat(128 * 1024) });
        let (status, body) =
            post_import(app(MemoryStore::new()), Uuid::new_v4(), payload).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], json!("PAYLOAD_TOO_LARGE"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(MemoryStore::new()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
