//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/health", get(http::http_health))
        .route("/api/question", get(http::http_get_question))
        .route("/api/check", post(http::http_post_check))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(AppConfig::default()));
        (build_router(state.clone()), state)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn question_has_the_client_fields() {
        let (app, _) = app();
        let (status, body) = send(app, get("/api/question?level=1")).await;
        assert_eq!(status, StatusCode::OK);
        for key in ["id", "level", "prompt", "context_display", "context", "answer"] {
            assert!(body.get(key).is_some(), "missing {key}: {body}");
        }
        assert_eq!(body["level"], 1);
        assert!(body.get("code").is_none());
    }

    #[tokio::test]
    async fn level_validation() {
        let (app, _) = app();
        let (status, body) = send(app.clone(), get("/api/question?level=7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Level must be between 1 and 6" }));

        let (status, body) = send(app, get("/api/question?level=hard")).await;
        assert_eq!(status, StatusCode::OK);
        let level = body["level"].as_u64().unwrap();
        assert!((1..=6).contains(&level));
    }

    #[tokio::test]
    async fn check_round_trip() {
        let (app, state) = app();
        let (_, question) = send(app.clone(), get("/api/question?level=4")).await;
        let id = question["id"].as_str().unwrap().to_string();
        let reference = state.get_exercise(&id).await.unwrap().code.clone();

        let (status, body) = send(app.clone(), post_json("/api/check", json!({ "id": id, "code": reference }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["correct"], true);
        assert_eq!(body["user_result"], body["expected"]);

        let (status, body) = send(app.clone(), post_json("/api/check", json!({ "id": id, "code": "[for in]" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["correct"], false);
        assert!(body["error"].as_str().unwrap().starts_with("SyntaxError"));

        let (_, health) = send(app, get("/api/health")).await;
        assert_eq!(health, json!({ "ok": true, "exercises": 1 }));
    }

    #[tokio::test]
    async fn unknown_question_is_rejected() {
        let (app, _) = app();
        let (status, body) = send(app.clone(), post_json("/api/check", json!({ "id": "nope", "code": "1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "correct": false, "error": "Question not found" }));

        let (status, body) = send(app, post_json("/api/check", json!({ "code": "1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Question not found");
    }
}
