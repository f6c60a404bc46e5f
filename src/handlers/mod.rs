pub mod calendar;
pub mod chat;
pub mod health;

use std::any::Any;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(state.config.cors_origin.as_deref());

    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/calendar/:access_token", get(calendar::download_ics))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        tracing::warn!("CORS_ORIGIN not set, allowing all origins");
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(cors::Any),
        Err(_) => {
            tracing::error!(origin, "invalid CORS_ORIGIN, allowing all origins");
            CorsLayer::permissive()
        }
    }
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Server error" })),
    )
        .into_response()
}
