// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use headers::authorization::Bearer;
use headers::Authorization;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::*;
use crate::engine::Engine;
use crate::errors::EngineError;

pub type SharedEngine = Arc<Engine>;

type Auth = Option<TypedHeader<Authorization<Bearer>>>;

pub fn build_router(state: SharedEngine) -> Router {
    Router::new()
        .route("/session/start", post(session_start))
        .route("/session/segment", post(session_segment))
        .route("/session/end", post(session_end))
        // Observability
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The gateway forwards the authenticated user id as the bearer token.
fn user_id(auth: Auth) -> Result<String, EngineError> {
    let TypedHeader(Authorization(bearer)) = auth.ok_or(EngineError::Unauthorized)?;
    let id = bearer.token().trim();
    if id.is_empty() {
        return Err(EngineError::Unauthorized);
    }
    Ok(id.to_string())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, EngineError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| EngineError::InvalidInput(e.body_text()))
}

async fn session_start(
    State(state): State<SharedEngine>,
    auth: Auth,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<StartSessionResponse>, EngineError> {
    let user = user_id(auth)?;
    let req = body(payload)?;
    Ok(Json(state.start_session(&user, req).await?))
}

async fn session_segment(
    State(state): State<SharedEngine>,
    auth: Auth,
    payload: Result<Json<SegmentRequest>, JsonRejection>,
) -> Result<Json<SegmentResponse>, EngineError> {
    let user = user_id(auth)?;
    let req = body(payload)?;
    Ok(Json(state.submit_segment(&user, req).await?))
}

async fn session_end(
    State(state): State<SharedEngine>,
    auth: Auth,
    payload: Result<Json<EndSessionRequest>, JsonRejection>,
) -> Result<Json<EndSessionResponse>, EngineError> {
    let user = user_id(auth)?;
    let req = body(payload)?;
    Ok(Json(state.end_session(&user, req).await?))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
