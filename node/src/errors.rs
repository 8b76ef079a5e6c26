// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bastion_kernel::error::KernelError;
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session not found")]
    SessionNotFound,
    #[error("session busy")]
    SessionBusy,
    #[error("session ended")]
    SessionEnded,
    #[error("start wave {requested} is beyond highest wave {highest}")]
    InvalidStartWave { requested: u32, highest: u32 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("kernel error: {0}")]
    Kernel(KernelError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable code placed in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SessionNotFound => "session_not_found",
            EngineError::SessionBusy => "session_busy",
            EngineError::SessionEnded => "session_ended",
            EngineError::InvalidStartWave { .. } => "invalid_start_wave",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Unauthorized => "unauthorized",
            EngineError::Storage(StorageError::Conflict { .. }) => "storage_conflict",
            EngineError::Storage(_) => "storage_unavailable",
            EngineError::Persistence(_)
            | EngineError::Config(_)
            | EngineError::Kernel(_)
            | EngineError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::SessionNotFound => StatusCode::NOT_FOUND,
            EngineError::SessionBusy | EngineError::SessionEnded => StatusCode::CONFLICT,
            EngineError::InvalidStartWave { .. } | EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::Storage(StorageError::Conflict { .. }) => StatusCode::CONFLICT,
            EngineError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Persistence(_)
            | EngineError::Config(_)
            | EngineError::Kernel(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.code()
        }));

        (status, body).into_response()
    }
}

impl From<KernelError> for EngineError {
    fn from(e: KernelError) -> Self {
        EngineError::Kernel(e)
    }
}
