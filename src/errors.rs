use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::stats::StatisticsError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request data
    #[error("{message}")]
    BadRequest { message: String },

    #[error("{resource} with ID {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// History cannot be turned into statistics
    #[error(transparent)]
    Statistics(#[from] StatisticsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Statistics(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            Error::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller; database details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Store(StoreError::Database(_)) => "Database error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Store(StoreError::Database(e)) => {
                if let Some(db_err) = e.as_database_error() {
                    tracing::error!("❌ DB error: {}", db_err.message());
                    if let Some(code) = db_err.code() {
                        tracing::info!("ℹ️ SQLSTATE code: {}", code);
                    }
                    if let Some(constraint) = db_err.constraint() {
                        tracing::info!("🔒 Constraint violated: {}", constraint);
                    }
                } else {
                    tracing::error!("❌ Unknown DB error: {}", e);
                }
            }
            Error::Statistics(e) => tracing::warn!("Cannot compute statistics: {}", e),
            Error::Store(StoreError::Conflict { .. }) => tracing::info!("Conflict: {}", self),
            Error::BadRequest { .. } | Error::NotFound { .. } => tracing::debug!("Client error: {}", self),
        }

        let body = Json(json!({ "message": self.user_message() }));
        (self.status_code(), body).into_response()
    }
}
