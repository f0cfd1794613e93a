//! Custom error types for the accommodation service

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::compatibility::PropertyOption;

/// Errors raised by the accommodation workflow and its stores
#[derive(Error, Debug)]
pub enum AccommodationError {
    /// Input failed validation at the edge
    #[error("{0}")]
    Validation(String),

    /// Referenced request, property or user does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The guarded occupancy update found no free bed
    #[error("Property {property_id} has no free beds left")]
    CapacityExceeded { property_id: i64 },

    /// The operation is not allowed from the entity's current state
    #[error("{0}")]
    InvalidState(String),

    /// The operation collides with existing data
    #[error("{0}")]
    Conflict(String),

    /// A portal setting currently disables the operation
    #[error("{0} is currently closed")]
    Closed(&'static str),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl AccommodationError {
    /// Build a NotFound error for the given entity and identifier
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AccommodationError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AccommodationError::Validation(_) => "validation_error",
            AccommodationError::NotFound { .. } => "not_found",
            AccommodationError::CapacityExceeded { .. } => "capacity_exceeded",
            AccommodationError::InvalidState(_) => "invalid_state",
            AccommodationError::Conflict(_) => "conflict",
            AccommodationError::Closed(_) => "closed",
            AccommodationError::Database(_) => "database_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AccommodationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AccommodationError::NotFound { .. } => StatusCode::NOT_FOUND,
            AccommodationError::CapacityExceeded { .. }
            | AccommodationError::InvalidState(_)
            | AccommodationError::Conflict(_) => StatusCode::CONFLICT,
            AccommodationError::Closed(_) => StatusCode::FORBIDDEN,
            AccommodationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AccommodationError {
    fn from(err: sqlx::Error) -> Self {
        AccommodationError::Database(DatabaseError::Query(err))
    }
}

/// Type alias for accommodation workflow results
pub type AccommodationResult<T> = Result<T, AccommodationError>;

/// Custom error type for the API layer
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated caller lacks the required role
    #[error("Forbidden")]
    Forbidden,

    /// Request body could not be read as the expected JSON
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Assignment lost the race for the last bed; carries the refreshed options
    #[error("Property {property_id} has no free beds left")]
    CapacityExceeded {
        property_id: i64,
        options: Vec<PropertyOption>,
    },

    /// Accommodation workflow error
    #[error(transparent)]
    Accommodation(#[from] AccommodationError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized", "code": "unauthorized" }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "error": "Forbidden", "code": "forbidden" }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "code": "bad_request" }),
            ),
            ApiError::CapacityExceeded {
                property_id,
                options,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "error": format!("Property {} has no free beds left", property_id),
                    "code": "capacity_exceeded",
                    "property_id": property_id,
                    "options": options,
                }),
            ),
            ApiError::Accommodation(AccommodationError::Database(e)) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error", "code": "database_error" }),
                )
            }
            ApiError::Accommodation(e) => (
                e.status(),
                json!({ "error": e.to_string(), "code": e.code() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
