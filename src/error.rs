// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every failure crossing the handler boundary is one of these variants;
/// raw storage/database errors are classified (and logged) before they get
/// here, never exposed to clients.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request - missing/malformed field, offending field named
    Validation {
        message: String,
        field: Option<String>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found - includes ids that exist under a different tenant
    NotFound(String),

    // 409 Conflict - uniqueness violation, conflicting field set named
    Conflict {
        message: String,
        fields: Vec<String>,
    },

    // 502 Bad Gateway - object store put/delete failure
    Storage(String),

    // 500 Internal Server Error - document store failure, masked
    Upstream(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Storage(_) => StatusCode::BAD_GATEWAY,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict { message, .. } => message,
            ApiError::Storage(msg) => msg,
            ApiError::Upstream(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        });

        match self {
            ApiError::Validation { field: Some(field), .. } => {
                body["field"] = json!(field);
            }
            ApiError::Conflict { fields, .. } if !fields.is_empty() => {
                body["fields"] = json!(fields);
            }
            _ => {}
        }

        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation { message: message.into(), field: None }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        ApiError::Validation { message: message.into(), field: Some(field.into()) }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>, fields: Vec<String>) -> Self {
        ApiError::Conflict { message: message.into(), fields }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        ApiError::Storage(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ApiError::Upstream(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert lower-layer error types to ApiError
impl From<crate::database::record::RecordError> for ApiError {
    fn from(err: crate::database::record::RecordError) -> Self {
        use crate::database::record::RecordError;
        match &err {
            RecordError::SystemFieldNotAllowed(field)
            | RecordError::MissingRequiredField(field) => {
                ApiError::validation_field(err.to_string(), field.to_string())
            }
            RecordError::InvalidEnumValue { field, .. }
            | RecordError::InvalidDate { field, .. } => {
                ApiError::validation_field(err.to_string(), field.clone())
            }
            RecordError::InvalidJson(_) => ApiError::validation(err.to_string()),
        }
    }
}

impl From<crate::database::repository::RepositoryError> for ApiError {
    fn from(err: crate::database::repository::RepositoryError) -> Self {
        use crate::database::repository::RepositoryError;
        match err {
            RepositoryError::Record(e) => e.into(),
            RepositoryError::NotFound { resource } => {
                ApiError::not_found(format!("{} not found", resource))
            }
            RepositoryError::UniqueViolation { resource, fields } => ApiError::conflict(
                format!("{} already exists for ({})", resource, fields.join(", ")),
                fields,
            ),
            RepositoryError::Query(msg) => {
                tracing::error!("repository query error: {}", msg);
                ApiError::upstream("An error occurred while processing your request")
            }
            RepositoryError::Sqlx(e) => {
                // Log the real error but return a generic message
                tracing::error!("sqlx error: {}", e);
                ApiError::upstream("Database error occurred")
            }
        }
    }
}

impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        match err {
            crate::database::manager::DatabaseError::ConfigMissing(_) => {
                tracing::error!("database configuration missing: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            other => {
                tracing::error!("database manager error: {}", other);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
        }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        tracing::error!("object store error: {}", err);
        ApiError::storage("File storage operation failed")
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
