use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum NotifyError {
    #[error("No recipient specified")]
    NoRecipient,

    #[error("Missing template key")]
    MissingTemplateKey,

    #[error("Unknown template key: {key}")]
    TemplateNotFound { key: String },

    #[error("Email transport error: {message}")]
    Transport { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl NotifyError {
    pub fn template_not_found(key: impl Into<String>) -> Self {
        Self::TemplateNotFound { key: key.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoRecipient => "NO_RECIPIENT",
            Self::MissingTemplateKey => "MISSING_TEMPLATE_KEY",
            Self::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NoRecipient => 400,
            Self::MissingTemplateKey => 400,
            Self::TemplateNotFound { .. } => 422,
            Self::Transport { .. } => 502,
            Self::Database { .. } => 500,
            Self::Validation { .. } => 400,
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
            Self::Conflict { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&NotifyError> for ErrorResponse {
    fn from(error: &NotifyError) -> Self {
        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
        }
    }
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from(&self);
        (status, Json(body)).into_response()
    }
}

// Conversion from common error types
impl From<sqlx::Error> for NotifyError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}

impl From<redis::RedisError> for NotifyError {
    fn from(error: redis::RedisError) -> Self {
        Self::database(error.to_string())
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}
