use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum WashpointError {
    #[error("Record store error: {message}")]
    Store { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Transition '{action}' is not allowed from state '{state}'")]
    InvalidTransition { action: String, state: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WashpointError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_transition(action: impl Into<String>, state: impl Into<String>) -> Self {
        Self::InvalidTransition {
            action: action.into(),
            state: state.into(),
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
            Self::Store { .. } => "STORE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Store { .. } => 500,
            Self::Validation { .. } => 400,
            Self::InvalidTransition { .. } => 422,
            Self::Conflict { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }
}

pub type WashpointResult<T> = Result<T, WashpointError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<WashpointError> for ErrorResponse {
    fn from(error: WashpointError) -> Self {
        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
        }
    }
}

// Conversion from common error types
impl From<sqlx::Error> for WashpointError {
    fn from(error: sqlx::Error) -> Self {
        Self::store(error.to_string())
    }
}

impl From<serde_json::Error> for WashpointError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<validator::ValidationErrors> for WashpointError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

impl From<config::ConfigError> for WashpointError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}
