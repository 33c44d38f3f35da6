use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// One violated constraint on one field of an incoming payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationIssue {
    pub field: String,
    pub constraint: String,
    pub value: JsonValue,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, constraint: impl Into<String>, value: JsonValue) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            value,
        }
    }
}

/// Failure modes of the chat service, from client-caused validation errors
/// up to the inference server being unreachable.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input violated one or more field constraints.
    #[error("validation failed: {0:?}")]
    Validation(Vec<ValidationIssue>),

    /// The inference server could not be reached, timed out, or answered
    /// with a non-success status.
    #[error("llm transport error: {0}")]
    Transport(String),

    /// The inference server answered, but the body was not decodable as the
    /// expected shape.
    #[error("invalid response format from llm: {0}")]
    Format(String),

    /// Pre-flight health check failed before any work was attempted.
    #[error("llm service is not available")]
    Unavailable,
}

impl ServiceError {
    /// Category tag clients can branch on, as carried in `ErrorResponse`.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Transport(_) | ServiceError::Format(_) => "internal_error",
            ServiceError::Unavailable => "service_unavailable",
        }
    }

    pub fn single_issue(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: JsonValue,
    ) -> Self {
        ServiceError::Validation(vec![ValidationIssue::new(field, constraint, value)])
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Format(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}
