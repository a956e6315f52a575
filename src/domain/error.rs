//! Application error types with proper error chaining.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single field-level validation failure reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Typed failure of an outbound API request.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool },
    #[error("Server error ({status}): {message}")]
    Server {
        status: u16,
        request_id: Option<String>,
        message: String,
        payload: Option<Value>,
    },
    #[error("Authentication failed ({status}): {message}")]
    Authentication {
        status: u16,
        request_id: Option<String>,
        message: String,
    },
    #[error("Validation failed: {message}")]
    Validation {
        request_id: Option<String>,
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("Request failed ({status}): {message}")]
    Client {
        status: u16,
        request_id: Option<String>,
        message: String,
        payload: Option<Value>,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        ApiError::Network {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Whether the request may succeed if attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network { .. } | ApiError::Server { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Network { timed_out: true, .. })
    }

    /// HTTP status carried by the error, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. }
            | ApiError::Authentication { status, .. }
            | ApiError::Client { status, .. } => Some(*status),
            ApiError::Validation { .. } => Some(422),
            ApiError::Network { .. } | ApiError::InvalidRequest(_) | ApiError::Decode(_) => None,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiError::Server { request_id, .. }
            | ApiError::Authentication { request_id, .. }
            | ApiError::Validation { request_id, .. }
            | ApiError::Client { request_id, .. } => request_id.as_deref(),
            ApiError::Network { .. } | ApiError::InvalidRequest(_) | ApiError::Decode(_) => None,
        }
    }

    /// Classifies a non-2xx response into the matching variant.
    ///
    /// `payload` is the decoded response body, if it was JSON.
    pub fn from_status(status: u16, request_id: Option<String>, payload: Option<Value>) -> Self {
        let message = payload
            .as_ref()
            .and_then(payload_message)
            .unwrap_or_else(|| default_reason(status).to_string());

        match status {
            401 | 403 => ApiError::Authentication {
                status,
                request_id,
                message,
            },
            422 => ApiError::Validation {
                request_id,
                message,
                fields: payload.as_ref().map(parse_field_errors).unwrap_or_default(),
            },
            500..=599 => ApiError::Server {
                status,
                request_id,
                message,
                payload,
            },
            _ => ApiError::Client {
                status,
                request_id,
                message,
                payload,
            },
        }
    }
}

fn payload_message(payload: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| payload.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        409 => "Conflict",
        422 => "Unprocessable entity",
        429 => "Too many requests",
        500 => "Internal server error",
        502 => "Bad gateway",
        503 => "Service unavailable",
        504 => "Gateway timeout",
        _ => "Unexpected response status",
    }
}

/// Extracts field errors from either `{"errors": {"field": ["msg"]}}` or
/// `{"errors": [{"field": "...", "message": "..."}]}`.
fn parse_field_errors(payload: &Value) -> Vec<FieldError> {
    match payload.get("errors") {
        Some(Value::Object(map)) => map
            .iter()
            .flat_map(|(field, messages)| match messages {
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|m| FieldError::new(field.clone(), m))
                    .collect::<Vec<_>>(),
                Value::String(m) => vec![FieldError::new(field.clone(), m.clone())],
                _ => Vec::new(),
            })
            .collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|entry| {
                let field = entry.get("field").and_then(Value::as_str)?;
                let message = entry
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("invalid");
                Some(FieldError::new(field, message))
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Cache backend failed: {0}")]
    Backend(String),
    #[error("Cache serialization failed: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<&str> for ConfigError {
    fn from(s: &str) -> Self {
        ConfigError::ParseError(s.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Validation failed: {0}")]
    Multiple(String),
    #[error("Validation failed: {}", join_fields(.0))]
    Fields(Vec<FieldError>),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<&str> for ValidationError {
    fn from(s: &str) -> Self {
        ValidationError::InvalidFormat(s.to_string())
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = field.to_string();
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string);
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::Fields(fields)
    }
}

impl ValidationError {
    /// Field-level view used when reporting to callers.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldError> {
        match self {
            ValidationError::InvalidField { field, message } => {
                vec![FieldError::new(field.clone(), message.clone())]
            }
            ValidationError::MissingField(field) => {
                vec![FieldError::new(field.clone(), "required")]
            }
            ValidationError::Fields(fields) => fields.clone(),
            ValidationError::InvalidFormat(_) | ValidationError::Multiple(_) => Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::from(err))
    }
}
