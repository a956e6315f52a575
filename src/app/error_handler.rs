//! Converts any service-layer failure into a [`ServiceError`].

use tracing::{error, warn};

use crate::domain::{ApiError, AppError, ErrorCode, ServiceError};

/// Normalizes `err` and logs it at a level matching its severity.
pub fn handle_error(err: &AppError, operation: &str) -> ServiceError {
    let service_error = to_service_error(err);
    match service_error.code {
        ErrorCode::Server | ErrorCode::Internal | ErrorCode::Config => {
            error!(operation = operation, code = ?service_error.code, error = %err, "Service operation failed");
        }
        _ => {
            warn!(operation = operation, code = ?service_error.code, error = %err, "Service operation failed");
        }
    }
    service_error
}

fn to_service_error(err: &AppError) -> ServiceError {
    let mut service_error = ServiceError {
        code: ErrorCode::Internal,
        message: err.to_string(),
        status: None,
        request_id: None,
        retryable: false,
        fields: Vec::new(),
    };

    match err {
        AppError::Api(api) => {
            service_error.code = match api {
                ApiError::Network { timed_out: true, .. } => ErrorCode::Timeout,
                ApiError::Network { .. } => ErrorCode::Network,
                ApiError::Server { .. } => ErrorCode::Server,
                ApiError::Authentication { .. } => ErrorCode::Authentication,
                ApiError::Validation { fields, .. } => {
                    service_error.fields = fields.clone();
                    ErrorCode::Validation
                }
                ApiError::Client { .. } | ApiError::InvalidRequest(_) => ErrorCode::Client,
                ApiError::Decode(_) => ErrorCode::Decode,
            };
            service_error.status = api.status();
            service_error.request_id = api.request_id().map(str::to_string);
            service_error.retryable = api.is_retryable();
        }
        AppError::Validation(validation) => {
            service_error.code = ErrorCode::Validation;
            service_error.fields = validation.fields();
        }
        AppError::Cache(_) => service_error.code = ErrorCode::Cache,
        AppError::Config(_) => service_error.code = ErrorCode::Config,
        AppError::Serialization(_) => service_error.code = ErrorCode::Serialization,
        AppError::NotSupported(_) => service_error.code = ErrorCode::NotSupported,
        AppError::Internal(_) => {}
    }

    service_error
}
