//! Domain layer containing core types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ApiError, AppError, CacheError, ConfigError, FieldError, ValidationError};
pub use traits::{
    AuditSink, CacheStore, RequestInterceptor, Resource, ResponseInterceptor, TokenProvider,
    Transport,
};
pub use types::{
    ApiResponse, AuditAction, AuditEntry, EntityId, ErrorCode, HealthResponse, HealthStatus,
    HttpMethod, HttpRequest, HttpResponse, ListParams, Page, Pagination, RequestConfig,
    ResponseMeta, ResponseSource, ServiceError, ServiceResponse,
};
