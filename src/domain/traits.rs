//! Domain traits defining contracts for external systems.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiError, AppError, ValidationError};
use super::types::{AuditEntry, HttpRequest, HttpResponse, RequestConfig};

/// Sends a single HTTP request. Retries and timeouts are applied by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Key/value cache with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check cache backend connectivity
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Get a live entry, `None` if missing or expired
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;

    /// Store an entry that expires after `ttl`
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), AppError>;

    /// Remove a single entry, returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Remove every entry whose key starts with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError>;
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError>;
}

/// Source of the bearer token attached to outbound requests.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<SecretString>;
}

/// Transforms a request before it reaches the transport.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn on_request(
        &self,
        request: HttpRequest,
        config: &RequestConfig,
    ) -> Result<HttpRequest, ApiError>;
}

/// Transforms a response before it is classified.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_response(
        &self,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<HttpResponse, ApiError>;
}

/// A remote REST resource served by a generic CRUD service.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Payload accepted by `create`
    type Create: Serialize + Send + Sync;
    /// Payload accepted by `update`
    type Update: Serialize + Send + Sync;

    /// Resource name, used as the cache namespace and audit resource
    const NAME: &'static str;

    /// Collection path relative to the API base, e.g. `/products`
    fn base_path() -> String {
        format!("/{}", Self::NAME)
    }

    /// Identifier of a fetched entity
    fn id(&self) -> &str;

    /// Hook run before `create` reaches the network
    fn validate_create(data: &Self::Create) -> Result<(), ValidationError> {
        let _ = data;
        Ok(())
    }

    /// Hook run before `update` reaches the network
    fn validate_update(id: &str, data: &Self::Update) -> Result<(), ValidationError> {
        let _ = (id, data);
        Ok(())
    }
}
