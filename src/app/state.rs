//! Shared client state.
//!
//! This module wires the HTTP client with the optional cache and audit
//! backends and hands out typed services.

use std::sync::Arc;

use tracing::{instrument, warn};

use super::http_client::HttpClient;
use super::resources::{Order, Product, Review, Translation};
use super::service::BaseService;
use crate::domain::{AuditSink, CacheStore, HealthResponse, HealthStatus, Resource};

/// Process-wide client state, created once at startup.
///
/// # Thread Safety
///
/// All contained types are wrapped in `Arc` and implement `Send + Sync`,
/// making `AppState` safe to share across async tasks.
///
/// # Example
///
/// ```ignore
/// let transport = Arc::new(ReqwestTransport::with_defaults()?);
/// let client = Arc::new(HttpClient::new(transport, ClientConfig::from_env()?));
/// let state = AppState::new(client).with_cache(Arc::new(InMemoryCache::new()));
///
/// let product = state.products().get("65a1").await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The HTTP client shared by every service.
    pub client: Arc<HttpClient>,

    /// Cache backend for read-through lookups.
    pub cache: Option<Arc<dyn CacheStore>>,

    /// Audit backend for mutations.
    pub audit: Option<Arc<dyn AuditSink>>,
}

impl AppState {
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            cache: None,
            audit: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches an audit sink. Ignored unless auditing is enabled in the client config.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        if self.client.config().audit {
            self.audit = Some(audit);
        }
        self
    }

    /// Builds a service for any resource, wired to the shared backends.
    #[must_use]
    pub fn service<R: Resource>(&self) -> BaseService<R> {
        let mut service =
            BaseService::new(Arc::clone(&self.client)).with_cache_ttl(self.client.config().cache_ttl);
        if let Some(ref cache) = self.cache {
            service = service.with_cache(Arc::clone(cache));
        }
        if let Some(ref audit) = self.audit {
            service = service.with_audit(Arc::clone(audit));
        }
        service
    }

    #[must_use]
    pub fn products(&self) -> BaseService<Product> {
        self.service()
    }

    #[must_use]
    pub fn orders(&self) -> BaseService<Order> {
        self.service()
    }

    #[must_use]
    pub fn reviews(&self) -> BaseService<Review> {
        self.service()
    }

    #[must_use]
    pub fn translations(&self) -> BaseService<Translation> {
        self.service()
    }

    /// Performs a health check on the backend and the cache.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let backend = match self.client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = %e, "Backend health check failed");
                HealthStatus::Unhealthy
            }
        };

        let cache = match self.cache {
            Some(ref cache) => match cache.health_check().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => {
                    warn!(error = %e, "Cache health check failed");
                    HealthStatus::Unhealthy
                }
            },
            None => HealthStatus::Healthy,
        };

        HealthResponse::new(backend, cache)
    }
}
