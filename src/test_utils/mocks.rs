//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to fail or respond slowly.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::{
    ApiError, AppError, AuditEntry, AuditSink, CacheError, CacheStore, HttpRequest, HttpResponse,
    Transport,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(ms) = self.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn message(&self, fallback: &str) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Scripted transport for testing.
///
/// Responses are served in the order they were queued. Every request is
/// recorded together with the instant it arrived.
///
/// # Example
///
/// ```ignore
/// use storefront_client::domain::HttpResponse;
/// use storefront_client::test_utils::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.push_response(HttpResponse::new(500));
/// transport.push_response(HttpResponse::new(200));
/// ```
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    call_times: Mutex<Vec<Instant>>,
    call_count: AtomicU64,
    latency: Option<Duration>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response, e.g. to trigger client timeouts.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: ApiError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Gets the number of requests received.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Gets all received requests, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Gets the arrival instant of every request.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.call_times.lock().unwrap().push(Instant::now());
        self.requests.lock().unwrap().push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(ApiError::network(format!(
                "No mock response queued for {} {}",
                request.method, request.url
            )))
        })
    }
}

/// Mock cache store for testing.
///
/// Stores values without expiry and supports configurable failure modes.
pub struct MockCacheStore {
    storage: Mutex<HashMap<String, Value>>,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockCacheStore {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
            config,
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Gets all stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.storage.lock().unwrap().keys().cloned().collect()
    }

    async fn check_should_fail(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        if self.config.should_fail {
            return Err(AppError::Cache(CacheError::Backend(
                self.config.message("Mock cache error"),
            )));
        }
        Ok(())
    }
}

impl Default for MockCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MockCacheStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.check_should_fail().await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        self.check_should_fail().await?;
        Ok(self.storage.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value, _ttl: Duration) -> Result<(), AppError> {
        self.check_should_fail().await?;
        self.storage.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        self.check_should_fail().await?;
        Ok(self.storage.lock().unwrap().remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        self.check_should_fail().await?;
        let mut storage = self.storage.lock().unwrap();
        let before = storage.len();
        storage.retain(|key, _| !key.starts_with(prefix));
        Ok(before - storage.len())
    }
}

/// Mock audit sink that records every entry.
pub struct MockAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    config: MockConfig,
}

impl MockAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl Default for MockAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MockAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        self.config.simulate_latency().await;
        if self.config.should_fail {
            return Err(AppError::Internal(self.config.message("Mock audit error")));
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}
