//! Outbound HTTP client with interceptors, timeouts, retry and error translation.
//!
//! Every call goes through the same lifecycle:
//!
//! ```text
//! build URL → request interceptors → [attempt → timeout → response interceptors
//!           → classify] → retry with backoff while retryable → decode envelope
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::config::ClientConfig;
use crate::domain::{
    ApiError, ApiResponse, HttpMethod, HttpRequest, HttpResponse, RequestConfig,
    RequestInterceptor, ResponseInterceptor, Transport,
};

/// Delay before the retry that follows failed attempt `attempt` (0-based).
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// HTTP client shared by all services.
///
/// Created once at startup and passed to services as an explicit dependency.
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl HttpClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    /// Appends a request interceptor. Interceptors run in insertion order.
    #[must_use]
    pub fn with_request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Appends a response interceptor. Interceptors run in insertion order.
    #[must_use]
    pub fn with_response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Joins base URL, API version and path, then appends query parameters.
    ///
    /// Absolute `http(s)://` paths are used as-is.
    pub fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<String, ApiError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            let mut raw = self.config.base_url.trim_end_matches('/').to_string();
            if let Some(ref version) = self.config.api_version {
                raw.push('/');
                raw.push_str(version.trim_matches('/'));
            }
            if !path.starts_with('/') {
                raw.push('/');
            }
            raw.push_str(path);
            raw
        };

        let mut url = url::Url::parse(&raw)
            .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", raw, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    /// Issues a request and decodes the response envelope.
    ///
    /// # Errors
    ///
    /// Returns the typed [`ApiError`] for transport failures, timeouts and
    /// non-2xx responses. With `skip_error_handling`, non-2xx responses are
    /// returned as an unsuccessful [`ApiResponse`] instead.
    #[instrument(skip(self, config), fields(method = %config.method))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        let started = Instant::now();
        let method = config.method;
        let retries = config.retries.unwrap_or(self.config.retries);
        let retry_delay = config.retry_delay.unwrap_or(self.config.retry_delay);

        let mut request = self.prepare(path, &config)?;
        for interceptor in &self.request_interceptors {
            request = interceptor.on_request(request, &config).await?;
        }
        if config.require_auth && request.header("authorization").is_none() {
            return Err(ApiError::Authentication {
                status: 401,
                request_id: request.header("x-request-id").map(str::to_string),
                message: "No access token available".to_string(),
            });
        }

        let mut attempt = 0u32;
        let outcome = loop {
            metrics::counter!("http_client_attempts_total", "method" => method.as_str())
                .increment(1);
            match self.attempt(&request).await {
                Ok(response) => break Ok(response),
                Err(err) if err.is_retryable() && attempt < retries => {
                    let delay = backoff_delay(retry_delay, attempt);
                    warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        url = %request.url,
                        error = %err,
                        "Request failed, retrying"
                    );
                    metrics::counter!("http_client_retries_total", "method" => method.as_str())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => break Err(err),
            }
        };

        metrics::histogram!("http_client_request_duration_seconds", "method" => method.as_str())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(response) => {
                metrics::counter!("http_client_requests_total", "outcome" => "success")
                    .increment(1);
                decode_envelope(&response)
            }
            Err(err) => {
                metrics::counter!("http_client_requests_total", "outcome" => "error").increment(1);
                if config.skip_error_handling && err.status().is_some() {
                    debug!(error = %err, "Returning error response unhandled");
                    return Ok(ApiResponse::failure(&err));
                }
                Err(err)
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(path, RequestConfig { method: HttpMethod::Get, ..config })
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        let config = with_json_body(RequestConfig { method: HttpMethod::Post, ..config }, body)?;
        self.request(path, config).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        let config = with_json_body(RequestConfig { method: HttpMethod::Put, ..config }, body)?;
        self.request(path, config).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        let config = with_json_body(RequestConfig { method: HttpMethod::Patch, ..config }, body)?;
        self.request(path, config).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(path, RequestConfig { method: HttpMethod::Delete, ..config })
            .await
    }

    /// Check backend connectivity via `GET /health`
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ApiError> {
        let _: ApiResponse<Value> = self.get("/health", RequestConfig::default()).await?;
        Ok(())
    }

    fn prepare(&self, path: &str, config: &RequestConfig) -> Result<HttpRequest, ApiError> {
        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.extend(config.headers.clone());

        Ok(HttpRequest {
            method: config.method,
            url: self.build_url(path, &config.query)?,
            headers,
            body: config.body.clone(),
            timeout: config.timeout.unwrap_or(self.config.timeout),
        })
    }

    /// A single bounded attempt. Non-2xx responses come back as `Err`.
    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let sent = tokio::time::timeout(request.timeout, self.transport.send(request.clone())).await;
        let mut response = match sent {
            Ok(result) => result?,
            Err(_) => {
                return Err(ApiError::timeout(format!(
                    "{} {} timed out after {}ms",
                    request.method,
                    request.url,
                    request.timeout.as_millis()
                )));
            }
        };

        for interceptor in &self.response_interceptors {
            response = interceptor.on_response(request, response).await?;
        }

        if response.is_success() {
            return Ok(response);
        }

        let request_id = response
            .header("x-request-id")
            .or_else(|| request.header("x-request-id"))
            .map(str::to_string);
        Err(ApiError::from_status(
            response.status,
            request_id,
            error_payload(&response),
        ))
    }
}

fn with_json_body<B: Serialize + ?Sized>(
    config: RequestConfig,
    body: &B,
) -> Result<RequestConfig, ApiError> {
    let body = serde_json::to_value(body)
        .map_err(|e| ApiError::InvalidRequest(format!("request body: {}", e)))?;
    Ok(config.with_body(body))
}

/// JSON body of an error response; plain text is wrapped as `{"message": ...}`.
fn error_payload(response: &HttpResponse) -> Option<Value> {
    match response.json_body() {
        Ok(payload) => payload,
        Err(_) => {
            let text = String::from_utf8_lossy(&response.body).trim().to_string();
            (!text.is_empty()).then(|| serde_json::json!({ "message": text }))
        }
    }
}

/// Accepts both `{success, data, ...}` envelopes and bare JSON payloads.
fn decode_envelope<T: DeserializeOwned>(response: &HttpResponse) -> Result<ApiResponse<T>, ApiError> {
    let body = response
        .json_body()
        .map_err(|e| ApiError::Decode(e.to_string()))?;

    match body {
        None => Ok(ApiResponse::ok(None)),
        Some(body) if body.get("success").is_some_and(Value::is_boolean) => {
            serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
        }
        Some(body) => serde_json::from_value(body)
            .map(|data| ApiResponse::ok(Some(data)))
            .map_err(|e| ApiError::Decode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;
    use serde_json::json;

    fn client(transport: Arc<MockTransport>) -> HttpClient {
        let mut config = ClientConfig::new("https://api.shop.test");
        config.retry_delay = Duration::from_millis(10);
        HttpClient::new(transport, config)
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 40), base * u32::MAX);
    }

    #[test]
    fn test_build_url() {
        let transport = Arc::new(MockTransport::new());
        let mut config = ClientConfig::new("https://api.shop.test/");
        config.api_version = Some("v1".to_string());
        let client = HttpClient::new(transport, config);

        assert_eq!(
            client.build_url("/products/123", &[]).unwrap(),
            "https://api.shop.test/v1/products/123"
        );
        assert_eq!(
            client
                .build_url(
                    "products",
                    &[("q".to_string(), "red shoes".to_string())]
                )
                .unwrap(),
            "https://api.shop.test/v1/products?q=red+shoes"
        );
        assert_eq!(
            client.build_url("https://cdn.test/x", &[]).unwrap(),
            "https://cdn.test/x"
        );
    }

    #[tokio::test]
    async fn test_get_decodes_bare_payload() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &json!({"id": "p1", "name": "Shoe"})));
        let client = client(Arc::clone(&transport));

        let response: ApiResponse<Value> = client
            .get("/products/p1", RequestConfig::default())
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.data.unwrap()["name"], "Shoe");
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].url, "https://api.shop.test/products/p1");
        assert_eq!(sent[0].header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_get_decodes_envelope() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(
            200,
            &json!({
                "success": true,
                "data": [{"id": "p1"}],
                "message": "ok",
                "pagination": {"page": 1, "limit": 10, "total": 1, "totalPages": 1}
            }),
        ));
        let client = client(transport);

        let response: ApiResponse<Vec<Value>> =
            client.get("/products", RequestConfig::default()).await.unwrap();
        assert_eq!(response.data.unwrap().len(), 1);
        assert_eq!(response.message.as_deref(), Some("ok"));
        assert_eq!(response.pagination.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(201, &json!({"id": "p2"})));
        let client = client(Arc::clone(&transport));

        let _: ApiResponse<Value> = client
            .post("/products", &json!({"name": "X"}), RequestConfig::default())
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].body, Some(json!({"name": "X"})));
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_require_auth_without_token_skips_network() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &json!({})));
        let client = client(Arc::clone(&transport));

        let result: Result<ApiResponse<Value>, _> = client
            .get("/me", RequestConfig::default().require_auth())
            .await;

        assert!(matches!(
            result,
            Err(ApiError::Authentication { status: 401, .. })
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_require_auth_accepts_caller_supplied_header() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &json!({})));
        let client = client(Arc::clone(&transport));

        let _: ApiResponse<Value> = client
            .get(
                "/me",
                RequestConfig::default()
                    .with_header("Authorization", "Bearer abc")
                    .require_auth(),
            )
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].header("authorization"), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_default_headers_without_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &json!([])));
        let client = client(Arc::clone(&transport));

        let _: ApiResponse<Value> = client.get("/products", RequestConfig::default()).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.header("accept"), Some("application/json"));
        assert_eq!(sent.header("content-type"), Some("application/json"));
        assert!(sent.body.is_none());
    }

    #[tokio::test]
    async fn test_empty_body_yields_no_data() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(204));
        let client = client(transport);

        let response: ApiResponse<Value> = client
            .delete("/products/p1", RequestConfig::default())
            .await
            .unwrap();
        assert!(response.success);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_server_error_retried_with_backoff() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..5 {
            transport.push_response(HttpResponse::json(500, &json!({"message": "down"})));
        }
        let client = client(Arc::clone(&transport));

        let result: Result<ApiResponse<Value>, _> = client
            .get("/products", RequestConfig::default().with_retries(2))
            .await;

        assert!(matches!(result, Err(ApiError::Server { status: 500, .. })));
        assert_eq!(transport.call_count(), 3);

        let times = transport.call_times();
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(10));
        assert!(second_gap >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(503, &json!({})));
        transport.push_response(HttpResponse::json(200, &json!({"ok": true})));
        let client = client(Arc::clone(&transport));

        let response: ApiResponse<Value> = client
            .get("/health", RequestConfig::default().with_retries(3))
            .await
            .unwrap();
        assert_eq!(response.data, Some(json!({"ok": true})));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_not_found_never_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(404, &json!({"message": "missing"})));
        let client = client(Arc::clone(&transport));

        let result: Result<ApiResponse<Value>, _> = client
            .get("/products/nope", RequestConfig::default().with_retries(5))
            .await;

        match result {
            Err(ApiError::Client { status, message, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "missing");
            }
            other => panic!("Expected client error, got {:?}", other),
        }
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_network_error_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(ApiError::network("connection reset"));
        transport.push_response(HttpResponse::json(200, &json!([])));
        let client = client(Arc::clone(&transport));

        let response: ApiResponse<Vec<Value>> = client
            .get("/products", RequestConfig::default().with_retries(1))
            .await
            .unwrap();
        assert_eq!(response.data, Some(vec![]));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_resolves_as_network_error() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(500)));
        transport.push_response(HttpResponse::json(200, &json!({})));
        let client = client(transport);

        let started = Instant::now();
        let result: Result<ApiResponse<Value>, _> = client
            .get(
                "/products/123",
                RequestConfig::default().with_timeout(Duration::from_millis(100)),
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_skip_error_handling_returns_failure_envelope() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(401, &json!({"message": "expired"})));
        let client = client(transport);

        let response: ApiResponse<Value> = client
            .get("/me", RequestConfig::default().skip_error_handling())
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("AuthenticationError"));
        assert!(response.message.unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn test_validation_error_carries_fields() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            HttpResponse::json(422, &json!({"errors": {"email": ["is invalid"]}}))
                .with_header("X-Request-Id", "req-42"),
        );
        let client = client(transport);

        let result: Result<ApiResponse<Value>, _> = client
            .post("/users", &json!({"email": "x"}), RequestConfig::default())
            .await;

        match result {
            Err(ApiError::Validation {
                request_id, fields, ..
            }) => {
                assert_eq!(request_id.as_deref(), Some("req-42"));
                assert_eq!(fields[0].field, "email");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_text_error_body() {
        let transport = Arc::new(MockTransport::new());
        let mut response = HttpResponse::new(502);
        response.body = b"Bad Gateway from proxy".to_vec();
        transport.push_response(response);
        let client = client(transport);

        let err = client
            .get::<Value>("/products", RequestConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Server error (502): Bad Gateway from proxy");
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &json!({"id": 1})));
        let client = client(transport);

        let err = client
            .get::<Vec<String>>("/products", RequestConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
