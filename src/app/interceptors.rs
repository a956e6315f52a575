//! Built-in request and response interceptors.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    ApiError, HttpRequest, HttpResponse, RequestConfig, RequestInterceptor, ResponseInterceptor,
    TokenProvider,
};

/// Attaches `Authorization: Bearer <token>` when a token is available.
///
/// Requests marked `require_auth` fail without reaching the network when
/// no token is present.
pub struct AuthInterceptor {
    tokens: Arc<dyn TokenProvider>,
}

impl AuthInterceptor {
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl RequestInterceptor for AuthInterceptor {
    async fn on_request(
        &self,
        mut request: HttpRequest,
        config: &RequestConfig,
    ) -> Result<HttpRequest, ApiError> {
        match self.tokens.token() {
            Some(token) => {
                request.set_header(
                    "authorization",
                    format!("Bearer {}", token.expose_secret()),
                );
            }
            None if config.require_auth => {
                return Err(ApiError::Authentication {
                    status: 401,
                    request_id: None,
                    message: "No access token available".to_string(),
                });
            }
            None => {}
        }
        Ok(request)
    }
}

/// Tags each request with an `x-request-id` unless the caller set one.
#[derive(Debug, Default)]
pub struct RequestIdInterceptor;

#[async_trait]
impl RequestInterceptor for RequestIdInterceptor {
    async fn on_request(
        &self,
        mut request: HttpRequest,
        _config: &RequestConfig,
    ) -> Result<HttpRequest, ApiError> {
        if request.header("x-request-id").is_none() {
            request.set_header("x-request-id", Uuid::new_v4().to_string());
        }
        Ok(request)
    }
}

/// Debug-level log line for every received response.
#[derive(Debug, Default)]
pub struct ResponseLogInterceptor;

#[async_trait]
impl ResponseInterceptor for ResponseLogInterceptor {
    async fn on_response(
        &self,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<HttpResponse, ApiError> {
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            request_id = request.header("x-request-id").unwrap_or("-"),
            bytes = response.body.len(),
            "Received response"
        );
        Ok(response)
    }
}
