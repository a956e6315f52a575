use std::env;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::{info, warn};

use storefront_client::app::{
    AppState, AuthInterceptor, ClientConfig, HttpClient, RequestIdInterceptor,
    ResponseLogInterceptor,
};
use storefront_client::domain::ListParams;
use storefront_client::infra::observability::{init_metrics_handle, init_tracing};
use storefront_client::infra::{
    InMemoryCache, InMemoryTokenStore, ReqwestTransport, TracingAuditSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let json_logs = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    init_tracing(json_logs);

    let metrics = init_metrics_handle();

    let config = ClientConfig::from_env()?;
    info!(
        base_url = %config.base_url,
        timeout_ms = config.timeout.as_millis() as u64,
        retries = config.retries,
        "Client configured"
    );

    let tokens = Arc::new(match env::var("API_TOKEN") {
        Ok(token) if !token.is_empty() => InMemoryTokenStore::with_token(token),
        _ => InMemoryTokenStore::new(),
    });

    let transport = Arc::new(ReqwestTransport::with_defaults()?);
    let client = Arc::new(
        HttpClient::new(transport, config)
            .with_request_interceptor(Arc::new(RequestIdInterceptor))
            .with_request_interceptor(Arc::new(AuthInterceptor::new(tokens)))
            .with_response_interceptor(Arc::new(ResponseLogInterceptor)),
    );

    let state = AppState::new(client)
        .with_cache(Arc::new(InMemoryCache::new()))
        .with_audit(Arc::new(TracingAuditSink));

    let health = state.health_check().await;
    info!(status = ?health.status, backend = ?health.backend, cache = ?health.cache, "Health check");

    let products = state.products().list(&ListParams::default().page(1, 10)).await;
    match products.into_result() {
        Ok(Some(page)) => info!(
            count = page.items.len(),
            total = page.pagination.as_ref().map_or(0, |p| p.total),
            "Fetched products"
        ),
        Ok(None) => info!("No products returned"),
        Err(e) => warn!(code = ?e.code, message = %e.message, "Product listing failed"),
    }

    if let Some(handle) = metrics {
        info!(metrics = %handle.render(), "Metrics snapshot");
    }

    Ok(())
}
