//! Generic CRUD service over a remote resource.
//!
//! Reads go through the optional cache (cache-aside), writes invalidate the
//! affected entries and optionally emit an audit entry. Every operation
//! returns a [`ServiceResponse`]; failures are carried in its `error` field.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error_handler::handle_error;
use super::http_client::HttpClient;
use crate::domain::{
    ApiError, ApiResponse, AppError, AuditAction, AuditEntry, AuditSink, CacheStore, ListParams, Page,
    RequestConfig, Resource, ResponseMeta, ResponseSource, ServiceResponse,
};

/// Cache TTL used when none is configured.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// CRUD service for resource `R`.
///
/// # Example
///
/// ```ignore
/// let client = Arc::new(HttpClient::new(transport, config));
/// let products: BaseService<Product> = BaseService::new(client)
///     .with_cache(Arc::new(InMemoryCache::new()));
///
/// let page = products.list(&ListParams::default().page(1, 20)).await;
/// ```
pub struct BaseService<R: Resource> {
    client: Arc<HttpClient>,
    cache: Option<Arc<dyn CacheStore>>,
    audit: Option<Arc<dyn AuditSink>>,
    cache_ttl: Duration,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> BaseService<R> {
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            cache: None,
            audit: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            _resource: PhantomData,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Fetches a single entity, serving from cache when possible.
    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn get(&self, id: &str) -> ServiceResponse<R> {
        let started = Instant::now();
        let key = get_key(R::NAME, id);

        if let Some(entity) = self.cache_lookup::<R>(&key).await {
            return ServiceResponse::success(
                Some(entity),
                ResponseMeta::new(started.elapsed(), ResponseSource::Cache),
            );
        }

        let result = self.fetch_one(id, &key).await;
        finish(result, started, "get")
    }

    /// Lists entities, serving from cache when the same params were seen.
    #[instrument(skip(self, params), fields(resource = R::NAME))]
    pub async fn list(&self, params: &ListParams) -> ServiceResponse<Page<R>> {
        let started = Instant::now();
        let key = match list_key(R::NAME, params) {
            Ok(key) => key,
            Err(e) => return finish(Err(e), started, "list"),
        };

        if let Some(page) = self.cache_lookup::<Page<R>>(&key).await {
            return ServiceResponse::success(
                Some(page),
                ResponseMeta::new(started.elapsed(), ResponseSource::Cache),
            );
        }

        let result = self.fetch_page(params, &key).await;
        finish(result, started, "list")
    }

    #[instrument(skip(self, data), fields(resource = R::NAME))]
    pub async fn create(&self, data: &R::Create) -> ServiceResponse<R> {
        let started = Instant::now();
        let result = self.do_create(data).await;
        finish(result, started, "create")
    }

    #[instrument(skip(self, data), fields(resource = R::NAME))]
    pub async fn update(&self, id: &str, data: &R::Update) -> ServiceResponse<R> {
        let started = Instant::now();
        let result = self.do_update(id, data).await;
        finish(result, started, "update")
    }

    /// Deletes an entity. `data` is `Some(true)` on success.
    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn delete(&self, id: &str) -> ServiceResponse<bool> {
        let started = Instant::now();
        let result = self.do_delete(id).await;
        finish(result, started, "delete")
    }

    /// Drops the cached entity and every cached list of this resource.
    pub async fn invalidate(&self, id: &str) {
        self.cache_delete(&get_key(R::NAME, id)).await;
        self.invalidate_lists().await;
    }

    /// Drops every cached entry of this resource.
    pub async fn invalidate_all(&self) {
        let Some(ref cache) = self.cache else {
            return;
        };
        if let Err(e) = cache.delete_prefix(&format!("{}:", R::NAME)).await {
            warn!(resource = R::NAME, error = %e, "Failed to invalidate resource cache");
        }
    }

    /// `base_path/<id>` with the id percent-encoded as one path segment.
    fn item_path(id: &str) -> Result<String, AppError> {
        if matches!(id, "" | "." | "..") {
            return Err(ApiError::InvalidRequest(format!("Invalid {} id: {:?}", R::NAME, id)).into());
        }

        let mut segment = Url::parse("http://segment.invalid/")
            .map_err(|e| AppError::Internal(format!("segment encoder: {}", e)))?;
        segment
            .path_segments_mut()
            .map_err(|()| AppError::Internal("segment encoder: cannot be a base".to_string()))?
            .pop_if_empty()
            .push(id);
        Ok(format!("{}{}", R::base_path().trim_end_matches('/'), segment.path()))
    }

    async fn fetch_one(&self, id: &str, key: &str) -> Result<Option<R>, AppError> {
        let response: ApiResponse<R> = self
            .client
            .get(&Self::item_path(id)?, RequestConfig::default())
            .await?;

        if let Some(ref entity) = response.data {
            self.cache_store(key, entity).await;
        }
        Ok(response.data)
    }

    async fn fetch_page(&self, params: &ListParams, key: &str) -> Result<Option<Page<R>>, AppError> {
        let response: ApiResponse<Vec<R>> = self
            .client
            .get(
                &R::base_path(),
                RequestConfig::default().with_query(params.to_query()),
            )
            .await?;

        let page = Page {
            items: response.data.unwrap_or_default(),
            pagination: response.pagination,
        };
        self.cache_store(key, &page).await;
        Ok(Some(page))
    }

    async fn do_create(&self, data: &R::Create) -> Result<Option<R>, AppError> {
        R::validate_create(data)?;

        let response: ApiResponse<R> = self
            .client
            .post(&R::base_path(), data, RequestConfig::default())
            .await?;
        let created = response.data;

        match created {
            Some(ref entity) => self.invalidate(entity.id()).await,
            None => self.invalidate_lists().await,
        }
        info!(
            resource = R::NAME,
            id = created.as_ref().map(|e| e.id()).unwrap_or("-"),
            "Created entity"
        );

        let mut entry = AuditEntry::new(AuditAction::Create, R::NAME).with_after(to_json(&created));
        if let Some(ref entity) = created {
            entry = entry.with_resource_id(entity.id());
        }
        self.emit_audit(entry).await;

        Ok(created)
    }

    async fn do_update(&self, id: &str, data: &R::Update) -> Result<Option<R>, AppError> {
        R::validate_update(id, data)?;

        let before = self.audit_before(id).await;
        let response: ApiResponse<R> = self
            .client
            .put(&Self::item_path(id)?, data, RequestConfig::default())
            .await?;

        self.invalidate(id).await;
        info!(resource = R::NAME, id = %id, "Updated entity");

        self.emit_audit(
            AuditEntry::new(AuditAction::Update, R::NAME)
                .with_resource_id(id)
                .with_before(before)
                .with_after(to_json(&response.data)),
        )
        .await;

        Ok(response.data)
    }

    async fn do_delete(&self, id: &str) -> Result<Option<bool>, AppError> {
        let before = self.audit_before(id).await;
        let _: ApiResponse<Value> = self
            .client
            .delete(&Self::item_path(id)?, RequestConfig::default())
            .await?;

        self.invalidate(id).await;
        info!(resource = R::NAME, id = %id, "Deleted entity");

        self.emit_audit(
            AuditEntry::new(AuditAction::Delete, R::NAME)
                .with_resource_id(id)
                .with_before(before),
        )
        .await;

        Ok(Some(true))
    }

    async fn invalidate_lists(&self) {
        let Some(ref cache) = self.cache else {
            return;
        };
        let prefix = list_prefix(R::NAME);
        match cache.delete_prefix(&prefix).await {
            Ok(count) => debug!(prefix = %prefix, count = count, "Invalidated cached lists"),
            Err(e) => warn!(prefix = %prefix, error = %e, "Failed to invalidate cached lists"),
        }
    }

    /// Cached snapshot of the entity, used as the audit "before" value.
    async fn audit_before(&self, id: &str) -> Option<Value> {
        self.audit.as_ref()?;
        self.cache_lookup::<Value>(&get_key(R::NAME, id)).await
    }

    async fn cache_lookup<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => {
                    metrics::counter!("service_cache_hits_total", "resource" => R::NAME)
                        .increment(1);
                    debug!(key = %key, "Cache hit");
                    Some(decoded)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                metrics::counter!("service_cache_misses_total", "resource" => R::NAME)
                    .increment(1);
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to network");
                None
            }
        }
    }

    async fn cache_store<V: Serialize>(&self, key: &str, value: &V) {
        let Some(ref cache) = self.cache else {
            return;
        };
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = cache.set(key, value, self.cache_ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    async fn cache_delete(&self, key: &str) {
        let Some(ref cache) = self.cache else {
            return;
        };
        if let Err(e) = cache.delete(key).await {
            warn!(key = %key, error = %e, "Cache delete failed");
        }
    }

    /// Audit failures are logged and never surface to the caller.
    async fn emit_audit(&self, entry: AuditEntry) {
        let Some(ref sink) = self.audit else {
            return;
        };
        let action = entry.action;
        if let Err(e) = sink.record(entry).await {
            warn!(resource = R::NAME, action = ?action, error = %e, "Audit log emission failed");
        }
    }
}

fn finish<T>(result: Result<Option<T>, AppError>, started: Instant, operation: &str) -> ServiceResponse<T> {
    let meta = ResponseMeta::new(started.elapsed(), ResponseSource::Network);
    match result {
        Ok(data) => ServiceResponse::success(data, meta),
        Err(e) => ServiceResponse::failure(handle_error(&e, operation), meta),
    }
}

fn to_json<T: Serialize>(value: &Option<T>) -> Option<Value> {
    value.as_ref().and_then(|v| serde_json::to_value(v).ok())
}

fn get_key(resource: &str, id: &str) -> String {
    format!("{}:get:{}", resource, id)
}

fn list_prefix(resource: &str) -> String {
    format!("{}:list:", resource)
}

/// `resource:list:<sha256 of the serialized params>`
fn list_key(resource: &str, params: &ListParams) -> Result<String, AppError> {
    use sha2::{Digest, Sha256};

    let encoded = serde_json::to_vec(params)?;
    let digest = Sha256::digest(&encoded);
    Ok(format!("{}{}", list_prefix(resource), hex::encode(digest)))
}

mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut hex = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::ClientConfig;
    use crate::app::resources::{CreateProduct, Product, UpdateProduct};
    use crate::domain::{ErrorCode, FieldError, HttpMethod, HttpResponse};
    use crate::infra::InMemoryCache;
    use crate::test_utils::{MockAuditSink, MockCacheStore, MockTransport};
    use serde_json::json;

    fn product_json(id: &str, name: &str) -> Value {
        json!({"id": id, "name": name, "price": 10.0, "stock": 3})
    }

    fn setup() -> (Arc<MockTransport>, Arc<InMemoryCache>, BaseService<Product>) {
        let transport = Arc::new(MockTransport::new());
        let cache = Arc::new(InMemoryCache::new());
        let client = Arc::new(HttpClient::new(
            Arc::clone(&transport) as _,
            ClientConfig::new("https://api.shop.test"),
        ));
        let service = BaseService::<Product>::new(client).with_cache(Arc::clone(&cache) as _);
        (transport, cache, service)
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(get_key("products", "p1"), "products:get:p1");

        let a = list_key("products", &ListParams::default().page(1, 10)).unwrap();
        let b = list_key("products", &ListParams::default().page(1, 10)).unwrap();
        let c = list_key("products", &ListParams::default().page(2, 10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("products:list:"));
        assert_eq!(a.len(), "products:list:".len() + 64);
    }

    #[tokio::test]
    async fn test_get_populates_cache_then_hits() {
        let (transport, _cache, service) = setup();
        transport.push_response(HttpResponse::json(200, &product_json("p1", "Shoe")));

        let first = service.get("p1").await;
        assert!(first.is_ok());
        assert!(!first.meta.cached);
        assert_eq!(first.meta.source, ResponseSource::Network);
        assert_eq!(first.data.unwrap().name, "Shoe");

        let second = service.get("p1").await;
        assert!(second.meta.cached);
        assert_eq!(second.meta.source, ResponseSource::Cache);
        assert_eq!(second.data.unwrap().name, "Shoe");
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.requests()[0].url, "https://api.shop.test/products/p1");
    }

    #[tokio::test]
    async fn test_get_cache_hit_skips_transport() {
        let (transport, cache, service) = setup();
        cache
            .set("products:get:p7", product_json("p7", "Hat"), Duration::from_secs(60))
            .await
            .unwrap();

        let response = service.get("p7").await;
        assert!(response.meta.cached);
        assert_eq!(response.data.unwrap().id, "p7");
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_invalidates_cached_list() {
        let (transport, _cache, service) = setup();
        transport.push_response(HttpResponse::json(200, &json!([])));
        transport.push_response(HttpResponse::json(201, &product_json("p1", "X")));
        transport.push_response(HttpResponse::json(200, &json!([product_json("p1", "X")])));

        let params = ListParams::default();
        let before = service.list(&params).await;
        assert!(before.data.unwrap().items.is_empty());

        let created = service
            .create(&CreateProduct::new("X", 10.0))
            .await;
        assert!(created.is_ok());

        let after = service.list(&params).await;
        assert!(!after.meta.cached);
        let names: Vec<String> = after.data.unwrap().items.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["X".to_string()]);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_update_invalidates_entity_and_lists() {
        let (transport, _cache, service) = setup();
        transport.push_response(HttpResponse::json(200, &product_json("p1", "Old")));
        transport.push_response(HttpResponse::json(200, &json!([product_json("p1", "Old")])));
        transport.push_response(HttpResponse::json(200, &product_json("p1", "New")));
        transport.push_response(HttpResponse::json(200, &product_json("p1", "New")));
        transport.push_response(HttpResponse::json(200, &json!([product_json("p1", "New")])));

        service.get("p1").await;
        service.list(&ListParams::default()).await;

        let update = UpdateProduct {
            name: Some("New".to_string()),
            ..UpdateProduct::default()
        };
        let updated = service.update("p1", &update).await;
        assert_eq!(updated.data.unwrap().name, "New");
        assert_eq!(transport.requests()[2].method, HttpMethod::Put);

        let fetched = service.get("p1").await;
        assert!(!fetched.meta.cached);
        assert_eq!(fetched.data.unwrap().name, "New");

        let listed = service.list(&ListParams::default()).await;
        assert!(!listed.meta.cached);
        assert_eq!(listed.data.unwrap().items[0].name, "New");
        assert_eq!(transport.call_count(), 5);
    }

    #[tokio::test]
    async fn test_delete_invalidates_and_reports_true() {
        let (transport, cache, service) = setup();
        cache
            .set("products:get:p1", product_json("p1", "Gone"), Duration::from_secs(60))
            .await
            .unwrap();
        transport.push_response(HttpResponse::new(204));

        let response = service.delete("p1").await;
        assert_eq!(response.data, Some(true));
        assert!(cache.get("products:get:p1").await.unwrap().is_none());
        assert_eq!(transport.requests()[0].method, HttpMethod::Delete);
    }

    #[tokio::test]
    async fn test_errors_are_carried_not_raised() {
        let (transport, _cache, service) = setup();
        transport.push_response(HttpResponse::json(404, &json!({"message": "no such product"})));

        let response = service.get("missing").await;
        assert!(response.data.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::Client);
        assert_eq!(error.status, Some(404));
        assert_eq!(error.message, "Request failed (404): no such product");
    }

    #[tokio::test]
    async fn test_validation_hook_blocks_network() {
        let (transport, _cache, service) = setup();

        let response = service.create(&CreateProduct::new("", -1.0)).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::Validation);
        assert_eq!(
            error.fields,
            vec![
                FieldError::new("name", "Name must be 1-200 characters"),
                FieldError::new("price", "Price must not be negative"),
            ]
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_id_is_encoded_as_single_segment() {
        let (transport, _cache, service) = setup();
        transport.push_response(HttpResponse::json(404, &json!({})));
        transport.push_response(HttpResponse::json(404, &json!({})));

        service.get("../orders/o1?admin=1").await;
        service.delete("a/b#c").await;

        let sent = transport.requests();
        assert_eq!(
            sent[0].url,
            "https://api.shop.test/products/..%2Forders%2Fo1%3Fadmin=1"
        );
        assert_eq!(sent[1].url, "https://api.shop.test/products/a%2Fb%23c");
    }

    #[tokio::test]
    async fn test_dot_segment_ids_are_rejected() {
        let (transport, _cache, service) = setup();

        let response = service.get("..").await;
        assert_eq!(response.error.unwrap().code, ErrorCode::Client);
        let response = service.update("", &UpdateProduct::default()).await;
        assert_eq!(response.error.unwrap().code, ErrorCode::Client);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unbounded_cache_ttl_does_not_panic() {
        let (transport, _cache, service) = setup();
        let service = service.with_cache_ttl(Duration::from_secs(u64::MAX));
        transport.push_response(HttpResponse::json(200, &product_json("p1", "Shoe")));

        assert!(service.get("p1").await.is_ok());
        let cached = service.get("p1").await;
        assert!(cached.meta.cached);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_network() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &product_json("p1", "Shoe")));
        let client = Arc::new(HttpClient::new(
            Arc::clone(&transport) as _,
            ClientConfig::new("https://api.shop.test"),
        ));
        let service = BaseService::<Product>::new(client)
            .with_cache(Arc::new(MockCacheStore::failing("redis down")));

        let response = service.get("p1").await;
        assert!(response.is_ok());
        assert_eq!(response.data.unwrap().name, "Shoe");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_audit_records_before_and_after() {
        let (transport, cache, service) = setup();
        let audit = Arc::new(MockAuditSink::new());
        let service = service.with_audit(Arc::clone(&audit) as _);
        cache
            .set("products:get:p1", product_json("p1", "Old"), Duration::from_secs(60))
            .await
            .unwrap();
        transport.push_response(HttpResponse::json(200, &product_json("p1", "New")));

        let update = UpdateProduct {
            name: Some("New".to_string()),
            ..UpdateProduct::default()
        };
        service.update("p1", &update).await;

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Update);
        assert_eq!(entries[0].resource, "products");
        assert_eq!(entries[0].resource_id.as_deref(), Some("p1"));
        assert_eq!(entries[0].before.as_ref().unwrap()["name"], "Old");
        assert_eq!(entries[0].after.as_ref().unwrap()["name"], "New");
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_operation() {
        let (transport, _cache, service) = setup();
        let service = service.with_audit(Arc::new(MockAuditSink::failing("audit down")));
        transport.push_response(HttpResponse::json(201, &product_json("p2", "Y")));

        let response = service.create(&CreateProduct::new("Y", 5.0)).await;
        assert!(response.is_ok());
        assert_eq!(response.data.unwrap().id, "p2");
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_resource_namespace() {
        let (_transport, cache, service) = setup();
        let ttl = Duration::from_secs(60);
        cache.set("products:get:p1", json!({}), ttl).await.unwrap();
        cache.set("products:list:abc", json!({}), ttl).await.unwrap();
        cache.set("orders:get:o1", json!({}), ttl).await.unwrap();

        service.invalidate_all().await;

        assert!(cache.get("products:get:p1").await.unwrap().is_none());
        assert!(cache.get("products:list:abc").await.unwrap().is_none());
        assert!(cache.get("orders:get:o1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_service_without_cache_always_hits_network() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::json(200, &product_json("p1", "A")));
        transport.push_response(HttpResponse::json(200, &product_json("p1", "A")));
        let client = Arc::new(HttpClient::new(
            Arc::clone(&transport) as _,
            ClientConfig::new("https://api.shop.test"),
        ));
        let service = BaseService::<Product>::new(client);

        assert!(!service.get("p1").await.meta.cached);
        assert!(!service.get("p1").await.meta.cached);
        assert_eq!(transport.call_count(), 2);
    }
}
