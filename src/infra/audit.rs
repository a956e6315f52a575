//! Audit sink implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::app::HttpClient;
use crate::domain::{ApiResponse, AppError, AuditEntry, AuditSink, RequestConfig};

/// Writes audit entries to the `audit` tracing target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        let before = entry.before.as_ref().map(Value::to_string);
        let after = entry.after.as_ref().map(Value::to_string);
        info!(
            target: "audit",
            audit_id = %entry.id,
            action = ?entry.action,
            resource = %entry.resource,
            resource_id = entry.resource_id.as_deref().unwrap_or("-"),
            before = before.as_deref().unwrap_or("-"),
            after = after.as_deref().unwrap_or("-"),
            "Audit entry"
        );
        Ok(())
    }
}

/// Posts audit entries to the backend audit-log endpoint.
pub struct HttpAuditSink {
    client: Arc<HttpClient>,
    path: String,
}

impl HttpAuditSink {
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_path(client, "/audit-logs")
    }

    #[must_use]
    pub fn with_path(client: Arc<HttpClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        let _: ApiResponse<Value> = self
            .client
            .post(&self.path, &entry, RequestConfig::default().with_retries(0))
            .await?;
        Ok(())
    }
}
