//! Console audit sink for development. Logs events to tracing output.

use async_trait::async_trait;
use cradleguard_application::{AuditEvent, AuditRepository};
use cradleguard_core::AppResult;
use tracing::info;

/// Development audit repository that logs events to the console.
#[derive(Clone)]
pub struct TracingAuditRepository;

impl TracingAuditRepository {
    /// Creates a new tracing audit repository.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingAuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditRepository for TracingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        info!(
            subject = event.subject.as_str(),
            action = event.action.as_str(),
            resource_type = event.resource_type.as_str(),
            resource_id = event.resource_id.as_str(),
            detail = event.detail.as_deref().unwrap_or(""),
            "audit event"
        );

        Ok(())
    }
}
