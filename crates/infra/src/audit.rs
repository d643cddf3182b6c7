//! Audit trail writer.
//!
//! Handlers call [`AuditRecorder::record_best_effort`] after the primary
//! mutation has been committed. A failed audit write is logged and swallowed;
//! it never changes the response of the request that triggered it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use workboard_core::{AuditLogId, TenantId, UserId};

use crate::store::{AuditRecord, AuditRepository, StoreResult};

/// One audit event, before it gets an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub tenant_id: TenantId,
    pub actor_id: UserId,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub fn new(
        tenant_id: TenantId,
        actor_id: UserId,
        action: &'static str,
        entity_type: &'static str,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            tenant_id,
            actor_id,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    repo: Arc<dyn AuditRepository>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, entry: AuditEntry) -> StoreResult<AuditRecord> {
        let record = AuditRecord {
            id: AuditLogId::new(),
            tenant_id: entry.tenant_id,
            actor_id: entry.actor_id,
            action: entry.action.to_string(),
            entity_type: entry.entity_type.to_string(),
            entity_id: entry.entity_id,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.repo.append_audit(record.clone()).await?;
        Ok(record)
    }

    /// Record, logging instead of failing.
    pub async fn record_best_effort(&self, entry: AuditEntry) {
        let action = entry.action;
        let tenant_id = entry.tenant_id;
        if let Err(error) = self.record(entry).await {
            tracing::warn!(%tenant_id, action, %error, "audit write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::store::{InMemoryStore, StoreError};

    struct BrokenAudit;

    #[async_trait]
    impl AuditRepository for BrokenAudit {
        async fn append_audit(&self, _record: AuditRecord) -> StoreResult<()> {
            Err(StoreError::Backend("disk full".to_string()))
        }

        async fn list_audit(&self, _tenant_id: TenantId, _limit: usize) -> StoreResult<Vec<AuditRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn record_persists_entry() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let tenant_id = TenantId::new();
        let actor = UserId::new();

        let entry = AuditEntry::new(tenant_id, actor, "task.created", "task", "t-1")
            .with_metadata(json!({ "title": "Ship it" }));
        let record = recorder.record(entry).await.unwrap();

        let listed = store.list_audit(tenant_id, 10).await.unwrap();
        assert_eq!(listed, vec![record]);
        assert_eq!(listed[0].metadata, Some(json!({ "title": "Ship it" })));
    }

    #[tokio::test]
    async fn record_surfaces_failure() {
        let recorder = AuditRecorder::new(Arc::new(BrokenAudit));
        let entry = AuditEntry::new(TenantId::new(), UserId::new(), "project.deleted", "project", "p-1");
        assert!(recorder.record(entry).await.is_err());
    }

    #[tokio::test]
    async fn best_effort_swallows_failure() {
        let recorder = AuditRecorder::new(Arc::new(BrokenAudit));
        let entry = AuditEntry::new(TenantId::new(), UserId::new(), "project.deleted", "project", "p-1");
        recorder.record_best_effort(entry).await;
    }
}
