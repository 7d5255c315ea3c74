use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult, state::AppState};

/// What happened and to which record, as written to `audit_logs`.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<String>,
    pub metadata: Option<Value>,
}

impl<'a> AuditEntry<'a> {
    pub fn new(action: &'a str, entity_type: &'a str) -> Self {
        Self {
            action,
            entity_type,
            entity_id: None,
            metadata: None,
        }
    }

    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub async fn log_audit(pool: &DbPool, actor_id: Option<Uuid>, entry: &AuditEntry<'_>) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, actor_id, action, entity_type, entity_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(actor_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id.clone())
    .bind(entry.metadata.clone())
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort audit write. A failure is logged and never reaches the caller.
pub async fn record(state: &AppState, actor_id: Option<Uuid>, entry: AuditEntry<'_>) {
    if let Err(err) = log_audit(&state.pool, actor_id, &entry).await {
        tracing::warn!(error = %err, action = entry.action, "audit log failed");
    }
}
