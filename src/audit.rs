use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Appends a row to `audit_logs`. A failed write is logged and swallowed so the
/// triggering request still succeeds.
pub async fn record(pool: &DbPool, actor_id: Uuid, action: &str, resource: &str, metadata: Value) {
    let inserted = sqlx::query(
        "INSERT INTO audit_logs (id, user_id, action, resource, metadata) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(actor_id)
    .bind(action)
    .bind(resource)
    .bind(&metadata)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => tracing::debug!(%actor_id, action, resource, "audit recorded"),
        Err(err) => tracing::warn!(error = %err, %actor_id, action, "audit log failed"),
    }
}
