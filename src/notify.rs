use chrono::{Duration, Utc};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    entity::{
        enums::{NotificationKind, Role},
        notifications::{ActiveModel as NotificationActive, Entity as Notifications},
        users::{Column as UserCol, Entity as Users},
    },
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<Value>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Insert one row per distinct recipient. Returns how many were written.
pub async fn notify_users<C: ConnectionTrait>(
    conn: &C,
    ttl_days: i64,
    recipients: &[Uuid],
    note: &NewNotification,
) -> Result<usize, DbErr> {
    let mut unique: Vec<Uuid> = recipients.to_vec();
    unique.sort();
    unique.dedup();
    if unique.is_empty() {
        return Ok(0);
    }

    let expires_at = Utc::now() + Duration::days(ttl_days);
    let rows = unique.iter().map(|user_id| NotificationActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(*user_id),
        kind: Set(note.kind),
        title: Set(note.title.clone()),
        message: Set(note.message.clone()),
        data: Set(note.data.clone()),
        is_read: Set(false),
        read_at: Set(None),
        expires_at: Set(Some(expires_at.into())),
        created_at: NotSet,
    });

    Notifications::insert_many(rows).exec(conn).await?;
    Ok(unique.len())
}

/// Best-effort fan-out after the main write committed.
pub async fn dispatch(state: &AppState, recipients: &[Uuid], note: NewNotification) {
    match notify_users(&state.orm, state.config.notification_ttl_days, recipients, &note).await {
        Ok(count) => tracing::debug!(kind = ?note.kind, count, "notifications sent"),
        Err(err) => tracing::warn!(error = %err, kind = ?note.kind, "notification dispatch failed"),
    }
}

pub async fn active_admin_ids<C: ConnectionTrait>(conn: &C) -> Result<Vec<Uuid>, DbErr> {
    Users::find()
        .select_only()
        .column(UserCol::Id)
        .filter(UserCol::Role.eq(Role::Admin))
        .filter(UserCol::IsActive.eq(true))
        .into_tuple::<Uuid>()
        .all(conn)
        .await
}
