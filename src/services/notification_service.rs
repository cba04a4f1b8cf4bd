use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::notifications::NotificationList,
    entity::notifications::{ActiveModel as NotificationActive, Column as NoteCol, Entity as Notifications},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Notification,
    response::{ApiResponse, Meta},
    routes::params::{NotificationQuery, Pagination},
    state::AppState,
};

fn not_expired() -> Condition {
    Condition::any()
        .add(NoteCol::ExpiresAt.is_null())
        .add(NoteCol::ExpiresAt.gt(Utc::now()))
}

fn live_for(user_id: Uuid) -> Select<Notifications> {
    Notifications::find()
        .filter(NoteCol::UserId.eq(user_id))
        .filter(not_expired())
}

/// Unread, unexpired notifications for `user_id`.
pub async fn unread_count(orm: &OrmConn, user_id: Uuid) -> Result<u64, sea_orm::DbErr> {
    live_for(user_id)
        .filter(NoteCol::IsRead.eq(false))
        .count(orm)
        .await
}

pub async fn list_notifications(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: NotificationQuery,
) -> AppResult<ApiResponse<NotificationList>> {
    let page = pagination.normalize();

    let mut finder = live_for(user.user_id);
    if query.unread_only.unwrap_or(false) {
        finder = finder.filter(NoteCol::IsRead.eq(false));
    }
    let total = finder.clone().count(&state.orm).await?;
    let unread = unread_count(&state.orm, user.user_id).await?;

    let items = finder
        .order_by_desc(NoteCol::CreatedAt)
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Notification::from)
        .collect();

    Ok(ApiResponse::success(
        "Notifications",
        NotificationList { items, unread },
        Some(Meta::paged(&page, total)),
    ))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let note = Notifications::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|n| n.user_id == user.user_id)
        .ok_or(AppError::NotFound)?;

    if note.is_read {
        return Ok(ApiResponse::success("Notification", Notification::from(note), None));
    }

    let mut active: NotificationActive = note.into();
    active.is_read = Set(true);
    active.read_at = Set(Some(Utc::now().into()));
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::success("Notification marked as read", Notification::from(updated), Some(Meta::empty())))
}

pub async fn mark_all_read(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Notifications::update_many()
        .col_expr(NoteCol::IsRead, Expr::value(true))
        .col_expr(NoteCol::ReadAt, Expr::current_timestamp().into())
        .filter(NoteCol::UserId.eq(user.user_id))
        .filter(NoteCol::IsRead.eq(false))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "All notifications marked as read",
        serde_json::json!({ "updated": result.rows_affected }),
        Some(Meta::empty()),
    ))
}

pub async fn delete_notification(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Notifications::delete_many()
        .filter(NoteCol::Id.eq(id))
        .filter(NoteCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success("Notification deleted", serde_json::json!({}), Some(Meta::empty())))
}

/// Remove rows whose TTL has passed. Used by the `purge_notifications` binary.
pub async fn purge_expired(orm: &OrmConn) -> Result<u64, sea_orm::DbErr> {
    let result = Notifications::delete_many()
        .filter(NoteCol::ExpiresAt.lte(Utc::now()))
        .exec(orm)
        .await?;
    Ok(result.rows_affected)
}
