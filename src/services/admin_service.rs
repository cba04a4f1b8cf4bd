use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{AdminUpdateUserRequest, AuditLogList, ProductApprovalRequest, UserList},
        orders::OrderList,
        products::ProductList,
    },
    entity::{
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        enums::{NotificationKind, Role},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{AuditLog, Product, User},
    notify::{self, NewNotification},
    response::{ApiResponse, Meta},
    routes::params::{AdminProductQuery, ApprovalFilter, OrderListQuery, Pagination, UserListQuery},
    services::{order_service, product_service::like_pattern},
    state::AppState,
};

/// Admins may not lock themselves out by deactivating or demoting their own account.
pub fn guard_self_change(
    actor_id: Uuid,
    target_id: Uuid,
    payload: &AdminUpdateUserRequest,
) -> AppResult<()> {
    if actor_id != target_id {
        return Ok(());
    }
    if payload.is_active == Some(false) {
        return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
    }
    if matches!(payload.role, Some(role) if role != Role::Admin) {
        return Err(AppError::BadRequest("You cannot change your own role".into()));
    }
    Ok(())
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let page = pagination.normalize();

    let mut finder = Users::find();
    if let Some(role) = query.role {
        finder = finder.filter(UserCol::Role.eq(role));
    }
    if let Some(q) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = like_pattern(q);
        finder = finder.filter(
            Condition::any()
                .add(Expr::col(UserCol::Email).ilike(pattern.clone()))
                .add(Expr::col(UserCol::Name).ilike(pattern)),
        );
    }
    finder = finder.order_by_desc(UserCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success("Users", UserList { items }, Some(Meta::paged(&page, total))))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AdminUpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    guard_self_change(user.user_id, id, &payload)?;

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = existing.into();
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_verified) = payload.is_verified {
        active.is_verified = Set(is_verified);
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_update",
        "users",
        serde_json::json!({
            "user_id": updated.id,
            "role": updated.role,
            "is_active": updated.is_active,
            "is_verified": updated.is_verified,
        }),
    )
    .await;

    Ok(ApiResponse::success("User updated", User::from(updated), Some(Meta::empty())))
}

/// Soft delete: the account is deactivated, its history stays.
pub async fn deactivate_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    let payload = AdminUpdateUserRequest {
        is_active: Some(false),
        ..Default::default()
    };
    update_user(state, user, id, payload).await
}

pub async fn list_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: AdminProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let page = pagination.normalize();

    let mut finder = Products::find().filter(ProdCol::DeletedAt.is_null());
    finder = match query.status.unwrap_or_default() {
        ApprovalFilter::Pending => finder.filter(ProdCol::IsActive.eq(false)),
        ApprovalFilter::Active => finder.filter(ProdCol::IsActive.eq(true)),
        ApprovalFilter::All => finder,
    };
    finder = finder.order_by_asc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success("Products", ProductList { items }, Some(Meta::paged(&page, total))))
}

pub async fn set_product_approval(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ProductApprovalRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let product = Products::find_by_id(id)
        .filter(ProdCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ProductActive = product.into();
    active.is_active = Set(payload.is_active);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    tracing::info!(product_id = %product.id, approved = payload.is_active, "product approval changed");
    audit::record(
        &state.pool,
        user.user_id,
        "product_approval",
        "products",
        serde_json::json!({ "product_id": product.id, "is_active": payload.is_active }),
    )
    .await;

    let note = if payload.is_active {
        NewNotification::new(
            NotificationKind::ProductApproved,
            "Listing approved",
            format!("{} is now visible to buyers", product.name),
        )
    } else {
        let reason = payload
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "no reason given".into());
        NewNotification::new(
            NotificationKind::ProductRejected,
            "Listing not approved",
            format!("{} is hidden from buyers: {}", product.name, reason),
        )
    };
    notify::dispatch(
        state,
        &[product.farmer_id],
        note.with_data(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success("Approval updated", Product::from(product), Some(Meta::empty())))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    order_service::list_orders(state, user, pagination, query).await
}

pub async fn list_audit_logs(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<AuditLogList>> {
    ensure_admin(user)?;
    let page = pagination.normalize();

    let finder = AuditLogs::find().order_by_desc(AuditCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(AuditLog::from)
        .collect();

    Ok(ApiResponse::success("Audit logs", AuditLogList { items }, Some(Meta::paged(&page, total))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_cannot_deactivate_self() {
        let me = Uuid::new_v4();
        let payload = AdminUpdateUserRequest {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(guard_self_change(me, me, &payload).is_err());
        assert!(guard_self_change(me, Uuid::new_v4(), &payload).is_ok());
    }

    #[test]
    fn admin_cannot_demote_self() {
        let me = Uuid::new_v4();
        let demote = AdminUpdateUserRequest {
            role: Some(Role::Buyer),
            ..Default::default()
        };
        let keep = AdminUpdateUserRequest {
            role: Some(Role::Admin),
            is_verified: Some(true),
            ..Default::default()
        };
        assert!(guard_self_change(me, me, &demote).is_err());
        assert!(guard_self_change(me, me, &keep).is_ok());
    }
}
