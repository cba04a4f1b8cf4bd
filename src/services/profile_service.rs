use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use crate::{
    audit,
    dto::profile::{AddressList, ChangePasswordRequest, CreateAddressRequest, UpdateProfileRequest},
    entity::{
        addresses::{ActiveModel as AddressActive, Column as AddrCol, Entity as Addresses},
        enums::Role,
        users::{ActiveModel as UserActive, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, User},
    response::{ApiResponse, Meta},
    services::auth_service::{hash_password, validate_new_password, verify_password},
    state::AppState,
};

async fn load_user(state: &AppState, user: &AuthUser) -> AppResult<UserModel> {
    Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let found = load_user(state, user).await?;
    Ok(ApiResponse::success("Profile", User::from(found), None))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = load_user(state, user).await?;
    let role = existing.role;

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone.trim().to_string()).filter(|p| !p.is_empty()));
    }
    if let Some(farm_name) = payload.farm_name {
        if role != Role::Farmer {
            return Err(AppError::BadRequest("only farmers have a farm name".into()));
        }
        active.farm_name = Set(Some(farm_name.trim().to_string()).filter(|f| !f.is_empty()));
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::success("Profile updated", User::from(updated), Some(Meta::empty())))
}

pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = load_user(state, user).await?;
    if !verify_password(&payload.current_password, &existing.password_hash)? {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }
    validate_new_password(&payload.new_password)?;

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success("Password changed", serde_json::json!({}), Some(Meta::empty())))
}

pub async fn list_addresses(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<AddressList>> {
    let items = Addresses::find()
        .filter(AddrCol::UserId.eq(user.user_id))
        .order_by_desc(AddrCol::IsDefault)
        .order_by_asc(AddrCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();

    Ok(ApiResponse::success("Addresses", AddressList { items }, None))
}

pub async fn add_address(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    for (field, value) in [
        ("label", &payload.label),
        ("line1", &payload.line1),
        ("city", &payload.city),
        ("state", &payload.state),
        ("postal_code", &payload.postal_code),
        ("country", &payload.country),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{field} is required")));
        }
    }

    let txn = state.orm.begin().await?;
    let existing = Addresses::find()
        .filter(AddrCol::UserId.eq(user.user_id))
        .count(&txn)
        .await?;
    let is_default = payload.is_default || existing == 0;

    if is_default {
        Addresses::update_many()
            .col_expr(AddrCol::IsDefault, Expr::value(false))
            .filter(AddrCol::UserId.eq(user.user_id))
            .exec(&txn)
            .await?;
    }

    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        label: Set(payload.label.trim().to_string()),
        line1: Set(payload.line1.trim().to_string()),
        line2: Set(payload.line2.filter(|l| !l.trim().is_empty())),
        city: Set(payload.city.trim().to_string()),
        state: Set(payload.state.trim().to_string()),
        postal_code: Set(payload.postal_code.trim().to_string()),
        country: Set(payload.country.trim().to_string()),
        phone: Set(payload.phone.filter(|p| !p.trim().is_empty())),
        is_default: Set(is_default),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success("Address added", Address::from(address), Some(Meta::empty())))
}

/// Removing the default address promotes the oldest remaining one.
pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let address = Addresses::find_by_id(id)
        .filter(AddrCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    Addresses::delete_by_id(address.id).exec(&txn).await?;

    let mut promoted = None;
    if address.is_default {
        let next = Addresses::find()
            .filter(AddrCol::UserId.eq(user.user_id))
            .order_by_asc(AddrCol::CreatedAt)
            .order_by_asc(AddrCol::Id)
            .one(&txn)
            .await?;
        if let Some(next) = next {
            let mut active: AddressActive = next.into();
            active.is_default = Set(true);
            promoted = Some(active.update(&txn).await?.id);
        }
    }
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Address removed",
        serde_json::json!({ "default_address_id": promoted }),
        Some(Meta::empty()),
    ))
}
