use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{CartLine, CartView, SetCartQuantityRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    services::{
        order_service::{add_amounts, line_total},
        product_service::find_visible,
    },
    state::AppState,
};

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut items: Vec<CartLine> = Vec::with_capacity(rows.len());
    let mut subtotal: i64 = 0;
    for (item, product) in rows {
        let Some(product) = product else { continue };
        let amount = line_total(product.price, item.quantity)?;
        subtotal = add_amounts(subtotal, amount)?;
        items.push(CartLine {
            id: item.id,
            product: Product::from(product),
            quantity: item.quantity,
            line_total: amount,
        });
    }
    let unit_count = items.iter().map(|i| i64::from(i.quantity)).sum();
    let total = items.len() as u64;

    Ok(ApiResponse::success(
        "OK",
        CartView {
            items,
            unit_count,
            subtotal,
        },
        Some(Meta::new(1, total.max(1), total)),
    ))
}

/// Sets the quantity for a product, creating the cart line on first add.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: SetCartQuantityRequest,
) -> AppResult<ApiResponse<CartLine>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = find_visible(&state.orm, payload.product_id).await?;
    if payload.quantity > product.quantity {
        return Err(AppError::BadRequest(format!(
            "only {} {} of {} in stock",
            product.quantity, product.unit, product.name
        )));
    }

    let exist = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::ProductId.eq(payload.product_id)),
        )
        .one(&state.orm)
        .await?;

    let cart_item = if let Some(item) = exist {
        let mut active: CartActive = item.into();
        active.quantity = Set(payload.quantity);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.orm).await?
    } else {
        CartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            product_id: Set(payload.product_id),
            quantity: Set(payload.quantity),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&state.orm)
        .await?
    };

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let amount = line_total(product.price, cart_item.quantity)?;
    Ok(ApiResponse::success(
        "OK",
        CartLine {
            id: cart_item.id,
            product: Product::from(product),
            quantity: cart_item.quantity,
            line_total: amount,
        },
        None,
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::ProductId.eq(product_id))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected }),
        Some(Meta::empty()),
    ))
}
