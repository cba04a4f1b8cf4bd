use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::wishlist::{AddWishlistRequest, WishlistProductList},
    entity::{
        products::Entity as Products,
        wishlist_items::{ActiveModel as WishActive, Column as WishCol, Entity as WishlistItems},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::product_service::find_visible,
    state::AppState,
};

pub async fn list_wishlist(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProductList>> {
    let page = pagination.normalize();
    let finder = WishlistItems::find()
        .filter(WishCol::UserId.eq(user.user_id))
        .order_by_desc(WishCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .find_also_related(Products)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(_, product)| product.map(Product::from))
        .collect();

    Ok(ApiResponse::success(
        "OK",
        WishlistProductList { items },
        Some(Meta::paged(&page, total)),
    ))
}

/// Idempotent: adding a product twice keeps a single entry.
pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = find_visible(&state.orm, payload.product_id).await?;

    let existing = WishlistItems::find()
        .filter(
            Condition::all()
                .add(WishCol::UserId.eq(user.user_id))
                .add(WishCol::ProductId.eq(payload.product_id)),
        )
        .one(&state.orm)
        .await?;

    if existing.is_none() {
        WishActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            product_id: Set(payload.product_id),
            created_at: NotSet,
        }
        .insert(&state.orm)
        .await?;
    }

    Ok(ApiResponse::success(
        "Added to wishlist",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = WishlistItems::delete_many()
        .filter(
            Condition::all()
                .add(WishCol::UserId.eq(user.user_id))
                .add(WishCol::ProductId.eq(product_id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
