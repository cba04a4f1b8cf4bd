use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        enums::{NotificationKind, Role},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        wishlist_items::{Column as WishCol, Entity as WishlistItems},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::Product,
    notify::{self, NewNotification},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// Active, not deleted: what buyers may see and purchase.
pub fn visible_products() -> Select<Products> {
    Products::find()
        .filter(Column::IsActive.eq(true))
        .filter(Column::DeletedAt.is_null())
}

pub async fn find_visible<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ProductModel> {
    visible_products()
        .filter(Column::Id.eq(id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Escape LIKE wildcards so user input matches literally.
pub fn like_pattern(input: &str) -> String {
    let escaped = input
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("product");
    }
    slug
}

fn unique_slug(name: &str, id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("{}-{}", slugify(name), &simple[..8])
}

/// Ceiling for a unit price in minor units (10 million major units).
pub const MAX_PRICE: i64 = 1_000_000_000;

fn validate_listing(
    name: &str,
    category: &str,
    unit: &str,
    price: i64,
    quantity: i32,
) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    if category.trim().is_empty() {
        return Err(AppError::BadRequest("category is required".into()));
    }
    if unit.trim().is_empty() {
        return Err(AppError::BadRequest("unit is required".into()));
    }
    if price <= 0 {
        return Err(AppError::BadRequest("price must be greater than 0".into()));
    }
    if price > MAX_PRICE {
        return Err(AppError::BadRequest(format!("price must not exceed {MAX_PRICE}")));
    }
    if quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".into()));
    }
    Ok(())
}

pub async fn list_products(
    state: &AppState,
    pagination: Pagination,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let page = pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }
    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(Column::Category.eq(category.trim().to_lowercase()));
    }
    if let Some(farmer_id) = query.farmer_id {
        condition = condition.add(Column::FarmerId.eq(farmer_id));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }
    if let Some(organic) = query.organic {
        condition = condition.add(Column::IsOrganic.eq(organic));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Rating => Column::RatingAverage,
    };

    let mut finder = visible_products().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await?;

    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::paged(&page, total)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = find_visible(&state.orm, id).await?;
    Ok(ApiResponse::success("Product", Product::from(product), None))
}

pub async fn list_farmer_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_role(user, &[Role::Farmer])?;
    let page = pagination.normalize();

    let finder = Products::find()
        .filter(Column::FarmerId.eq(user.user_id))
        .filter(Column::DeletedAt.is_null())
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "My products",
        ProductList { items },
        Some(Meta::paged(&page, total)),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_role(user, &[Role::Farmer, Role::Admin])?;
    validate_listing(
        &payload.name,
        &payload.category,
        &payload.unit,
        payload.price,
        payload.quantity,
    )?;

    let id = Uuid::new_v4();
    let name = payload.name.trim().to_string();
    let active = ActiveModel {
        id: Set(id),
        farmer_id: Set(user.user_id),
        slug: Set(unique_slug(&name, id)),
        name: Set(name),
        description: Set(payload.description.filter(|d| !d.trim().is_empty())),
        category: Set(payload.category.trim().to_lowercase()),
        unit: Set(payload.unit.trim().to_string()),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        is_active: Set(false),
        is_organic: Set(payload.is_organic),
        images: Set(serde_json::json!(payload.images)),
        rating_average: Set(0.0),
        rating_count: Set(0),
        deleted_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    match notify::active_admin_ids(&state.orm).await {
        Ok(admins) => {
            notify::dispatch(
                state,
                &admins,
                NewNotification::new(
                    NotificationKind::ProductPending,
                    "Product awaiting approval",
                    format!("\"{}\" was listed and needs review", product.name),
                )
                .with_data(serde_json::json!({ "product_id": product.id })),
            )
            .await
        }
        Err(err) => tracing::warn!(error = %err, "could not look up admins"),
    }

    Ok(ApiResponse::success(
        "Product created; pending approval",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

async fn load_owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ProductModel> {
    let product = Products::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !user.is_admin() && product.farmer_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(product)
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_role(user, &[Role::Farmer, Role::Admin])?;
    let existing = load_owned(state, user, id).await?;

    validate_listing(
        payload.name.as_deref().unwrap_or(&existing.name),
        payload.category.as_deref().unwrap_or(&existing.category),
        payload.unit.as_deref().unwrap_or(&existing.unit),
        payload.price.unwrap_or(existing.price),
        payload.quantity.unwrap_or(existing.quantity),
    )?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
    }
    if let Some(category) = payload.category {
        active.category = Set(category.trim().to_lowercase());
    }
    if let Some(unit) = payload.unit {
        active.unit = Set(unit.trim().to_string());
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(quantity) = payload.quantity {
        active.quantity = Set(quantity);
    }
    if let Some(is_organic) = payload.is_organic {
        active.is_organic = Set(is_organic);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", Product::from(product), Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_role(user, &[Role::Farmer, Role::Admin])?;
    let existing = load_owned(state, user, id).await?;

    let txn = state.orm.begin().await?;
    let mut active: ActiveModel = existing.into();
    active.is_active = Set(false);
    active.deleted_at = Set(Some(Utc::now().into()));
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    CartItems::delete_many()
        .filter(CartCol::ProductId.eq(id))
        .exec(&txn)
        .await?;
    WishlistItems::delete_many()
        .filter(WishCol::ProductId.eq(id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Deleted", serde_json::json!({}), Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Fresh  Alphonso Mangoes!"), "fresh-alphonso-mangoes");
        assert_eq!(slugify("  --Kale--  "), "kale");
        assert_eq!(slugify("ಟೊಮೆಟೊ"), "product");
    }

    #[test]
    fn unique_slug_appends_id_prefix() {
        let id = Uuid::parse_str("12345678-9abc-def0-1234-56789abcdef0").unwrap();
        assert_eq!(unique_slug("Red Onions", id), "red-onions-12345678");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 100% "), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn listing_validation() {
        assert!(validate_listing("Okra", "vegetables", "kg", 4000, 10).is_ok());
        assert!(validate_listing(" ", "vegetables", "kg", 4000, 10).is_err());
        assert!(validate_listing("Okra", "vegetables", "kg", 0, 10).is_err());
        assert!(validate_listing("Okra", "vegetables", "kg", 10, -1).is_err());
        assert!(validate_listing("Okra", "vegetables", "kg", MAX_PRICE, 1).is_ok());
        assert!(validate_listing("Okra", "vegetables", "kg", MAX_PRICE + 1, 1).is_err());
    }
}
