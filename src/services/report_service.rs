use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    db::DbPool,
    dto::reports::{AdminAnalytics, BuyerSummary, CountBy, DailySales, FarmerAnalytics, TopProduct},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        enums::{OrderStatus, Role},
        products::{Column as ProdCol, Entity as Products},
        wishlist_items::{Column as WishCol, Entity as WishlistItems},
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin, ensure_role},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{AnalyticsQuery, LowStockQuery},
    services::notification_service,
    state::AppState,
};

const TOP_PRODUCTS: i64 = 10;
const LOW_STOCK_LIMIT: u64 = 20;
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

fn count_rows(rows: Vec<(String, i64)>) -> Vec<CountBy> {
    rows.into_iter()
        .map(|(key, count)| CountBy { key, count })
        .collect()
}

async fn top_products(pool: &DbPool, farmer_id: Option<uuid::Uuid>) -> AppResult<Vec<TopProduct>> {
    let rows = sqlx::query_as::<_, TopProduct>(
        r#"
        SELECT oi.product_id,
               MAX(oi.product_name) AS product_name,
               SUM(oi.quantity)::BIGINT AS units_sold,
               SUM(oi.quantity::BIGINT * oi.price)::BIGINT AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status <> $1
          AND ($2::UUID IS NULL OR oi.farmer_id = $2)
        GROUP BY oi.product_id
        ORDER BY units_sold DESC, revenue DESC
        LIMIT $3
        "#,
    )
    .bind(OrderStatus::Cancelled.as_str())
    .bind(farmer_id)
    .bind(TOP_PRODUCTS)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn admin_analytics(
    state: &AppState,
    user: &AuthUser,
    query: AnalyticsQuery,
) -> AppResult<ApiResponse<AdminAnalytics>> {
    ensure_admin(user)?;
    let pool = &state.pool;
    let cancelled = OrderStatus::Cancelled.as_str();

    let users_by_role: Vec<(String, i64)> = sqlx::query_as(
        "SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role",
    )
    .fetch_all(pool)
    .await?;

    let (active_products, pending_products): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE is_active),
               COUNT(*) FILTER (WHERE NOT is_active)
        FROM products
        WHERE deleted_at IS NULL
        "#,
    )
    .fetch_one(pool)
    .await?;

    let orders_by_status: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    let total_revenue: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM orders WHERE status <> $1",
    )
    .bind(cancelled)
    .fetch_one(pool)
    .await?;

    let daily = sqlx::query_as::<_, DailySales>(
        r#"
        SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day,
               COUNT(*) AS orders,
               COALESCE(SUM(total_amount), 0)::BIGINT AS revenue
        FROM orders
        WHERE status <> $1
          AND created_at >= NOW() - make_interval(days => $2)
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(cancelled)
    .bind(query.window_days() as i32)
    .fetch_all(pool)
    .await?;

    let data = AdminAnalytics {
        users_by_role: count_rows(users_by_role),
        active_products,
        pending_products,
        orders_by_status: count_rows(orders_by_status),
        total_revenue,
        daily,
        top_products: top_products(pool, None).await?,
    };
    Ok(ApiResponse::success("Analytics", data, Some(Meta::empty())))
}

pub async fn farmer_analytics(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<FarmerAnalytics>> {
    ensure_role(user, &[Role::Farmer])?;
    let pool = &state.pool;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD).max(0);

    let (total_revenue, units_sold, order_count): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(oi.quantity::BIGINT * oi.price), 0)::BIGINT,
               COALESCE(SUM(oi.quantity), 0)::BIGINT,
               COUNT(DISTINCT oi.order_id)
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE oi.farmer_id = $1 AND o.status <> $2
        "#,
    )
    .bind(user.user_id)
    .bind(OrderStatus::Cancelled.as_str())
    .fetch_one(pool)
    .await?;

    let (active_listings, pending_listings): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE is_active),
               COUNT(*) FILTER (WHERE NOT is_active)
        FROM products
        WHERE farmer_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(user.user_id)
    .fetch_one(pool)
    .await?;

    let low_stock = Products::find()
        .filter(ProdCol::FarmerId.eq(user.user_id))
        .filter(ProdCol::DeletedAt.is_null())
        .filter(ProdCol::Quantity.lte(threshold))
        .order_by_asc(ProdCol::Quantity)
        .limit(LOW_STOCK_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let data = FarmerAnalytics {
        total_revenue,
        units_sold,
        order_count,
        active_listings,
        pending_listings,
        top_products: top_products(pool, Some(user.user_id)).await?,
        low_stock,
    };
    Ok(ApiResponse::success("Farmer analytics", data, Some(Meta::empty())))
}

pub async fn buyer_summary(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<BuyerSummary>> {
    ensure_role(user, &[Role::Buyer])?;
    let pool = &state.pool;

    let orders_by_status: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM orders WHERE buyer_id = $1 GROUP BY status ORDER BY status",
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    let total_spent: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM orders WHERE buyer_id = $1 AND status <> $2",
    )
    .bind(user.user_id)
    .bind(OrderStatus::Cancelled.as_str())
    .fetch_one(pool)
    .await?;

    let cart_items = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .count(&state.orm)
        .await?;
    let wishlist_items = WishlistItems::find()
        .filter(WishCol::UserId.eq(user.user_id))
        .count(&state.orm)
        .await?;
    let unread_notifications =
        notification_service::unread_count(&state.orm, user.user_id).await?;

    let data = BuyerSummary {
        orders_by_status: count_rows(orders_by_status),
        total_spent,
        cart_items: cart_items as i64,
        wishlist_items: wishlist_items as i64,
        unread_notifications: unread_notifications as i64,
    };
    Ok(ApiResponse::success("Summary", data, Some(Meta::empty())))
}
