use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::{
        orders::OrderList,
        products::ProductList,
        reports::{BuyerSummary, FarmerAnalytics},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{LowStockQuery, Pagination},
    services::{order_service, product_service, report_service},
    state::AppState,
};

pub fn farmer_router() -> Router<AppState> {
    Router::new()
        .route("/products", get(farmer_products))
        .route("/analytics", get(farmer_analytics))
}

pub fn buyer_router() -> Router<AppState> {
    Router::new().route("/summary", get(buyer_summary))
}

pub fn logistics_router() -> Router<AppState> {
    Router::new().route("/orders", get(logistics_queue))
}

#[utoipa::path(
    get,
    path = "/api/farmer/products",
    params(Pagination),
    responses(
        (status = 200, description = "Own listings, approved or not", body = ApiResponse<ProductList>),
        (status = 403, description = "Farmers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Farmer"
)]
pub async fn farmer_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_farmer_products(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/farmer/analytics",
    params(LowStockQuery),
    responses(
        (status = 200, description = "Sales and stock overview", body = ApiResponse<FarmerAnalytics>),
        (status = 403, description = "Farmers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Farmer"
)]
pub async fn farmer_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<FarmerAnalytics>>> {
    let resp = report_service::farmer_analytics(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/buyer/summary",
    responses(
        (status = 200, description = "Buyer dashboard", body = ApiResponse<BuyerSummary>),
        (status = 403, description = "Buyers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Buyer"
)]
pub async fn buyer_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BuyerSummary>>> {
    let resp = report_service::buyer_summary(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/logistics/orders",
    params(Pagination),
    responses(
        (status = 200, description = "Orders awaiting shipment or delivery", body = ApiResponse<OrderList>),
        (status = 403, description = "Logistics and admins only")
    ),
    security(("bearer_auth" = [])),
    tag = "Logistics"
)]
pub async fn logistics_queue(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_logistics_queue(&state, &user, pagination).await?;
    Ok(Json(resp))
}
