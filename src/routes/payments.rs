use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::payments::{CreatePaymentRequest, PaymentOrderResponse, VerifyPaymentRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_payment))
        .route("/verify", post(verify_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments/orders",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Gateway order created", body = ApiResponse<PaymentOrderResponse>),
        (status = 400, description = "Order is not payable online"),
        (status = 409, description = "Already paid"),
        (status = 502, description = "Gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentOrderResponse>>> {
    let resp = payment_service::create_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment confirmed", body = ApiResponse<Order>),
        (status = 400, description = "Signature mismatch"),
        (status = 502, description = "Gateway not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::verify_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}
