use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use crate::{
    audit,
    dto::payments::{CreatePaymentRequest, PaymentOrderResponse, VerifyPaymentRequest},
    entity::{
        enums::{NotificationKind, OrderStatus, PaymentMethod, PaymentStatus, Role},
        orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::Order,
    notify::{self, NewNotification},
    response::{ApiResponse, Meta},
    services::order_service::order_dto,
    state::AppState,
};

async fn own_online_order(
    state: &AppState,
    user: &AuthUser,
    order_id: uuid::Uuid,
) -> AppResult<OrderModel> {
    ensure_role(user, &[Role::Buyer])?;
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .filter(|o| o.buyer_id == user.user_id)
        .ok_or(AppError::NotFound)?;

    if order.payment_method != PaymentMethod::Online {
        return Err(AppError::BadRequest(
            "Order is not set up for online payment".into(),
        ));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest("Order is cancelled".into()));
    }
    Ok(order)
}

pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<PaymentOrderResponse>> {
    let order = own_online_order(state, user, payload.order_id).await?;
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Order is already paid".into()));
    }

    let gateway_order = state
        .payments
        .create_order(order.total_amount, &order.order_number)
        .await?;

    let order_id = order.id;
    let mut active: OrderActive = order.into();
    active.gateway_order_id = Set(Some(gateway_order.id.clone()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    tracing::info!(order_id = %order_id, gateway_order_id = %gateway_order.id, "payment order created");

    let data = PaymentOrderResponse {
        order_id,
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
        key_id: state.payments.key_id()?.to_string(),
    };
    Ok(ApiResponse::success("Payment order created", data, Some(Meta::empty())))
}

pub async fn verify_payment(
    state: &AppState,
    user: &AuthUser,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = own_online_order(state, user, payload.order_id).await?;

    if order.gateway_order_id.as_deref() != Some(payload.gateway_order_id.as_str()) {
        return Err(AppError::BadRequest(
            "gateway_order_id does not match this order".into(),
        ));
    }
    if order.payment_status == PaymentStatus::Paid {
        if order.payment_reference.as_deref() == Some(payload.payment_id.as_str()) {
            return Ok(ApiResponse::success("Payment already verified", order_dto(order)?, None));
        }
        return Err(AppError::Conflict("Order is already paid".into()));
    }

    let valid = state.payments.verify_signature(
        &payload.gateway_order_id,
        &payload.payment_id,
        &payload.signature,
    )?;

    let order_id = order.id;
    let order_number = order.order_number.clone();
    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.updated_at = Set(now.into());
    if valid {
        active.payment_status = Set(PaymentStatus::Paid);
        active.paid_at = Set(Some(now.into()));
        active.payment_reference = Set(Some(payload.payment_id.clone()));
    } else {
        active.payment_status = Set(PaymentStatus::Failed);
    }
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        if valid { "payment_verified" } else { "payment_failed" },
        "orders",
        serde_json::json!({ "order_id": order_id, "payment_id": payload.payment_id }),
    )
    .await;

    if !valid {
        tracing::warn!(order_id = %order_id, "payment signature mismatch");
        return Err(AppError::BadRequest("Invalid payment signature".into()));
    }

    notify::dispatch(
        state,
        &[user.user_id],
        NewNotification::new(
            NotificationKind::Payment,
            "Payment received",
            format!("Payment for order {order_number} was confirmed"),
        )
        .with_data(serde_json::json!({ "order_id": order_id })),
    )
    .await;

    Ok(ApiResponse::success("Payment verified", order_dto(updated)?, Some(Meta::empty())))
}
