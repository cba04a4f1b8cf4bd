use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType, Query};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        addresses::{Column as AddrCol, Entity as Addresses},
        cart_items::{Column as CartCol, Entity as CartItems},
        enums::{NotificationKind, OrderStatus, PaymentMethod, PaymentStatus, Role},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        order_status_history::{ActiveModel as HistoryActive, Column as HistoryCol, Entity as OrderStatusHistory},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{Order, OrderItem, ShippingAddress, StatusHistoryEntry},
    notify::{self, NewNotification},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    state::AppState,
};

pub fn order_dto(model: OrderModel) -> AppResult<Order> {
    Order::try_from(model).map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt order row: {e}")))
}

/// Validate requested lines and merge repeated products, keeping first-seen order.
pub fn merge_lines(lines: &[OrderLineRequest]) -> AppResult<Vec<(Uuid, i32)>> {
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "quantity for product {} must be greater than 0",
                line.product_id
            )));
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => {
                *qty = qty.checked_add(line.quantity).ok_or_else(|| {
                    AppError::BadRequest("quantity is too large".into())
                })?
            }
            None => merged.push((line.product_id, line.quantity)),
        }
    }
    Ok(merged)
}

pub fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let simple = order_id.simple().to_string().to_uppercase();
    format!("PH-{}-{}", date, &simple[..8])
}

/// Whether `actor` may move an order from `current` to `next`.
/// Actors unrelated to the order get `NotFound` so its existence is not leaked.
pub fn authorize_status_change(
    actor: &AuthUser,
    buyer_id: Uuid,
    farmer_ids: &[Uuid],
    current: OrderStatus,
    next: OrderStatus,
) -> AppResult<()> {
    let involved = match actor.role {
        Role::Admin | Role::Logistics => true,
        Role::Buyer => actor.user_id == buyer_id,
        Role::Farmer => farmer_ids.contains(&actor.user_id),
    };
    if !involved {
        return Err(AppError::NotFound);
    }
    if current == next || current.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Order is already {}",
            current.as_str()
        )));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }
    if !actor.role.may_request(next) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn farmer_order_ids(farmer_id: Uuid) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column(OrderItemCol::OrderId)
        .from(OrderItems)
        .and_where(Expr::col(OrderItemCol::FarmerId).eq(farmer_id))
        .to_owned()
}

/// Orders the user may see: buyers their own, farmers those holding their items.
fn scoped_orders(user: &AuthUser) -> Select<Orders> {
    match user.role {
        Role::Admin | Role::Logistics => Orders::find(),
        Role::Buyer => Orders::find().filter(OrderCol::BuyerId.eq(user.user_id)),
        Role::Farmer => Orders::find().filter(OrderCol::Id.in_subquery(farmer_order_ids(user.user_id))),
    }
}

fn visible_items(user: &AuthUser, items: Vec<OrderItemModel>) -> Vec<OrderItem> {
    items
        .into_iter()
        .filter(|item| user.role != Role::Farmer || item.farmer_id == user.user_id)
        .map(OrderItem::from)
        .collect()
}

async fn load_details<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?;

    let history = OrderStatusHistory::find()
        .filter(HistoryCol::OrderId.eq(order.id))
        .order_by_asc(HistoryCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(StatusHistoryEntry::from)
        .collect();

    Ok(OrderWithItems {
        order: order_dto(order)?,
        items: visible_items(user, items),
        history,
    })
}

async fn resolve_shipping_address(
    state: &AppState,
    user: &AuthUser,
    payload: &CreateOrderRequest,
) -> AppResult<ShippingAddress> {
    if let Some(address) = &payload.shipping_address {
        if let Some(field) = address.missing_field() {
            return Err(AppError::BadRequest(format!(
                "shipping_address.{field} is required"
            )));
        }
        return Ok(address.clone());
    }

    let mut finder = Addresses::find().filter(AddrCol::UserId.eq(user.user_id));
    finder = match payload.address_id {
        Some(address_id) => finder.filter(AddrCol::Id.eq(address_id)),
        None => finder.filter(AddrCol::IsDefault.eq(true)),
    };
    let saved = finder
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("shipping address is required".into()))?;

    let buyer = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ShippingAddress::from_saved(&saved, &buyer.name))
}

fn amount_too_large() -> AppError {
    AppError::BadRequest("Order amount is too large".into())
}

/// `price * quantity` in minor units.
pub fn line_total(price: i64, quantity: i32) -> AppResult<i64> {
    price
        .checked_mul(i64::from(quantity))
        .ok_or_else(amount_too_large)
}

pub fn add_amounts(a: i64, b: i64) -> AppResult<i64> {
    a.checked_add(b).ok_or_else(amount_too_large)
}

/// Checkout. Stock checks, order rows and stock decrements share one transaction.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_role(user, &[Role::Buyer])?;
    let shipping_address = resolve_shipping_address(state, user, &payload).await?;
    let notes = payload.notes.clone().filter(|n| !n.trim().is_empty());

    let txn = state.orm.begin().await?;

    let lines = match payload.items.as_deref() {
        Some(lines) if !lines.is_empty() => merge_lines(lines)?,
        _ => CartItems::find()
            .filter(CartCol::UserId.eq(user.user_id))
            .order_by_asc(CartCol::CreatedAt)
            .all(&txn)
            .await?
            .into_iter()
            .map(|item| (item.product_id, item.quantity))
            .collect(),
    };
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let mut product_ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
    product_ids.sort();

    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids.clone()))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut subtotal: i64 = 0;
    for (product_id, quantity) in &lines {
        let product = products
            .get(product_id)
            .filter(|p| p.is_active && p.deleted_at.is_none())
            .ok_or_else(|| {
                AppError::BadRequest(format!("Product {product_id} is not available"))
            })?;
        if product.quantity < *quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}: {} {} left",
                product.name, product.quantity, product.unit
            )));
        }
        subtotal = add_amounts(subtotal, line_total(product.price, *quantity)?)?;
    }

    let shipping_fee = state.config.shipping_fee_for(subtotal);
    let total_amount = add_amounts(subtotal, shipping_fee)?;
    let order_id = Uuid::new_v4();

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id)),
        buyer_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        payment_status: Set(PaymentStatus::Unpaid),
        payment_method: Set(payload.payment_method),
        subtotal: Set(subtotal),
        shipping_fee: Set(shipping_fee),
        total_amount: Set(total_amount),
        shipping_address: Set(serde_json::to_value(&shipping_address)
            .map_err(|e| AppError::Internal(e.into()))?),
        notes: Set(notes),
        gateway_order_id: Set(None),
        payment_reference: Set(None),
        paid_at: Set(None),
        delivered_at: Set(None),
        cancelled_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut farmer_ids: Vec<Uuid> = Vec::new();
    for (product_id, quantity) in &lines {
        let product = &products[product_id];
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            farmer_id: Set(product.farmer_id),
            product_name: Set(product.name.clone()),
            unit: Set(product.unit.clone()),
            quantity: Set(*quantity),
            price: Set(product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        // guarded decrement: never below zero even if the lock was bypassed
        let updated = Products::update_many()
            .col_expr(ProdCol::Quantity, Expr::col(ProdCol::Quantity).sub(*quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(product.id))
            .filter(ProdCol::Quantity.gte(*quantity))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }

        if !farmer_ids.contains(&product.farmer_id) {
            farmer_ids.push(product.farmer_id);
        }
    }

    HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        status: Set(OrderStatus::Pending),
        note: Set(Some("Order placed".into())),
        changed_by: Set(Some(user.user_id)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.is_in(product_ids))
        .exec(&txn)
        .await?;

    let details = load_details(&txn, user, order).await?;
    txn.commit().await?;

    let order = &details.order;
    tracing::info!(order_id = %order.id, total = order.total_amount, "order placed");
    audit::record(
        &state.pool,
        user.user_id,
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    let data = serde_json::json!({ "order_id": order.id, "order_number": order.order_number });
    notify::dispatch(
        state,
        &[user.user_id],
        NewNotification::new(
            NotificationKind::OrderPlaced,
            "Order placed",
            format!("Your order {} has been placed", order.order_number),
        )
        .with_data(data.clone()),
    )
    .await;
    notify::dispatch(
        state,
        &farmer_ids,
        NewNotification::new(
            NotificationKind::NewOrder,
            "New order received",
            format!("Order {} includes your produce", order.order_number),
        )
        .with_data(data),
    )
    .await;

    Ok(ApiResponse::success("Order placed", details, Some(Meta::empty())))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let page = pagination.normalize();
    let mut finder = scoped_orders(user);
    if let Some(status) = query.status {
        finder = finder.filter(OrderCol::Status.eq(status));
    }

    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await?;

    let orders = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_dto)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::paged(&page, total)),
    ))
}

/// Deliveries waiting on logistics, oldest first.
pub async fn list_logistics_queue(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_role(user, &[Role::Logistics, Role::Admin])?;
    let page = pagination.normalize();

    let finder = Orders::find()
        .filter(OrderCol::Status.is_in([
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ]))
        .order_by_asc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let orders = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_dto)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Delivery queue",
        OrderList { items: orders },
        Some(Meta::paged(&page, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = scoped_orders(user)
        .filter(OrderCol::Id.eq(id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let details = load_details(&state.orm, user, order).await?;
    Ok(ApiResponse::success("OK", details, Some(Meta::empty())))
}

/// Apply one step of the transition table. Cancellation restores stock in the
/// same transaction as the status change.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let next = payload.status;
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(Condition::all().add(OrderCol::Id.eq(id)))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    let mut farmer_ids: Vec<Uuid> = items.iter().map(|i| i.farmer_id).collect();
    farmer_ids.sort();
    farmer_ids.dedup();

    let previous = order.status;
    authorize_status_change(user, order.buyer_id, &farmer_ids, previous, next)?;

    if next == OrderStatus::Cancelled {
        for item in &items {
            Products::update_many()
                .col_expr(ProdCol::Quantity, Expr::col(ProdCol::Quantity).add(item.quantity))
                .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }
    }

    let buyer_id = order.buyer_id;
    let order_number = order.order_number.clone();
    let payment_method = order.payment_method;
    let payment_status = order.payment_status;
    let now = Utc::now();

    let mut active: OrderActive = order.into();
    active.status = Set(next);
    active.updated_at = Set(now.into());
    match next {
        OrderStatus::Delivered => {
            active.delivered_at = Set(Some(now.into()));
            if payment_method == PaymentMethod::Cod && payment_status != PaymentStatus::Paid {
                active.payment_status = Set(PaymentStatus::Paid);
                active.paid_at = Set(Some(now.into()));
            }
        }
        OrderStatus::Cancelled => {
            active.cancelled_at = Set(Some(now.into()));
            if payment_status == PaymentStatus::Paid {
                active.payment_status = Set(PaymentStatus::RefundPending);
            }
        }
        _ => {}
    }
    let order = active.update(&txn).await?;

    HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        status: Set(next),
        note: Set(payload.note.filter(|n| !n.trim().is_empty())),
        changed_by: Set(Some(user.user_id)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let details = load_details(&txn, user, order).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %id,
        from = previous.as_str(),
        to = next.as_str(),
        actor = %user.user_id,
        "order status changed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": id, "from": previous, "to": next }),
    )
    .await;

    let data = serde_json::json!({ "order_id": id, "order_number": order_number, "status": next });
    if user.user_id != buyer_id {
        notify::dispatch(
            state,
            &[buyer_id],
            NewNotification::new(
                NotificationKind::OrderStatus,
                "Order update",
                format!("Order {} is now {}", order_number, next.as_str()),
            )
            .with_data(data.clone()),
        )
        .await;
    }
    if next == OrderStatus::Cancelled {
        let farmers: Vec<Uuid> = farmer_ids
            .into_iter()
            .filter(|f| *f != user.user_id)
            .collect();
        notify::dispatch(
            state,
            &farmers,
            NewNotification::new(
                NotificationKind::OrderStatus,
                "Order cancelled",
                format!("Order {order_number} was cancelled"),
            )
            .with_data(data),
        )
        .await;
    }

    Ok(ApiResponse::success("Order updated", details, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: "actor@example.com".into(),
            role,
        }
    }

    fn line(product_id: Uuid, quantity: i32) -> OrderLineRequest {
        OrderLineRequest { product_id, quantity }
    }

    #[test]
    fn merge_lines_sums_repeated_products() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[line(a, 2), line(b, 1), line(a, 3)]).unwrap();
        assert_eq!(merged, vec![(a, 5), (b, 1)]);
    }

    #[test]
    fn oversized_amounts_are_rejected_not_wrapped() {
        assert_eq!(line_total(2_500, 4).unwrap(), 10_000);
        assert!(matches!(
            line_total(i64::MAX / 2, 3),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            add_amounts(i64::MAX, 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn merge_lines_rejects_non_positive_quantity() {
        assert!(merge_lines(&[line(Uuid::new_v4(), 0)]).is_err());
    }

    #[test]
    fn order_number_format() {
        let number = build_order_number(Uuid::new_v4());
        assert!(number.starts_with("PH-"));
        assert_eq!(number.len(), "PH-20250101-ABCDEF12".len());
    }

    #[test]
    fn admin_cannot_reopen_delivered_order() {
        let admin = actor(Role::Admin);
        let err = authorize_status_change(
            &admin,
            Uuid::new_v4(),
            &[],
            OrderStatus::Delivered,
            OrderStatus::Pending,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn buyer_may_cancel_own_pending_order_only() {
        let buyer = actor(Role::Buyer);
        assert!(
            authorize_status_change(
                &buyer,
                buyer.user_id,
                &[],
                OrderStatus::Pending,
                OrderStatus::Cancelled
            )
            .is_ok()
        );
        assert!(matches!(
            authorize_status_change(
                &buyer,
                buyer.user_id,
                &[],
                OrderStatus::Pending,
                OrderStatus::Confirmed
            ),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            authorize_status_change(
                &buyer,
                Uuid::new_v4(),
                &[],
                OrderStatus::Pending,
                OrderStatus::Cancelled
            ),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn farmer_needs_items_in_the_order() {
        let farmer = actor(Role::Farmer);
        let buyer = Uuid::new_v4();
        assert!(
            authorize_status_change(
                &farmer,
                buyer,
                &[farmer.user_id],
                OrderStatus::Pending,
                OrderStatus::Confirmed
            )
            .is_ok()
        );
        assert!(matches!(
            authorize_status_change(
                &farmer,
                buyer,
                &[Uuid::new_v4()],
                OrderStatus::Pending,
                OrderStatus::Confirmed
            ),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn logistics_delivers_shipped_orders() {
        let courier = actor(Role::Logistics);
        assert!(
            authorize_status_change(
                &courier,
                Uuid::new_v4(),
                &[],
                OrderStatus::Shipped,
                OrderStatus::Delivered
            )
            .is_ok()
        );
        assert!(matches!(
            authorize_status_change(
                &courier,
                Uuid::new_v4(),
                &[],
                OrderStatus::Pending,
                OrderStatus::Cancelled
            ),
            Err(AppError::Forbidden)
        ));
    }
}
