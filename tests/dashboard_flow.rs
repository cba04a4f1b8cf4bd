mod common;

use chrono::{Duration, Utc};
use common::{approved_product, create_admin, listing, register, setup_state, status, stock_of};
use hmac::{Hmac, Mac};
use pureharvest_api::{
    dto::{
        admin::AdminUpdateUserRequest,
        cart::SetCartQuantityRequest,
        chat::{SendMessageRequest, StartConversationRequest},
        orders::CreateOrderRequest,
        payments::VerifyPaymentRequest,
        profile::CreateAddressRequest,
        reports::CountBy,
        wishlist::AddWishlistRequest,
    },
    entity::{
        enums::{NotificationKind, OrderStatus, PaymentMethod, PaymentStatus, Role},
        notifications::{ActiveModel as NotificationActive, Entity as Notifications},
        orders::{ActiveModel as OrderActive, Entity as Orders},
    },
    error::AppError,
    routes::params::{AnalyticsQuery, LowStockQuery, NotificationQuery, Pagination},
    services::{
        admin_service, cart_service, chat_service, notification_service, order_service,
        payment_service, profile_service, report_service, wishlist_service,
    },
};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use sha2::Sha256;
use uuid::Uuid;

const GATEWAY_SECRET: &str = "gateway-secret";

fn gateway_signature(gateway_order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(GATEWAY_SECRET.as_bytes()).unwrap();
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn address(label: &str, is_default: bool) -> CreateAddressRequest {
    CreateAddressRequest {
        label: label.into(),
        line1: "4 Orchard Lane".into(),
        line2: None,
        city: "Nashik".into(),
        state: "MH".into(),
        postal_code: "422001".into(),
        country: "IN".into(),
        phone: None,
        is_default,
    }
}

fn count_of(rows: &[CountBy], key: &str) -> i64 {
    rows.iter().find(|r| r.key == key).map(|r| r.count).unwrap_or(0)
}

// Integration flow: cart and wishlist rules, default address handover, cart
// checkout with online payment, notifications and their expiry, chat, and
// every dashboard aggregate.
#[tokio::test]
async fn dashboard_flow() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
        return Ok(());
    };

    let state = setup_state(
        &database_url,
        &[
            ("PAYMENT_GATEWAY_URL", "http://127.0.0.1:9"),
            ("PAYMENT_KEY_ID", "key_test"),
            ("PAYMENT_KEY_SECRET", GATEWAY_SECRET),
            ("SHIPPING_FEE", "4000"),
            ("FREE_SHIPPING_THRESHOLD", "500000"),
        ],
    )
    .await?;

    let admin = common::auth(create_admin(&state, "admin@example.com").await?, Role::Admin);
    let farmer = register(&state, "farmer@example.com", Role::Farmer).await?;
    let buyer = register(&state, "buyer@example.com", Role::Buyer).await?;
    let courier = register(&state, "courier@example.com", Role::Buyer).await?;
    admin_service::update_user(
        &state,
        &admin,
        courier.user_id,
        AdminUpdateUserRequest {
            role: Some(Role::Logistics),
            ..Default::default()
        },
    )
    .await?;
    let courier = common::auth(courier.user_id, Role::Logistics);

    let tomatoes = approved_product(&state, &farmer, &admin, listing("Tomatoes", 6_000, 10)).await?;
    let honey = approved_product(&state, &farmer, &admin, listing("Forest Honey", 45_000, 3)).await?;

    // Approval fan-out: admins hear about pending listings, the farmer about approvals
    let admin_inbox = notification_service::list_notifications(
        &state,
        &admin,
        Pagination::default(),
        NotificationQuery::default(),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(admin_inbox.items.len(), 2);
    assert!(admin_inbox.items.iter().all(|n| n.kind == NotificationKind::ProductPending));

    let farmer_inbox = notification_service::list_notifications(
        &state,
        &farmer,
        Pagination::default(),
        NotificationQuery { unread_only: Some(true) },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(farmer_inbox.unread, 2);
    assert!(farmer_inbox.items.iter().all(|n| n.kind == NotificationKind::ProductApproved));

    // Cart: stock-checked, quantity is replaced rather than added
    let too_many = cart_service::add_to_cart(
        &state,
        &buyer,
        SetCartQuantityRequest { product_id: honey.id, quantity: 4 },
    )
    .await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));

    for (product_id, quantity) in [(honey.id, 2), (honey.id, 3), (tomatoes.id, 2)] {
        cart_service::add_to_cart(&state, &buyer, SetCartQuantityRequest { product_id, quantity })
            .await?;
    }
    let cart = cart_service::list_cart(&state, &buyer).await?.data.unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.unit_count, 5);
    assert_eq!(cart.subtotal, 3 * 45_000 + 2 * 6_000);

    // Wishlist add is idempotent
    for _ in 0..2 {
        wishlist_service::add_to_wishlist(&state, &buyer, AddWishlistRequest { product_id: tomatoes.id })
            .await?;
    }
    let wishlist = wishlist_service::list_wishlist(&state, &buyer, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(wishlist.items.len(), 1);

    // Removing the default address hands the flag to the remaining one
    let home = profile_service::add_address(&state, &buyer, address("Home", false))
        .await?
        .data
        .unwrap();
    assert!(home.is_default);
    let gate = profile_service::add_address(&state, &buyer, address("Farm gate", false))
        .await?
        .data
        .unwrap();
    assert!(!gate.is_default);
    let removed = profile_service::delete_address(&state, &buyer, home.id)
        .await?
        .data
        .unwrap();
    assert_eq!(removed["default_address_id"], serde_json::json!(gate.id));

    // Cart checkout onto the promoted default address
    let placed = order_service::create_order(
        &state,
        &buyer,
        CreateOrderRequest {
            items: None,
            shipping_address: None,
            address_id: None,
            payment_method: PaymentMethod::Online,
            notes: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;
    assert_eq!(placed.subtotal, 147_000);
    assert_eq!(placed.shipping_fee, 4_000);
    assert_eq!(placed.total_amount, 151_000);
    assert_eq!(placed.shipping_address.line1, "4 Orchard Lane");
    assert_eq!(stock_of(&state, honey.id).await?, 0);
    assert_eq!(stock_of(&state, tomatoes.id).await?, 8);
    let cart = cart_service::list_cart(&state, &buyer).await?.data.unwrap();
    assert!(cart.items.is_empty());

    // Payment verification: mismatch, bad signature, success, replay
    let gateway_order_id = "order_gw_1";
    let order_row = Orders::find_by_id(placed.id).one(&state.orm).await?.unwrap();
    let mut active: OrderActive = order_row.into();
    active.gateway_order_id = Set(Some(gateway_order_id.to_string()));
    active.update(&state.orm).await?;

    let verify = |gateway_order_id: &str, payment_id: &str, signature: String| VerifyPaymentRequest {
        order_id: placed.id,
        gateway_order_id: gateway_order_id.into(),
        payment_id: payment_id.into(),
        signature,
    };

    let wrong_order = payment_service::verify_payment(
        &state,
        &buyer,
        verify("order_other", "pay_1", gateway_signature("order_other", "pay_1")),
    )
    .await;
    assert!(matches!(wrong_order, Err(AppError::BadRequest(_))));

    let forged = payment_service::verify_payment(
        &state,
        &buyer,
        verify(gateway_order_id, "pay_1", gateway_signature(gateway_order_id, "pay_2")),
    )
    .await;
    assert!(matches!(forged, Err(AppError::BadRequest(_))));
    let failed = Orders::find_by_id(placed.id).one(&state.orm).await?.unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);

    let paid = payment_service::verify_payment(
        &state,
        &buyer,
        verify(gateway_order_id, "pay_1", gateway_signature(gateway_order_id, "pay_1")),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("pay_1"));
    assert!(paid.paid_at.is_some());

    let replay = payment_service::verify_payment(
        &state,
        &buyer,
        verify(gateway_order_id, "pay_1", gateway_signature(gateway_order_id, "pay_1")),
    )
    .await?;
    assert_eq!(replay.message, "Payment already verified");

    let second_payment = payment_service::verify_payment(
        &state,
        &buyer,
        verify(gateway_order_id, "pay_2", gateway_signature(gateway_order_id, "pay_2")),
    )
    .await;
    assert!(matches!(second_payment, Err(AppError::Conflict(_))));

    // Expired notifications are hidden, excluded from counts and purged
    NotificationActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(buyer.user_id),
        kind: Set(NotificationKind::OrderStatus),
        title: Set("Stale".into()),
        message: Set("Long gone".into()),
        data: Set(None),
        is_read: Set(false),
        read_at: Set(None),
        expires_at: Set(Some((Utc::now() - Duration::days(1)).into())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let buyer_inbox = notification_service::list_notifications(
        &state,
        &buyer,
        Pagination::default(),
        NotificationQuery::default(),
    )
    .await?
    .data
    .unwrap();
    assert!(buyer_inbox.items.iter().all(|n| n.title != "Stale"));
    let kinds: Vec<NotificationKind> = buyer_inbox.items.iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&NotificationKind::OrderPlaced));
    assert!(kinds.contains(&NotificationKind::Payment));

    let summary = report_service::buyer_summary(&state, &buyer).await?.data.unwrap();
    assert_eq!(summary.unread_notifications, buyer_inbox.unread as i64);
    assert_eq!(count_of(&summary.orders_by_status, "pending"), 1);
    assert_eq!(summary.total_spent, 151_000);
    assert_eq!(summary.cart_items, 0);
    assert_eq!(summary.wishlist_items, 1);

    let purged = notification_service::purge_expired(&state.orm).await?;
    assert_eq!(purged, 1);
    let remaining = Notifications::find().all(&state.orm).await?;
    assert!(remaining.iter().all(|n| n.title != "Stale"));

    // Chat: one conversation per pair, unread counts, reading marks messages
    let to_self = chat_service::send_message(
        &state,
        &buyer,
        SendMessageRequest { recipient_id: buyer.user_id, content: "hi me".into() },
    )
    .await;
    assert!(matches!(to_self, Err(AppError::BadRequest(_))));
    let blank = chat_service::send_message(
        &state,
        &buyer,
        SendMessageRequest { recipient_id: farmer.user_id, content: "   ".into() },
    )
    .await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let first = chat_service::send_message(
        &state,
        &buyer,
        SendMessageRequest {
            recipient_id: farmer.user_id,
            content: "Are the tomatoes organic?".into(),
        },
    )
    .await?
    .data
    .unwrap();
    let opened = chat_service::start_conversation(
        &state,
        &farmer,
        StartConversationRequest { participant_id: buyer.user_id },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(opened.id, first.conversation_id);
    chat_service::send_message(
        &state,
        &buyer,
        SendMessageRequest {
            recipient_id: farmer.user_id,
            content: "And the honey?".into(),
        },
    )
    .await?;

    let conversations = chat_service::list_conversations(&state, &farmer, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(conversations.items.len(), 1);
    let summary = &conversations.items[0];
    assert_eq!(summary.unread_count, 2);
    assert_eq!(summary.participant.as_ref().map(|p| p.id), Some(buyer.user_id));
    assert_eq!(
        summary.last_message.as_ref().map(|m| m.content.as_str()),
        Some("And the honey?")
    );

    let messages = chat_service::list_messages(&state, &farmer, opened.id, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(messages.items.len(), 2);
    assert_eq!(messages.items[0].content, "And the honey?");
    assert!(messages.items.iter().all(|m| m.read_at.is_some()));

    let conversations = chat_service::list_conversations(&state, &farmer, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(conversations.items[0].unread_count, 0);

    let outsider = chat_service::list_messages(&state, &courier, opened.id, Pagination::default()).await;
    assert!(matches!(outsider, Err(AppError::NotFound)));

    // Logistics queue only holds orders a farmer has confirmed
    let queue = order_service::list_logistics_queue(&state, &courier, Pagination::default())
        .await?
        .data
        .unwrap();
    assert!(queue.items.is_empty());
    order_service::update_order_status(&state, &farmer, placed.id, status(OrderStatus::Confirmed))
        .await?;
    let queue = order_service::list_logistics_queue(&state, &courier, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(queue.items.len(), 1);
    assert_eq!(queue.items[0].id, placed.id);

    // Farmer dashboard
    let farmer_stats = report_service::farmer_analytics(&state, &farmer, LowStockQuery::default())
        .await?
        .data
        .unwrap();
    assert_eq!(farmer_stats.total_revenue, 147_000);
    assert_eq!(farmer_stats.units_sold, 5);
    assert_eq!(farmer_stats.order_count, 1);
    assert_eq!(farmer_stats.active_listings, 2);
    assert_eq!(farmer_stats.pending_listings, 0);
    assert_eq!(farmer_stats.top_products.len(), 2);
    assert_eq!(farmer_stats.top_products[0].product_id, honey.id);
    assert_eq!(farmer_stats.top_products[0].units_sold, 3);
    assert_eq!(farmer_stats.top_products[0].revenue, 135_000);
    let low: Vec<Uuid> = farmer_stats.low_stock.iter().map(|p| p.id).collect();
    assert_eq!(low, vec![honey.id]);

    // Admin dashboard
    let admin_stats = report_service::admin_analytics(&state, &admin, AnalyticsQuery { days: Some(7) })
        .await?
        .data
        .unwrap();
    assert_eq!(count_of(&admin_stats.users_by_role, "admin"), 1);
    assert_eq!(count_of(&admin_stats.users_by_role, "farmer"), 1);
    assert_eq!(count_of(&admin_stats.users_by_role, "buyer"), 1);
    assert_eq!(count_of(&admin_stats.users_by_role, "logistics"), 1);
    assert_eq!(admin_stats.active_products, 2);
    assert_eq!(admin_stats.pending_products, 0);
    assert_eq!(count_of(&admin_stats.orders_by_status, "confirmed"), 1);
    assert_eq!(admin_stats.total_revenue, 151_000);
    assert_eq!(admin_stats.daily.len(), 1);
    assert_eq!(admin_stats.daily[0].orders, 1);
    assert_eq!(admin_stats.daily[0].revenue, 151_000);
    assert_eq!(admin_stats.top_products.len(), 2);

    // Role gates on the dashboards
    assert!(matches!(
        report_service::admin_analytics(&state, &farmer, AnalyticsQuery::default()).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        report_service::buyer_summary(&state, &farmer).await,
        Err(AppError::Forbidden)
    ));

    Ok(())
}
