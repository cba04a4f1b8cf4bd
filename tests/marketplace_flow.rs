mod common;

use common::{auth, create_admin, order_request, setup_state, signup, status, stock_of};
use pureharvest_api::{
    dto::{
        admin::ProductApprovalRequest, auth::LoginRequest, products::CreateProductRequest,
        reviews::CreateReviewRequest,
    },
    entity::{
        enums::{OrderStatus, PaymentStatus, Role},
        products::Entity as Products,
    },
    error::AppError,
    routes::params::{Pagination, ProductQuery},
    services::{admin_service, auth_service, order_service, product_service, review_service},
};
use sea_orm::EntityTrait;

// Integration flow: signup/login rules, approval gate, checkout with stock
// restore on cancel, the status table, and one review per order line.
#[tokio::test]
async fn marketplace_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let Some(database_url) = common::database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
        return Ok(());
    };

    let state = setup_state(&database_url, &[]).await?;

    // Accounts
    let buyer = auth_service::signup(&state, signup("buyer@example.com", None))
        .await?
        .data
        .unwrap();
    let duplicate = auth_service::signup(&state, signup("Buyer@Example.com", None)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let farmer = auth_service::signup(&state, signup("farmer@example.com", Some(Role::Farmer)))
        .await?
        .data
        .unwrap();
    let admin_id = create_admin(&state, "admin@example.com").await?;

    let wrong_password = auth_service::login(
        &state,
        LoginRequest {
            email: "buyer@example.com".into(),
            password: "not-the-password".into(),
        },
    )
    .await;
    let unknown_email = auth_service::login(
        &state,
        LoginRequest {
            email: "nobody@example.com".into(),
            password: "whatever123".into(),
        },
    )
    .await;
    match (wrong_password, unknown_email) {
        (Err(AppError::Unauthorized(a)), Err(AppError::Unauthorized(b))) => assert_eq!(a, b),
        other => panic!("expected two identical 401s, got {other:?}"),
    }

    let login = auth_service::login(
        &state,
        LoginRequest {
            email: "buyer@example.com".into(),
            password: "harvest-pass".into(),
        },
    )
    .await?;
    assert_eq!(login.data.unwrap().token_type, "Bearer");

    let buyer_auth = auth(buyer.id, Role::Buyer);
    let farmer_auth = auth(farmer.id, Role::Farmer);
    let admin_auth = auth(admin_id, Role::Admin);

    // Listing stays hidden until approved
    let product = product_service::create_product(
        &state,
        &farmer_auth,
        CreateProductRequest {
            name: "Heirloom Tomatoes".into(),
            description: Some("Vine ripened".into()),
            category: "vegetables".into(),
            unit: "kg".into(),
            price: 6000,
            quantity: 10,
            is_organic: true,
            images: vec![],
        },
    )
    .await?
    .data
    .unwrap();
    assert!(!product.is_active);
    assert!(matches!(
        product_service::get_product(&state, product.id).await,
        Err(AppError::NotFound)
    ));
    let public = product_service::list_products(&state, Pagination::new(1, 50), ProductQuery::default())
        .await?
        .data
        .unwrap();
    assert!(public.items.iter().all(|p| p.id != product.id));

    admin_service::set_product_approval(
        &state,
        &admin_auth,
        product.id,
        ProductApprovalRequest {
            is_active: true,
            reason: None,
        },
    )
    .await?;
    product_service::get_product(&state, product.id).await?;

    // Checkout then cancel restores stock exactly
    let placed = order_service::create_order(&state, &buyer_auth, order_request(product.id, 3))
        .await?
        .data
        .unwrap();
    assert_eq!(placed.order.subtotal, 18_000);
    assert_eq!(stock_of(&state, product.id).await?, 7);

    let buyer_confirm = order_service::update_order_status(
        &state,
        &buyer_auth,
        placed.order.id,
        status(OrderStatus::Confirmed),
    )
    .await;
    assert!(matches!(buyer_confirm, Err(AppError::Forbidden)));

    let cancelled = order_service::update_order_status(
        &state,
        &buyer_auth,
        placed.order.id,
        status(OrderStatus::Cancelled),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.history.len(), 2);
    assert_eq!(stock_of(&state, product.id).await?, 10);

    // Full lifecycle on a second order
    let order = order_service::create_order(&state, &buyer_auth, order_request(product.id, 2))
        .await?
        .data
        .unwrap()
        .order;
    for (actor, next) in [
        (&farmer_auth, OrderStatus::Confirmed),
        (&farmer_auth, OrderStatus::Processing),
        (&farmer_auth, OrderStatus::Shipped),
        (&admin_auth, OrderStatus::Delivered),
    ] {
        order_service::update_order_status(&state, actor, order.id, status(next)).await?;
    }
    let delivered = order_service::get_order(&state, &buyer_auth, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert_eq!(delivered.order.payment_status, PaymentStatus::Paid);
    assert_eq!(stock_of(&state, product.id).await?, 8);

    let reopen = order_service::update_order_status(
        &state,
        &admin_auth,
        order.id,
        status(OrderStatus::Pending),
    )
    .await;
    assert!(matches!(reopen, Err(AppError::BadRequest(_))));

    // One review per product and order
    let review = || CreateReviewRequest {
        product_id: product.id,
        order_id: order.id,
        rating: 4,
        comment: Some("Tasty".into()),
    };
    review_service::create_review(&state, &buyer_auth, review()).await?;
    let again = review_service::create_review(&state, &buyer_auth, review()).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let rated = Products::find_by_id(product.id).one(&state.orm).await?.unwrap();
    assert_eq!(rated.rating_count, 1);
    assert_eq!(rated.rating_average, 4.0);

    Ok(())
}
