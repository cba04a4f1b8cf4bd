#![allow(dead_code)]

use std::collections::HashMap;

use pureharvest_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::{
        admin::ProductApprovalRequest,
        auth::SignupRequest,
        orders::{CreateOrderRequest, OrderLineRequest, UpdateOrderStatusRequest},
        products::CreateProductRequest,
    },
    entity::{
        enums::{OrderStatus, PaymentMethod, Role},
        products::Entity as Products,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    models::{Product, ShippingAddress},
    services::{admin_service, auth_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

pub const PASSWORD: &str = "harvest-pass";

/// `TEST_DATABASE_URL`, then `DATABASE_URL`; `None` means the DB flows are skipped.
pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

/// Migrated, emptied database plus app state. `extra` adds config vars.
pub async fn setup_state(database_url: &str, extra: &[(&str, &str)]) -> anyhow::Result<AppState> {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), database_url.to_string()),
        ("JWT_SECRET".to_string(), "integration-secret".to_string()),
        ("UPLOAD_STORAGE".to_string(), "database".to_string()),
    ]);
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned())?;

    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE messages, conversations, notifications, reviews, order_status_history, \
         order_items, orders, cart_items, wishlist_items, uploads, audit_logs, products, \
         addresses, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState::new(orm, config))
}

pub fn signup(email: &str, role: Option<Role>) -> SignupRequest {
    SignupRequest {
        email: email.into(),
        password: PASSWORD.into(),
        name: "Test User".into(),
        phone: None,
        role,
        farm_name: role.filter(|r| *r == Role::Farmer).map(|_| "Test Farm".into()),
    }
}

pub async fn register(state: &AppState, email: &str, role: Role) -> anyhow::Result<AuthUser> {
    let user = auth_service::signup(state, signup(email, Some(role)))
        .await?
        .data
        .ok_or_else(|| anyhow::anyhow!("signup returned no user"))?;
    Ok(auth(user.id, role))
}

pub fn auth(user_id: Uuid, role: Role) -> AuthUser {
    AuthUser {
        user_id,
        email: format!("{user_id}@example.com"),
        role,
    }
}

pub async fn create_admin(state: &AppState, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(auth_service::hash_password("admin-pass")?),
        name: Set("Admin".into()),
        phone: Set(None),
        role: Set(Role::Admin),
        farm_name: Set(None),
        is_active: Set(true),
        is_verified: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

pub fn listing(name: &str, price: i64, quantity: i32) -> CreateProductRequest {
    CreateProductRequest {
        name: name.into(),
        description: Some("Fresh from the field".into()),
        category: "vegetables".into(),
        unit: "kg".into(),
        price,
        quantity,
        is_organic: true,
        images: vec![],
    }
}

/// Creates a listing as `farmer` and approves it as `admin`.
pub async fn approved_product(
    state: &AppState,
    farmer: &AuthUser,
    admin: &AuthUser,
    request: CreateProductRequest,
) -> anyhow::Result<Product> {
    let product = product_service::create_product(state, farmer, request)
        .await?
        .data
        .ok_or_else(|| anyhow::anyhow!("no product"))?;
    let approved = admin_service::set_product_approval(
        state,
        admin,
        product.id,
        ProductApprovalRequest {
            is_active: true,
            reason: None,
        },
    )
    .await?
    .data
    .ok_or_else(|| anyhow::anyhow!("no product"))?;
    Ok(approved)
}

pub fn status(next: OrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: next,
        note: None,
    }
}

pub fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Test Buyer".into(),
        line1: "12 Market Road".into(),
        line2: None,
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411001".into(),
        country: "IN".into(),
        phone: None,
    }
}

pub fn order_request(product_id: Uuid, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        items: Some(vec![OrderLineRequest {
            product_id,
            quantity,
        }]),
        shipping_address: Some(shipping_address()),
        address_id: None,
        payment_method: PaymentMethod::Cod,
        notes: None,
    }
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product vanished"))?;
    Ok(product.quantity)
}
