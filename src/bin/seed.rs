use pureharvest_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::enums::Role,
    services::{auth_service::hash_password, product_service::slugify},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let admin_id = ensure_user(pool, "admin@pureharvest.test", "admin12345", "Site Admin", Role::Admin, None).await?;
    let farmer_id = ensure_user(
        pool,
        "farmer@pureharvest.test",
        "farmer12345",
        "Asha Patil",
        Role::Farmer,
        Some("Green Valley Farm"),
    )
    .await?;
    let buyer_id = ensure_user(pool, "buyer@pureharvest.test", "buyer12345", "Ravi Kumar", Role::Buyer, None).await?;
    ensure_user(pool, "courier@pureharvest.test", "courier12345", "Swift Couriers", Role::Logistics, None).await?;
    seed_products(pool, farmer_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, Farmer ID: {farmer_id}, Buyer ID: {buyer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
    farm_name: Option<&str>,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role, farm_name, is_verified)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role.as_str())
    .bind(farm_name)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool, farmer_id: Uuid) -> anyhow::Result<()> {
    // (name, category, unit, price in paise, quantity, organic)
    let products = vec![
        ("Alphonso Mangoes", "fruits", "dozen", 90000, 40, true),
        ("Heirloom Tomatoes", "vegetables", "kg", 6000, 120, true),
        ("Fresh Spinach", "vegetables", "bunch", 2500, 80, false),
        ("Farm Eggs", "dairy", "tray", 21000, 30, false),
        ("Raw Forest Honey", "pantry", "jar", 45000, 25, true),
    ];

    for (name, category, unit, price, quantity, organic) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, farmer_id, name, slug, category, unit, price, quantity, is_active, is_organic)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(farmer_id)
        .bind(name)
        .bind(slugify(name))
        .bind(category)
        .bind(unit)
        .bind(price as i64)
        .bind(quantity as i32)
        .bind(organic)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
