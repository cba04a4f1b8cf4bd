use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod dashboard;
pub mod doc;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod profile;
pub mod reviews;
pub mod uploads;
pub mod wishlist;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/profile", profile::router())
        .nest("/products", products::router())
        .nest("/farmer", dashboard::farmer_router())
        .nest("/buyer", dashboard::buyer_router())
        .nest("/logistics", dashboard::logistics_router())
        .nest("/cart", cart::router())
        .nest("/wishlist", wishlist::router())
        .nest("/orders", orders::router())
        .nest("/reviews", reviews::router())
        .nest("/chat", chat::router())
        .nest("/notifications", notifications::router())
        .nest("/uploads", uploads::router(max_upload_bytes))
        .nest("/payments", payments::router())
        .nest("/admin", admin::router())
}
