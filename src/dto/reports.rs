use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Serialize, ToSchema)]
pub struct CountBy {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub units_sold: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminAnalytics {
    pub users_by_role: Vec<CountBy>,
    pub active_products: i64,
    pub pending_products: i64,
    pub orders_by_status: Vec<CountBy>,
    pub total_revenue: i64,
    pub daily: Vec<DailySales>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FarmerAnalytics {
    pub total_revenue: i64,
    pub units_sold: i64,
    pub order_count: i64,
    pub active_listings: i64,
    pub pending_listings: i64,
    pub top_products: Vec<TopProduct>,
    pub low_stock: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BuyerSummary {
    pub orders_by_status: Vec<CountBy>,
    pub total_spent: i64,
    pub cart_items: i64,
    pub wishlist_items: i64,
    pub unread_notifications: i64,
}
