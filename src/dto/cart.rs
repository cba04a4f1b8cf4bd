use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

/// Replaces the quantity of a cart line rather than adding to it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetCartQuantityRequest {
    pub product_id: Uuid,
    #[schema(minimum = 1)]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    /// `product.price * quantity`, in minor units.
    pub line_total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Sum of quantities across all lines.
    pub unit_count: i64,
    pub subtotal: i64,
}
