use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entity::enums::{OrderStatus, Role};

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Page number, default 1
    pub page: Option<u64>,
    /// Items per page, default 20, max 100
    pub per_page: Option<u64>,
}

/// Normalised pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
    pub offset: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn normalize(&self) -> Page {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        Page {
            page,
            per_page,
            // Postgres OFFSET is a signed bigint.
            offset: (page - 1).saturating_mul(per_page).min(i64::MAX as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
    Rating,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Case-insensitive match on name or description
    pub q: Option<String>,
    pub category: Option<String>,
    pub farmer_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub organic: Option<bool>,
    #[param(inline)]
    pub sort_by: Option<ProductSortBy>,
    #[param(inline)]
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    #[param(inline)]
    pub status: Option<OrderStatus>,
    #[param(inline)]
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    #[param(inline)]
    pub role: Option<Role>,
    /// Case-insensitive match on email or name
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalFilter {
    #[default]
    Pending,
    Active,
    All,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminProductQuery {
    #[param(inline)]
    pub status: Option<ApprovalFilter>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewQuery {
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// Window for daily series, default 30, max 365
    pub days: Option<i64>,
}

impl AnalyticsQuery {
    pub fn window_days(&self) -> i64 {
        self.days.unwrap_or(30).clamp(1, 365)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LowStockQuery {
    /// Stock threshold, default 5
    pub threshold: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let page = Pagination::default().normalize();
        assert_eq!(page, Page { page: 1, per_page: 20, offset: 0 });

        let page = Pagination::new(0, 500).normalize();
        assert_eq!(page, Page { page: 1, per_page: 100, offset: 0 });

        let page = Pagination::new(3, 10).normalize();
        assert_eq!(page.offset, 20);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = Pagination::new(u64::MAX, 100).normalize();
        assert_eq!(page.page, u64::MAX);
        assert_eq!(page.offset, i64::MAX as u64);
    }

    #[test]
    fn analytics_window_is_bounded() {
        assert_eq!(AnalyticsQuery { days: None }.window_days(), 30);
        assert_eq!(AnalyticsQuery { days: Some(0) }.window_days(), 1);
        assert_eq!(AnalyticsQuery { days: Some(9000) }.window_days(), 365);
    }
}
