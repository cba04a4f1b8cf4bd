use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "buyer")]
    Buyer,
    #[sea_orm(string_value = "farmer")]
    Farmer,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "logistics")]
    Logistics,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Farmer => "farmer",
            Role::Admin => "admin",
            Role::Logistics => "logistics",
        }
    }

    /// Roles an anonymous visitor may pick at signup.
    pub fn is_self_service(&self) -> bool {
        matches!(self, Role::Buyer | Role::Farmer)
    }

    /// Target statuses this role may ever request. Ownership and the
    /// transition table are checked separately.
    pub fn may_request(&self, next: OrderStatus) -> bool {
        match self {
            Role::Admin => true,
            Role::Buyer => next == OrderStatus::Cancelled,
            Role::Farmer => matches!(
                next,
                OrderStatus::Confirmed
                    | OrderStatus::Processing
                    | OrderStatus::Shipped
                    | OrderStatus::Cancelled
            ),
            Role::Logistics => matches!(next, OrderStatus::Shipped | OrderStatus::Delivered),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refund_pending")]
    RefundPending,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery
    #[sea_orm(string_value = "cod")]
    Cod,
    #[sea_orm(string_value = "online")]
    Online,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "order_placed")]
    OrderPlaced,
    #[sea_orm(string_value = "new_order")]
    NewOrder,
    #[sea_orm(string_value = "order_status")]
    OrderStatus,
    #[sea_orm(string_value = "product_pending")]
    ProductPending,
    #[sea_orm(string_value = "product_approved")]
    ProductApproved,
    #[sea_orm(string_value = "product_rejected")]
    ProductRejected,
    #[sea_orm(string_value = "new_message")]
    NewMessage,
    #[sea_orm(string_value = "new_review")]
    NewReview,
    #[sea_orm(string_value = "payment")]
    Payment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn transition_table_matches_lifecycle() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_statuses_go_nowhere() {
        for next in OrderStatus::iter() {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn no_status_moves_back_to_pending() {
        for from in OrderStatus::iter() {
            assert!(!from.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn role_requests() {
        assert!(Role::Buyer.may_request(OrderStatus::Cancelled));
        assert!(!Role::Buyer.may_request(OrderStatus::Confirmed));
        assert!(Role::Farmer.may_request(OrderStatus::Shipped));
        assert!(!Role::Farmer.may_request(OrderStatus::Delivered));
        assert!(Role::Logistics.may_request(OrderStatus::Delivered));
        assert!(!Role::Logistics.may_request(OrderStatus::Cancelled));
        for next in OrderStatus::iter() {
            assert!(Role::Admin.may_request(next));
        }
    }

    #[test]
    fn only_buyers_and_farmers_self_register() {
        assert!(Role::Buyer.is_self_service());
        assert!(Role::Farmer.is_self_service());
        assert!(!Role::Admin.is_self_service());
        assert!(!Role::Logistics.is_self_service());
    }
}
