pub mod addresses;
pub mod audit_logs;
pub mod cart_items;
pub mod conversations;
pub mod enums;
pub mod messages;
pub mod notifications;
pub mod order_items;
pub mod order_status_history;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod uploads;
pub mod users;
pub mod wishlist_items;

pub use addresses::Entity as Addresses;
pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use conversations::Entity as Conversations;
pub use messages::Entity as Messages;
pub use notifications::Entity as Notifications;
pub use order_items::Entity as OrderItems;
pub use order_status_history::Entity as OrderStatusHistory;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use uploads::Entity as Uploads;
pub use users::Entity as Users;
pub use wishlist_items::Entity as WishlistItems;
