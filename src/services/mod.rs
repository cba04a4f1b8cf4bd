pub mod admin_service;
pub mod auth_service;
pub mod cart_service;
pub mod chat_service;
pub mod notification_service;
pub mod order_service;
pub mod payment_service;
pub mod product_service;
pub mod profile_service;
pub mod report_service;
pub mod review_service;
pub mod upload_service;
pub mod wishlist_service;
