pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod profile;
pub mod reports;
pub mod reviews;
pub mod uploads;
pub mod wishlist;
