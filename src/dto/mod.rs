pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod metrics;
pub mod orders;
pub mod uploads;
