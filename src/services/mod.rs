pub mod admin_service;
pub mod audit_service;
pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod category_service;
pub mod metrics_service;
pub mod order_service;
pub mod product_service;
pub mod role_service;
pub mod upload_service;
pub mod user_service;
