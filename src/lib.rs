pub mod app;
pub mod audit;
pub mod cart;
pub mod config;
pub mod cookies;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod response;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod uploads;
pub mod validation;
