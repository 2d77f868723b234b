pub mod api;
pub mod auth;
pub mod memory_store;
pub mod models;
pub mod pg_store;
pub mod schema;
pub mod services;
pub mod store;
