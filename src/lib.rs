//! Multi-user task tracking HTTP API library.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::SqliteStore;
