//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, trace span)
//!     → security (rate limiter, access control gate)
//!     → handlers/ (auth, tasks, health)
//!     → error.rs (failures as JSON `{"error": ...}`)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
