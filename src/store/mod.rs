//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     sqlite.rs (open, CREATE TABLE IF NOT EXISTS)
//!     → bootstrap.rs (default admin when none exists)
//!
//! Handlers:
//!     → sqlite.rs (users by email/id, tasks CRUD + pagination)
//! ```
//!
//! # Design Decisions
//! - Unique username/email enforced by the schema, surfaced as `StoreError::Conflict`
//! - Tasks are soft-deleted (`deleted_at`) and hidden from every query
//! - Timestamps are stored and served as UTC

pub mod bootstrap;
pub mod models;
pub mod sqlite;

pub use bootstrap::bootstrap_admin;
pub use models::{NewTask, NewUser, Page, Task, TaskChanges, User};
pub use sqlite::{SqliteStore, StoreError};
