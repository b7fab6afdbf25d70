//! Route handlers.
//!
//! Handlers never see unauthenticated traffic on protected routes; they read
//! the caller from [`crate::security::CurrentUser`].

pub mod auth;
pub mod health;
pub mod tasks;
