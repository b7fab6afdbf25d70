//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Open store → Bootstrap admin → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Server drains, sweeper exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
