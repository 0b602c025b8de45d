//! Connection management
//!
//! This module handles:
//! * Lazy opening of the physical connection
//! * Connection state machine enforcement
//! * The per-thread execution context that owns the connection

pub(crate) mod context;
mod lazy;
mod state;

pub use context::{is_active, transaction_depth, ExecutionContext};
pub use lazy::LazyConnection;
pub use state::ConnectionState;
