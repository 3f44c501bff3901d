//! Transport layer: the shared WebSocket and session routing.

// ============================================================================
// Modules
// ============================================================================

pub mod connection;
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, EventListener};
pub use session::Session;
