//! DevTools protocol types.
//!
//! This module defines the wire vocabulary in three layers:
//!
//! - [`message`]: the three envelope shapes that travel over the socket
//! - [`command`]: typed outgoing calls, organized by protocol domain
//! - [`event`]: typed incoming notifications the engine reacts to

// ============================================================================
// Modules
// ============================================================================

pub mod command;
pub mod event;
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    BrowserCommand, Command, DomCommand, InputCommand, PageCommand, RuntimeCommand, TargetCommand,
};
pub use event::{FrameInfo, FrameTree, FrameTreeResult, ParsedEvent};
pub use message::{CdpCall, CdpErrorEnvelope, CdpMessage, MessageKind};
