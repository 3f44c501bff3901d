//! Browser-facing layer: selectors, frames, pages, contexts.

// ============================================================================
// Modules
// ============================================================================

pub mod context;
pub mod core;
pub mod dom_script;
pub mod frame;
pub mod locator;
pub mod page;
pub mod selector;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Browser, CleanupFn};
pub use context::BrowsingContext;
pub use frame::{ClickOptions, ElementBox, ElementHandle, Frame, SelectorOptions, TypeOptions};
pub use locator::Locator;
pub use page::{
    FrameQuery, GotoOptions, Page, ScreenshotFormat, ScreenshotOptions, WaitUntil,
};
pub use selector::{ParsedSelector, SelectorKind};
