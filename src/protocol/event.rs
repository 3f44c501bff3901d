//! Typed notification parsing.
//!
//! Notifications arrive as `method` + loosely-typed `params`. The page
//! state machine consumes them through [`ParsedEvent`], a tagged union of
//! the events it reacts to, with an [`ParsedEvent::Unknown`] variant so
//! unrecognized methods flow through harmlessly instead of failing.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::{ExecutionContextId, FrameId};

// ============================================================================
// FrameInfo / FrameTree
// ============================================================================

/// Frame description as reported by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameInfo {
    /// Frame id.
    pub id: FrameId,

    /// Parent frame id; absent on the main frame.
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<FrameId>,

    /// Frame name attribute, when set.
    #[serde(default)]
    pub name: Option<String>,

    /// Current document URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Recursive frame tree returned by the frame-tree fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameTree {
    /// This node's frame.
    pub frame: FrameInfo,

    /// Child subtrees.
    #[serde(rename = "childFrames", default)]
    pub child_frames: Vec<FrameTree>,
}

/// Envelope of the `Page.getFrameTree` result.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameTreeResult {
    /// Root of the tree (the main frame).
    #[serde(rename = "frameTree")]
    pub frame_tree: FrameTree,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Notifications the page state machine reacts to.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// A frame was attached under a parent.
    FrameAttached {
        /// New frame.
        frame_id: FrameId,
        /// Its parent.
        parent_frame_id: Option<FrameId>,
    },

    /// A frame committed a navigation.
    FrameNavigated {
        /// Updated frame description.
        frame: FrameInfo,
    },

    /// A frame was detached from the tree.
    FrameDetached {
        /// Detached frame.
        frame_id: FrameId,
    },

    /// A JavaScript execution context was created.
    ExecutionContextCreated {
        /// New context id.
        context_id: ExecutionContextId,
        /// Frame the context belongs to, from auxiliary data.
        frame_id: Option<FrameId>,
    },

    /// One execution context was destroyed.
    ExecutionContextDestroyed {
        /// Destroyed context id.
        context_id: ExecutionContextId,
    },

    /// Every execution context was dropped (cross-process navigation).
    ExecutionContextsCleared,

    /// A frame reached a named lifecycle milestone.
    LifecycleEvent {
        /// Frame that reached the milestone.
        frame_id: FrameId,
        /// Milestone name, e.g. `DOMContentLoaded` or `load`.
        name: String,
    },

    /// Any method this engine does not track.
    Unknown {
        /// The unrecognized method.
        method: String,
    },
}

// Payload shapes for the events above.

#[derive(Deserialize)]
struct FrameAttachedParams {
    #[serde(rename = "frameId")]
    frame_id: FrameId,
    #[serde(rename = "parentFrameId", default)]
    parent_frame_id: Option<FrameId>,
}

#[derive(Deserialize)]
struct FrameNavigatedParams {
    frame: FrameInfo,
}

#[derive(Deserialize)]
struct FrameDetachedParams {
    #[serde(rename = "frameId")]
    frame_id: FrameId,
}

#[derive(Deserialize)]
struct ContextCreatedParams {
    context: ContextDescription,
}

#[derive(Deserialize)]
struct ContextDescription {
    id: ExecutionContextId,
    #[serde(rename = "auxData", default)]
    aux_data: Option<ContextAuxData>,
}

#[derive(Deserialize)]
struct ContextAuxData {
    #[serde(rename = "frameId", default)]
    frame_id: Option<FrameId>,
}

#[derive(Deserialize)]
struct ContextDestroyedParams {
    #[serde(rename = "executionContextId")]
    execution_context_id: ExecutionContextId,
}

#[derive(Deserialize)]
struct LifecycleEventParams {
    #[serde(rename = "frameId")]
    frame_id: FrameId,
    name: String,
}

impl ParsedEvent {
    /// Parses a notification into a typed event.
    ///
    /// Unrecognized methods and payloads that fail to deserialize both
    /// become [`ParsedEvent::Unknown`]; the state machine ignores them.
    #[must_use]
    pub fn parse(method: &str, params: &Value) -> Self {
        let unknown = || Self::Unknown {
            method: method.to_string(),
        };

        match method {
            "Page.frameAttached" => {
                match serde_json::from_value::<FrameAttachedParams>(params.clone()) {
                    Ok(p) => Self::FrameAttached {
                        frame_id: p.frame_id,
                        parent_frame_id: p.parent_frame_id,
                    },
                    Err(_) => unknown(),
                }
            }
            "Page.frameNavigated" => {
                match serde_json::from_value::<FrameNavigatedParams>(params.clone()) {
                    Ok(p) => Self::FrameNavigated { frame: p.frame },
                    Err(_) => unknown(),
                }
            }
            "Page.frameDetached" => {
                match serde_json::from_value::<FrameDetachedParams>(params.clone()) {
                    Ok(p) => Self::FrameDetached {
                        frame_id: p.frame_id,
                    },
                    Err(_) => unknown(),
                }
            }
            "Runtime.executionContextCreated" => {
                match serde_json::from_value::<ContextCreatedParams>(params.clone()) {
                    Ok(p) => Self::ExecutionContextCreated {
                        context_id: p.context.id,
                        frame_id: p.context.aux_data.and_then(|aux| aux.frame_id),
                    },
                    Err(_) => unknown(),
                }
            }
            "Runtime.executionContextDestroyed" => {
                match serde_json::from_value::<ContextDestroyedParams>(params.clone()) {
                    Ok(p) => Self::ExecutionContextDestroyed {
                        context_id: p.execution_context_id,
                    },
                    Err(_) => unknown(),
                }
            }
            "Runtime.executionContextsCleared" => Self::ExecutionContextsCleared,
            "Page.lifecycleEvent" => {
                match serde_json::from_value::<LifecycleEventParams>(params.clone()) {
                    Ok(p) => Self::LifecycleEvent {
                        frame_id: p.frame_id,
                        name: p.name,
                    },
                    Err(_) => unknown(),
                }
            }
            _ => unknown(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_frame_attached() {
        let event = ParsedEvent::parse(
            "Page.frameAttached",
            &json!({"frameId": "F2", "parentFrameId": "F1"}),
        );
        match event {
            ParsedEvent::FrameAttached {
                frame_id,
                parent_frame_id,
            } => {
                assert_eq!(frame_id, FrameId::new("F2"));
                assert_eq!(parent_frame_id, Some(FrameId::new("F1")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_frame_navigated() {
        let event = ParsedEvent::parse(
            "Page.frameNavigated",
            &json!({"frame": {"id": "F1", "url": "https://example.com", "name": "main"}}),
        );
        match event {
            ParsedEvent::FrameNavigated { frame } => {
                assert_eq!(frame.id, FrameId::new("F1"));
                assert_eq!(frame.url.as_deref(), Some("https://example.com"));
                assert!(frame.parent_id.is_none());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_context_created_with_aux_frame() {
        let event = ParsedEvent::parse(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 5, "auxData": {"frameId": "F1", "isDefault": true}}}),
        );
        match event {
            ParsedEvent::ExecutionContextCreated {
                context_id,
                frame_id,
            } => {
                assert_eq!(context_id, ExecutionContextId::new(5));
                assert_eq!(frame_id, Some(FrameId::new("F1")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_context_created_without_aux() {
        let event = ParsedEvent::parse(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 9}}),
        );
        assert!(matches!(
            event,
            ParsedEvent::ExecutionContextCreated { frame_id: None, .. }
        ));
    }

    #[test]
    fn test_parse_lifecycle_event() {
        let event = ParsedEvent::parse(
            "Page.lifecycleEvent",
            &json!({"frameId": "F1", "loaderId": "L1", "name": "DOMContentLoaded", "timestamp": 1.0}),
        );
        assert!(matches!(
            event,
            ParsedEvent::LifecycleEvent { name, .. } if name == "DOMContentLoaded"
        ));
    }

    #[test]
    fn test_unknown_method_flows_through() {
        let event = ParsedEvent::parse("Network.responseReceived", &json!({}));
        assert!(matches!(
            event,
            ParsedEvent::Unknown { method } if method == "Network.responseReceived"
        ));
    }

    #[test]
    fn test_bad_payload_is_unknown_not_panic() {
        let event = ParsedEvent::parse("Page.frameDetached", &json!({"nope": 1}));
        assert!(matches!(event, ParsedEvent::Unknown { .. }));
    }

    #[test]
    fn test_frame_tree_deserialization() {
        let result: FrameTreeResult = serde_json::from_value(json!({
            "frameTree": {
                "frame": {"id": "F1", "url": "https://example.com"},
                "childFrames": [
                    {"frame": {"id": "F2", "parentId": "F1", "name": "child"}}
                ]
            }
        }))
        .expect("parse");

        assert_eq!(result.frame_tree.frame.id, FrameId::new("F1"));
        assert_eq!(result.frame_tree.child_frames.len(), 1);
        assert_eq!(
            result.frame_tree.child_frames[0].frame.parent_id,
            Some(FrameId::new("F1"))
        );
    }
}
