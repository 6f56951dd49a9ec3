//! Canonical geofence event contracts.
//!
//! The two native integrations deliver transitions in structurally
//! different shapes (a broadcast payload with integer codes on one
//! platform, typed delegate callbacks on the other). Everything is
//! normalized here into one stable schema before it reaches the host:
//! `{id, transition}` for a boundary crossing, `{error}` for a
//! monitoring failure.
//!
//! Also provides the [`SinkManager`], the single-consumer delivery point
//! for the event stream.

mod normalize;
mod sink;

pub use normalize::normalize;
pub use sink::{ChannelSink, EventSink, InMemorySink, SinkManager};

use serde::{Deserialize, Serialize};

/// Direction of a geofence boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    Enter,
    Exit,
}

/// Canonical event delivered on the host-facing stream.
///
/// Serializes to the wire shape the host expects:
/// `{"id": "...", "transition": "ENTER"|"EXIT"}` for a transition,
/// `{"error": "..."}` (with an optional `"id"`) for a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionEvent {
    Transition {
        #[serde(rename = "id")]
        region_id: String,
        #[serde(rename = "transition")]
        kind: TransitionKind,
    },
    Error {
        #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
        region_id: Option<String>,
        error: String,
    },
}

impl TransitionEvent {
    pub fn transition(region_id: impl Into<String>, kind: TransitionKind) -> Self {
        Self::Transition {
            region_id: region_id.into(),
            kind,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            region_id: None,
            error: message.into(),
        }
    }

    pub fn error_for(region_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            region_id: Some(region_id.into()),
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transition_wire_shape() {
        let event = TransitionEvent::transition("home", TransitionKind::Enter);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"id": "home", "transition": "ENTER"})
        );

        let event = TransitionEvent::transition("office", TransitionKind::Exit);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"id": "office", "transition": "EXIT"})
        );
    }

    #[test]
    fn test_error_wire_shape_omits_missing_id() {
        let event = TransitionEvent::error("Location permission denied");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"error": "Location permission denied"})
        );

        let event = TransitionEvent::error_for("home", "monitoring failed");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"id": "home", "error": "monitoring failed"})
        );
    }

    #[test]
    fn test_events_round_trip() {
        for event in [
            TransitionEvent::transition("home", TransitionKind::Enter),
            TransitionEvent::error("boom"),
            TransitionEvent::error_for("home", "boom"),
        ] {
            let json = serde_json::to_string(&event).unwrap();
            let back: TransitionEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
