//! Pure mapping from raw platform signals to canonical events.

use crate::{TransitionEvent, TransitionKind};
use geofence_monitor::{MonitorSignal, RawTransition};

// Transition codes used by the broadcast-delivered payload.
const CODE_ENTER: i32 = 1;
const CODE_EXIT: i32 = 2;

/// Map a raw monitor signal to its canonical event.
///
/// Stateless and infallible. Unrecognized transition codes become error
/// events rather than being dropped. Authorization changes are not
/// host-facing events and map to `None`; the coordinator routes them to
/// the authorization machine instead.
pub fn normalize(signal: &MonitorSignal) -> Option<TransitionEvent> {
    match signal {
        MonitorSignal::Transition { region_id, kind } => Some(match kind {
            RawTransition::Enter => {
                TransitionEvent::transition(region_id.clone(), TransitionKind::Enter)
            }
            RawTransition::Exit => {
                TransitionEvent::transition(region_id.clone(), TransitionKind::Exit)
            }
            RawTransition::Code(CODE_ENTER) => {
                TransitionEvent::transition(region_id.clone(), TransitionKind::Enter)
            }
            RawTransition::Code(CODE_EXIT) => {
                TransitionEvent::transition(region_id.clone(), TransitionKind::Exit)
            }
            RawTransition::Code(raw) => TransitionEvent::error_for(
                region_id.clone(),
                format!("unknown transition: {raw}"),
            ),
        }),
        MonitorSignal::MonitoringFailed { region_id, reason } => Some(match region_id {
            Some(id) => TransitionEvent::error_for(id.clone(), reason.clone()),
            None => TransitionEvent::error(reason.clone()),
        }),
        MonitorSignal::AuthorizationChanged(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_transitions_map_directly() {
        let event = normalize(&MonitorSignal::Transition {
            region_id: "home".into(),
            kind: RawTransition::Enter,
        });
        assert_eq!(
            event,
            Some(TransitionEvent::transition("home", TransitionKind::Enter))
        );

        let event = normalize(&MonitorSignal::Transition {
            region_id: "home".into(),
            kind: RawTransition::Exit,
        });
        assert_eq!(
            event,
            Some(TransitionEvent::transition("home", TransitionKind::Exit))
        );
    }

    #[test]
    fn test_known_codes_map_to_kinds() {
        let enter = normalize(&MonitorSignal::Transition {
            region_id: "a".into(),
            kind: RawTransition::Code(1),
        });
        assert_eq!(
            enter,
            Some(TransitionEvent::transition("a", TransitionKind::Enter))
        );

        let exit = normalize(&MonitorSignal::Transition {
            region_id: "a".into(),
            kind: RawTransition::Code(2),
        });
        assert_eq!(
            exit,
            Some(TransitionEvent::transition("a", TransitionKind::Exit))
        );
    }

    #[test]
    fn test_unknown_code_becomes_error_referencing_raw_value() {
        let event = normalize(&MonitorSignal::Transition {
            region_id: "a".into(),
            kind: RawTransition::Code(4),
        });
        assert_eq!(
            event,
            Some(TransitionEvent::error_for("a", "unknown transition: 4"))
        );
    }

    #[test]
    fn test_monitoring_failure_maps_to_error_event() {
        let with_id = normalize(&MonitorSignal::MonitoringFailed {
            region_id: Some("home".into()),
            reason: "GEOFENCE_NOT_AVAILABLE".into(),
        });
        assert_eq!(
            with_id,
            Some(TransitionEvent::error_for("home", "GEOFENCE_NOT_AVAILABLE"))
        );

        let without_id = normalize(&MonitorSignal::MonitoringFailed {
            region_id: None,
            reason: "location services disabled".into(),
        });
        assert_eq!(
            without_id,
            Some(TransitionEvent::error("location services disabled"))
        );
    }

    #[test]
    fn test_authorization_changes_are_not_host_events() {
        use geofence_authorization::AuthorizationStatus;

        let event = normalize(&MonitorSignal::AuthorizationChanged(
            AuthorizationStatus::ApprovedAlways,
        ));
        assert_eq!(event, None);
    }
}
