//! Platform region-monitoring capability interface.
//!
//! The OS facility that actually performs geofencing lives behind
//! [`RegionMonitor`]. Calls into it are synchronous requests; outcomes and
//! transitions come back later as [`MonitorSignal`]s on a callback bound
//! once at startup. Signals may arrive on any thread, in any order
//! relative to calls.

use geofence_authorization::AuthorizationStatus;
use geofence_regions::GeofenceRegion;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Failure from a start/stop monitoring request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    #[error("monitoring unavailable: {0}")]
    Unavailable(String),
    #[error("monitoring rejected for region '{id}': {reason}")]
    Rejected { id: String, reason: String },
}

/// Raw transition kind as delivered by the platform.
///
/// The Android broadcast payload carries an integer code; the iOS
/// delegate delivers typed enter/exit callbacks. `Code` preserves any
/// integer the platform hands over, recognized or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTransition {
    Enter,
    Exit,
    /// Platform-encoded transition code (1 = enter, 2 = exit, anything
    /// else is unrecognized and surfaces as an error event).
    Code(i32),
}

/// Asynchronous signal raised by the platform monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorSignal {
    /// The device crossed a region boundary.
    Transition {
        region_id: String,
        kind: RawTransition,
    },
    /// Monitoring failed, during setup or afterwards. The region id is
    /// included when the platform attributes the failure to one region.
    MonitoringFailed {
        region_id: Option<String>,
        reason: String,
    },
    /// The OS permission subsystem reported a new authorization status.
    AuthorizationChanged(AuthorizationStatus),
}

/// Callback invoked for every signal the platform raises.
pub type SignalCallback = Arc<dyn Fn(MonitorSignal) + Send + Sync + 'static>;

pub fn new_callback<F>(f: F) -> SignalCallback
where
    F: Fn(MonitorSignal) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Capability surface of the OS region-monitoring facility.
///
/// `start_monitoring` and `stop_monitoring` only issue the request; they
/// do not wait for the OS to acknowledge it. There is no cancellation for
/// an in-flight start — stopping is the only way to retract interest.
pub trait RegionMonitor: Send + Sync {
    /// Begin monitoring a region for enter/exit transitions.
    fn start_monitoring(&self, region: &GeofenceRegion) -> Result<(), MonitorError>;

    /// Stop monitoring the region with the given id.
    fn stop_monitoring(&self, region_id: &str) -> Result<(), MonitorError>;

    /// Bind the signal callback. Rebinding replaces the previous one.
    fn bind(&self, callback: SignalCallback);
}

/// Monitor for tests or platforms without geofencing support.
pub struct NullMonitor;

impl RegionMonitor for NullMonitor {
    fn start_monitoring(&self, _region: &GeofenceRegion) -> Result<(), MonitorError> {
        Ok(())
    }

    fn stop_monitoring(&self, _region_id: &str) -> Result<(), MonitorError> {
        Ok(())
    }

    fn bind(&self, _callback: SignalCallback) {}
}

/// Recording monitor for tests: captures start/stop calls and can raise
/// signals into the bound callback as the platform would.
#[derive(Default)]
pub struct RecordingMonitor {
    started: Mutex<Vec<GeofenceRegion>>,
    stopped: Mutex<Vec<String>>,
    callback: Mutex<Option<SignalCallback>>,
    bind_calls: AtomicUsize,
    fail_start: Mutex<Option<MonitorError>>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regions handed to `start_monitoring`, in call order.
    pub fn started(&self) -> Vec<GeofenceRegion> {
        self.started.lock().expect("monitor mutex poisoned").clone()
    }

    /// Region ids handed to `stop_monitoring`, in call order.
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().expect("monitor mutex poisoned").clone()
    }

    pub fn is_bound(&self) -> bool {
        self.callback.lock().expect("monitor mutex poisoned").is_some()
    }

    /// How many times `bind` has been called.
    pub fn bind_calls(&self) -> usize {
        self.bind_calls.load(Ordering::Relaxed)
    }

    /// Make every subsequent `start_monitoring` call fail.
    pub fn fail_next_starts(&self, error: MonitorError) {
        *self.fail_start.lock().expect("monitor mutex poisoned") = Some(error);
    }

    /// Deliver a signal to the bound callback, as the OS would.
    pub fn raise(&self, signal: MonitorSignal) {
        let callback = self
            .callback
            .lock()
            .expect("monitor mutex poisoned")
            .clone();
        if let Some(callback) = callback {
            callback(signal);
        }
    }
}

impl RegionMonitor for RecordingMonitor {
    fn start_monitoring(&self, region: &GeofenceRegion) -> Result<(), MonitorError> {
        if let Some(error) = self.fail_start.lock().expect("monitor mutex poisoned").clone() {
            return Err(error);
        }
        self.started
            .lock()
            .expect("monitor mutex poisoned")
            .push(region.clone());
        Ok(())
    }

    fn stop_monitoring(&self, region_id: &str) -> Result<(), MonitorError> {
        self.stopped
            .lock()
            .expect("monitor mutex poisoned")
            .push(region_id.to_string());
        Ok(())
    }

    fn bind(&self, callback: SignalCallback) {
        self.bind_calls.fetch_add(1, Ordering::Relaxed);
        *self.callback.lock().expect("monitor mutex poisoned") = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_recording_monitor_captures_calls() {
        let monitor = RecordingMonitor::new();
        let region = GeofenceRegion::new("home", 37.0, -122.0, 100.0);

        monitor.start_monitoring(&region).unwrap();
        monitor.stop_monitoring("home").unwrap();

        assert_eq!(monitor.started(), vec![region]);
        assert_eq!(monitor.stopped(), vec!["home".to_string()]);
    }

    #[test]
    fn test_raise_without_binding_is_silent() {
        let monitor = RecordingMonitor::new();
        monitor.raise(MonitorSignal::Transition {
            region_id: "home".into(),
            kind: RawTransition::Enter,
        });
    }

    #[test]
    fn test_raise_invokes_bound_callback() {
        let monitor = RecordingMonitor::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        monitor.bind(new_callback(move |_signal| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        monitor.raise(MonitorSignal::AuthorizationChanged(
            AuthorizationStatus::ApprovedAlways,
        ));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fail_next_starts() {
        let monitor = RecordingMonitor::new();
        monitor.fail_next_starts(MonitorError::Unavailable("no location services".into()));

        let region = GeofenceRegion::new("home", 37.0, -122.0, 100.0);
        assert!(monitor.start_monitoring(&region).is_err());
        assert!(monitor.started().is_empty());
    }
}
