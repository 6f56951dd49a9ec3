//! Geofence lifecycle coordinator.
//!
//! [`GeofenceCoordinator`] is the façade the host application talks to.
//! It owns the region store and the authorization machine behind one
//! mutex, holds the platform monitor capability, and routes raw monitor
//! signals — which arrive on an uncontrolled thread — through
//! normalization into the single-consumer event sink.
//!
//! Registration is gated on "always" authorization. A request made with
//! weaker authorization fails fast with `false`; nothing is queued, and
//! the host retries after authorization improves. Monitoring outcomes
//! never come back through return values: they arrive later on the event
//! stream.

use geofence_events::normalize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub use geofence_authorization::{
    AuthorizationMachine, AuthorizationStatus, NullRequester, PermissionRequester,
    RecordingRequester,
};
pub use geofence_events::{
    ChannelSink, EventSink, InMemorySink, SinkManager, TransitionEvent, TransitionKind,
};
pub use geofence_monitor::{
    new_callback, MonitorError, MonitorSignal, NullMonitor, RawTransition, RecordingMonitor,
    RegionMonitor, SignalCallback,
};
pub use geofence_regions::{GeofenceRegion, RegionError, RegionStore};

/// Message emitted when authorization lands in the denied/restricted state.
const PERMISSION_DENIED: &str = "Location permission denied";

struct Inner {
    store: RegionStore,
    authorization: AuthorizationMachine,
    initialized: bool,
}

/// Orchestrates region registration, permission escalation, and event
/// delivery for one geofencing session.
///
/// Façade calls (`initialize`, `register_regions`, `remove_region`) are
/// expected to be serialized by the host; monitor signals are
/// synchronized against them internally through the same mutex.
pub struct GeofenceCoordinator {
    inner: Arc<Mutex<Inner>>,
    monitor: Arc<dyn RegionMonitor>,
    sink: Arc<SinkManager>,
}

impl GeofenceCoordinator {
    pub fn new(
        monitor: Arc<dyn RegionMonitor>,
        requester: Arc<dyn PermissionRequester>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store: RegionStore::new(),
                authorization: AuthorizationMachine::new(requester),
                initialized: false,
            })),
            monitor,
            sink: Arc::new(SinkManager::new()),
        }
    }

    /// Bind the monitor signal callback and kick off permission
    /// escalation. Idempotent: a second call does not rebind or
    /// re-prompt.
    pub fn initialize(&self) {
        let denied = {
            let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
            if inner.initialized {
                tracing::debug!("coordinator already initialized");
                return;
            }
            inner.initialized = true;

            let weak_inner = Arc::downgrade(&self.inner);
            let weak_monitor = Arc::downgrade(&self.monitor);
            let sink = self.sink.clone();
            self.monitor.bind(new_callback(move |signal| {
                let (Some(inner), Some(monitor)) = (weak_inner.upgrade(), weak_monitor.upgrade())
                else {
                    return;
                };
                Self::handle_signal(&inner, monitor.as_ref(), &sink, signal);
            }));

            inner.authorization.request_escalation();
            inner.authorization.status() == AuthorizationStatus::DeniedOrRestricted
        };

        // Already-denied permission is reported the same way an
        // asynchronous denial would be.
        if denied {
            self.sink.emit(TransitionEvent::error(PERMISSION_DENIED));
        }
        tracing::info!("geofence coordinator initialized");
    }

    /// Register a batch of regions for monitoring.
    ///
    /// Returns `false` without touching the store when any entry is
    /// malformed or when authorization is below "always". On success the
    /// store reflects the full batch even if individual start requests
    /// fail; those failures surface as error events.
    pub fn register_regions(&self, regions: Vec<GeofenceRegion>) -> bool {
        for region in &regions {
            if let Err(error) = region.validate() {
                tracing::warn!(%error, "rejecting malformed region batch");
                return false;
            }
        }

        {
            let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
            if !inner.authorization.can_register() {
                tracing::warn!(
                    status = ?inner.authorization.status(),
                    "cannot register geofences without always authorization"
                );
                return false;
            }
            for region in &regions {
                inner.store.upsert(region.clone());
            }
        }

        for region in &regions {
            self.start_monitoring(region);
        }
        tracing::debug!(count = regions.len(), "geofences registered");
        true
    }

    /// Remove a region. Returns whether the store held it. Monitoring is
    /// stopped at the adapter either way, since the adapter may be
    /// tracking a region the store no longer knows about.
    pub fn remove_region(&self, id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
            inner.store.remove(id)
        };

        if let Err(error) = self.monitor.stop_monitoring(id) {
            tracing::warn!(%error, id, "failed to stop monitoring");
            self.sink.emit(TransitionEvent::error_for(id, error.to_string()));
        }
        tracing::debug!(id, removed, "geofence removed");
        removed
    }

    /// Current authorization status as last reported by the OS.
    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.inner
            .lock()
            .expect("coordinator mutex poisoned")
            .authorization
            .status()
    }

    /// Ids of the currently registered regions.
    pub fn registered_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("coordinator mutex poisoned")
            .store
            .all()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    /// Attach the single event listener, replacing any existing one.
    pub fn attach_listener(&self, consumer: Arc<dyn EventSink>) {
        self.sink.attach(consumer);
    }

    /// Detach the event listener. Events raised while detached are lost.
    pub fn detach_listener(&self) {
        self.sink.detach();
    }

    /// Attach a channel-backed listener and return its receiving end.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<TransitionEvent> {
        let (sink, rx) = ChannelSink::bounded(capacity);
        self.sink.attach(sink);
        rx
    }

    /// Tear down the session: stop monitoring every stored region, clear
    /// the store, and detach the listener.
    pub fn shutdown(&self) {
        let regions = {
            let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
            let regions = inner.store.all();
            inner.store.clear();
            inner.initialized = false;
            regions
        };

        for region in &regions {
            if let Err(error) = self.monitor.stop_monitoring(&region.id) {
                tracing::warn!(%error, id = %region.id, "failed to stop monitoring");
            }
        }
        self.sink.detach();
        tracing::info!(count = regions.len(), "geofence coordinator shut down");
    }

    /// Issue a start request; a failure becomes an error event, never a
    /// return value.
    fn start_monitoring(&self, region: &GeofenceRegion) {
        if let Err(error) = self.monitor.start_monitoring(region) {
            tracing::warn!(%error, id = %region.id, "failed to start monitoring");
            self.sink
                .emit(TransitionEvent::error_for(&region.id, error.to_string()));
        }
    }

    /// Entry point for raw monitor signals. Runs on whatever thread the
    /// platform delivers them on.
    fn handle_signal(
        inner: &Mutex<Inner>,
        monitor: &dyn RegionMonitor,
        sink: &SinkManager,
        signal: MonitorSignal,
    ) {
        if let MonitorSignal::AuthorizationChanged(status) = signal {
            Self::handle_authorization_change(inner, monitor, sink, status);
            return;
        }

        if let Some(event) = normalize(&signal) {
            sink.emit(event);
        }
    }

    fn handle_authorization_change(
        inner: &Mutex<Inner>,
        monitor: &dyn RegionMonitor,
        sink: &SinkManager,
        status: AuthorizationStatus,
    ) {
        let resubmit = {
            let mut inner = inner.lock().expect("coordinator mutex poisoned");
            let previous = inner.authorization.on_status_changed(status);

            // Regions registered before a downgrade are re-submitted once
            // the strongest tier is regained.
            if status == AuthorizationStatus::ApprovedAlways
                && previous != AuthorizationStatus::ApprovedAlways
            {
                inner.store.all()
            } else {
                Vec::new()
            }
        };

        if status == AuthorizationStatus::DeniedOrRestricted {
            sink.emit(TransitionEvent::error(PERMISSION_DENIED));
            return;
        }

        for region in &resubmit {
            if let Err(error) = monitor.start_monitoring(region) {
                tracing::warn!(%error, id = %region.id, "failed to start monitoring");
                sink.emit(TransitionEvent::error_for(&region.id, error.to_string()));
            }
        }
        if !resubmit.is_empty() {
            tracing::debug!(count = resubmit.len(), "re-submitted stored geofences");
        }
    }
}
