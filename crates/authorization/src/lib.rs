//! Staged location-permission escalation.
//!
//! Background geofencing needs the strongest permission tier ("always"),
//! which both platforms only grant after the foreground tier has been
//! obtained. Escalation is therefore staged: request the weaker tier,
//! wait for the asynchronous status-change signal, then request the
//! stronger one. [`AuthorizationMachine`] drives that staging and decides
//! whether region registration is currently allowed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Location-permission tier as reported by the OS permission subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationStatus {
    /// The user has not been prompted yet.
    #[default]
    NotDetermined,
    /// Denied by the user or restricted by device policy.
    DeniedOrRestricted,
    /// Granted while the app is in the foreground only.
    ApprovedForegroundOnly,
    /// Granted including background delivery. Required for geofencing.
    ApprovedAlways,
}

impl AuthorizationStatus {
    /// Stable numeric code for hosts that consume the raw value.
    pub fn as_code(self) -> u8 {
        match self {
            Self::NotDetermined => 0,
            Self::DeniedOrRestricted => 1,
            Self::ApprovedForegroundOnly => 2,
            Self::ApprovedAlways => 3,
        }
    }
}

/// Capability interface onto the host's permission subsystem.
///
/// Requests are fire-and-forget: the resulting status change arrives
/// later through [`AuthorizationMachine::on_status_changed`].
pub trait PermissionRequester: Send + Sync {
    /// Current status as the OS reports it.
    fn current_status(&self) -> AuthorizationStatus;

    /// Prompt for foreground ("when in use") authorization.
    fn request_foreground(&self);

    /// Prompt for background ("always") authorization.
    fn request_always(&self);
}

/// Requester for tests or platforms without a permission prompt.
pub struct NullRequester;

impl PermissionRequester for NullRequester {
    fn current_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::NotDetermined
    }

    fn request_foreground(&self) {}

    fn request_always(&self) {}
}

/// Recording requester for tests: counts prompts, status is settable.
#[derive(Default)]
pub struct RecordingRequester {
    status: Mutex<AuthorizationStatus>,
    foreground_requests: AtomicUsize,
    always_requests: AtomicUsize,
}

impl RecordingRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock().expect("status mutex poisoned") = status;
    }

    pub fn foreground_requests(&self) -> usize {
        self.foreground_requests.load(Ordering::Relaxed)
    }

    pub fn always_requests(&self) -> usize {
        self.always_requests.load(Ordering::Relaxed)
    }
}

impl PermissionRequester for RecordingRequester {
    fn current_status(&self) -> AuthorizationStatus {
        *self.status.lock().expect("status mutex poisoned")
    }

    fn request_foreground(&self) {
        self.foreground_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn request_always(&self) {
        self.always_requests.fetch_add(1, Ordering::Relaxed);
    }
}

/// Tracks the current permission tier and resumes staged escalation
/// across asynchronous status-change signals.
///
/// Status changes are external input and may be arbitrary, including
/// downgrades; the machine records whatever the OS reports.
pub struct AuthorizationMachine {
    status: AuthorizationStatus,
    requester: Arc<dyn PermissionRequester>,
}

impl AuthorizationMachine {
    /// Seed the machine from the requester's currently reported status.
    pub fn new(requester: Arc<dyn PermissionRequester>) -> Self {
        let status = requester.current_status();
        Self { status, requester }
    }

    pub fn status(&self) -> AuthorizationStatus {
        self.status
    }

    /// True iff regions may be handed to the platform monitor.
    pub fn can_register(&self) -> bool {
        self.status == AuthorizationStatus::ApprovedAlways
    }

    /// Request the next permission tier. Non-blocking; a no-op when the
    /// status is already terminal (always, or denied).
    pub fn request_escalation(&self) {
        match self.status {
            AuthorizationStatus::NotDetermined => {
                tracing::debug!("requesting foreground authorization");
                self.requester.request_foreground();
            }
            AuthorizationStatus::ApprovedForegroundOnly => {
                tracing::debug!("requesting always authorization");
                self.requester.request_always();
            }
            AuthorizationStatus::ApprovedAlways | AuthorizationStatus::DeniedOrRestricted => {}
        }
    }

    /// Record an external status change and resume escalation.
    ///
    /// Entering `ApprovedForegroundOnly` chases `ApprovedAlways`, except
    /// when the previous status was already foreground-only (a repeated
    /// signal) or always (a spurious downgrade) — re-prompting there
    /// would nag the user without gaining anything.
    ///
    /// Returns the previous status so the caller can react to edges.
    pub fn on_status_changed(&mut self, new: AuthorizationStatus) -> AuthorizationStatus {
        let previous = self.status;
        self.status = new;

        match new {
            AuthorizationStatus::ApprovedForegroundOnly => {
                if previous != AuthorizationStatus::ApprovedForegroundOnly
                    && previous != AuthorizationStatus::ApprovedAlways
                {
                    self.request_escalation();
                }
            }
            AuthorizationStatus::ApprovedAlways => {
                tracing::debug!("always authorization granted");
            }
            AuthorizationStatus::DeniedOrRestricted => {
                tracing::warn!("location permission denied or restricted");
            }
            AuthorizationStatus::NotDetermined => {}
        }

        previous
    }
}
