//! Geofence region definitions and the registered-region store.
//!
//! A region is a circular area identified by a caller-assigned id. The
//! [`RegionStore`] is the source of truth for what is currently registered;
//! it never holds two entries with the same id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A circular geographic region to monitor for entry/exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRegion {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Center latitude in degrees, [-90, 90].
    pub latitude: f64,
    /// Center longitude in degrees, [-180, 180].
    pub longitude: f64,
    /// Radius in meters, strictly positive.
    pub radius: f32,
}

/// Validation failure for a single region definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("region id must not be empty")]
    EmptyId,
    #[error("latitude out of range for region '{0}'")]
    InvalidLatitude(String),
    #[error("longitude out of range for region '{0}'")]
    InvalidLongitude(String),
    #[error("radius must be positive for region '{0}'")]
    InvalidRadius(String),
}

impl GeofenceRegion {
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius: f32,
    ) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            radius,
        }
    }

    /// Check field ranges. Malformed regions must never reach the
    /// platform monitor, so callers validate before registering.
    pub fn validate(&self) -> Result<(), RegionError> {
        if self.id.is_empty() {
            return Err(RegionError::EmptyId);
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RegionError::InvalidLatitude(self.id.clone()));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(RegionError::InvalidLongitude(self.id.clone()));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(RegionError::InvalidRadius(self.id.clone()));
        }
        Ok(())
    }
}

/// In-memory set of currently-registered regions, keyed by id.
///
/// Not persisted; the coordinator owns one instance and serializes access.
#[derive(Debug, Default)]
pub struct RegionStore {
    regions: HashMap<String, GeofenceRegion>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id. Re-registering an existing id replaces
    /// its definition.
    pub fn upsert(&mut self, region: GeofenceRegion) {
        if self.regions.insert(region.id.clone(), region).is_some() {
            tracing::debug!("replaced existing region definition");
        }
    }

    /// Remove by id. Returns whether an entry existed; removing an
    /// unknown id is a defined `false` result, not a failure.
    pub fn remove(&mut self, id: &str) -> bool {
        self.regions.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&GeofenceRegion> {
        self.regions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.regions.contains_key(id)
    }

    /// Snapshot of every registered region, for bulk re-submission to
    /// the platform monitor after authorization is (re)gained.
    pub fn all(&self) -> Vec<GeofenceRegion> {
        self.regions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Drop every entry. Used on coordinator teardown.
    pub fn clear(&mut self) {
        self.regions.clear();
    }
}
