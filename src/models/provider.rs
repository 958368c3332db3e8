use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProviderStatus {
    Available,
    Engaged,
    Offline,
}

/// Read-only view of a field provider used for candidate search. Identity and
/// approval are owned by the external profile system; the engine only reads
/// this snapshot and mirrors live positions into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub status: ProviderStatus,
    pub approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProviderSnapshot {
    /// Eligible for dispatch: approved, available, and not already engaged.
    pub fn is_eligible(&self) -> bool {
        self.approved && self.status == ProviderStatus::Available
    }
}
