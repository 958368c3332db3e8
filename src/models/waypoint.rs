use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum WaypointKind {
    Pickup,
    Dropoff,
    Intermediate,
}

/// One stop in a multi-stop route. Sequence numbers within a request form a
/// contiguous permutation of 1..N.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub sequence: u32,
    pub kind: WaypointKind,
    pub location: GeoPoint,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Waypoint {
    pub fn new(sequence: u32, kind: WaypointKind, location: GeoPoint) -> Self {
        Self {
            sequence,
            kind,
            location,
            completed: false,
            completed_at: None,
        }
    }
}
