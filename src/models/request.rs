use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::waypoint::Waypoint;

/// Domain discriminator: repair, parcel courier and ride requests all share
/// one lifecycle and one assignment engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ServiceKind {
    Repair,
    Courier,
    Ride,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum RequestStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Completed,
    Cancelled,
    Rejected,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Assigned => "Assigned",
            RequestStatus::PickedUp => "PickedUp",
            RequestStatus::InTransit => "InTransit",
            RequestStatus::Completed => "Completed",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed
                | RequestStatus::Cancelled
                | RequestStatus::Rejected
                | RequestStatus::Failed
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            RequestStatus::Assigned | RequestStatus::PickedUp | RequestStatus::InTransit
        )
    }
}

/// Fare components, computed once at creation and immutable after the request
/// leaves Pending.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Fare {
    pub base: f64,
    pub distance: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub kind: ServiceKind,
    pub requester_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub status: RequestStatus,
    pub origin: GeoPoint,
    pub destination: Option<GeoPoint>,
    pub waypoints: Vec<Waypoint>,
    pub notified: HashSet<Uuid>,
    pub fare: Option<Fare>,
    pub total_distance_km: Option<f64>,
    pub total_duration_min: Option<i64>,
    pub cancel_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn new(kind: ServiceKind, requester_id: Uuid, origin: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            requester_id,
            assignee_id: None,
            status: RequestStatus::Pending,
            origin,
            destination: None,
            waypoints: Vec::new(),
            notified: HashSet::new(),
            fare: None,
            total_distance_km: None,
            total_duration_min: None,
            cancel_reason: None,
            requested_at: Utc::now(),
            assigned_at: None,
            picked_up_at: None,
            in_transit_at: None,
            completed_at: None,
            cancelled_at: None,
            rejected_at: None,
        }
    }

    /// All waypoints completed. Requests without waypoints trivially qualify.
    pub fn is_route_complete(&self) -> bool {
        self.waypoints.iter().all(|wp| wp.completed)
    }
}
