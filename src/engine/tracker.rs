use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{self, round_km, GeoPoint};
use crate::routing::directions_or_fallback;
use crate::state::AppState;

/// Ring-buffer depth per provider; enough for derived speed metrics without
/// unbounded growth.
const TRACK_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrackPoint {
    pub location: GeoPoint,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProviderTrack {
    pub current: TrackPoint,
    history: VecDeque<TrackPoint>,
}

impl ProviderTrack {
    fn new(point: TrackPoint) -> Self {
        let mut history = VecDeque::with_capacity(TRACK_CAPACITY);
        history.push_back(point);
        Self {
            current: point,
            history,
        }
    }

    fn push(&mut self, point: TrackPoint) {
        self.current = point;
        if self.history.len() == TRACK_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(point);
    }

    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Outcome of a location ingest. A stale observation is a silent drop, not an
/// application error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LocationUpdate {
    Accepted,
    Stale,
}

/// Derived metrics over the ring buffer.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub points: usize,
    pub distance_km: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

/// Ingests a live provider position.
///
/// Coordinates are validated before any computation. Observations older than
/// the stored timestamp for the provider are dropped, enforcing monotonic
/// time per provider against out-of-order delivery. Accepted positions are
/// mirrored into the provider snapshot used for candidate search.
pub fn update_location(
    state: &AppState,
    provider_id: Uuid,
    lat: f64,
    lng: f64,
    observed_at: DateTime<Utc>,
) -> Result<LocationUpdate, AppError> {
    if let Err(err) = geo::validate_coordinates(lat, lng) {
        state
            .metrics
            .location_updates_total
            .with_label_values(&["invalid"])
            .inc();
        return Err(err);
    }

    let point = TrackPoint {
        location: GeoPoint::new(lat, lng),
        observed_at,
    };

    // The snapshot mirror happens under the track's entry guard, so the
    // snapshot and the track's current point can never cross for concurrent
    // updates to one provider.
    let outcome = match state.tracks.entry(provider_id) {
        dashmap::mapref::entry::Entry::Occupied(mut entry) => {
            if observed_at < entry.get().current.observed_at {
                LocationUpdate::Stale
            } else {
                entry.get_mut().push(point);
                mirror_into_snapshot(state, provider_id, point.location);
                LocationUpdate::Accepted
            }
        }
        dashmap::mapref::entry::Entry::Vacant(entry) => {
            entry.insert(ProviderTrack::new(point));
            mirror_into_snapshot(state, provider_id, point.location);
            LocationUpdate::Accepted
        }
    };

    let label = match outcome {
        LocationUpdate::Accepted => "accepted",
        LocationUpdate::Stale => "stale",
    };
    state
        .metrics
        .location_updates_total
        .with_label_values(&[label])
        .inc();

    Ok(outcome)
}

fn mirror_into_snapshot(state: &AppState, provider_id: Uuid, location: GeoPoint) {
    if let Some(mut provider) = state.providers.get_mut(&provider_id) {
        provider.location = location;
        provider.updated_at = Utc::now();
    }
}

/// Distance traveled and average/max speed over the recorded track.
pub fn track_summary(track: &ProviderTrack) -> TrackSummary {
    let points: Vec<&TrackPoint> = track.points().collect();
    let mut distance_km = 0.0;
    let mut speeds = Vec::new();

    for pair in points.windows(2) {
        let leg_km = geo::haversine_km(&pair[0].location, &pair[1].location);
        distance_km += leg_km;

        let hours = (pair[1].observed_at - pair[0].observed_at).num_seconds() as f64 / 3600.0;
        if hours > 0.0 && leg_km > 0.0 {
            speeds.push(leg_km / hours);
        }
    }

    let avg_speed_kmh = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };
    let max_speed_kmh = speeds.iter().copied().fold(0.0, f64::max);

    TrackSummary {
        points: points.len(),
        distance_km: round_km(distance_km),
        avg_speed_kmh: round_km(avg_speed_kmh),
        max_speed_kmh: round_km(max_speed_kmh),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Eta {
    pub eta_minutes: i64,
    pub distance_km: f64,
}

/// ETA to `destination` from the provider's current position when known,
/// otherwise from `origin`. Uses the external routing provider when
/// configured; falls back to haversine × minutes-per-km silently.
pub async fn eta(
    state: &AppState,
    origin: GeoPoint,
    destination: GeoPoint,
    current: Option<GeoPoint>,
) -> Eta {
    let from = current.unwrap_or(origin);
    let directions = directions_or_fallback(
        state.routing.as_deref(),
        &from,
        &destination,
        state.config.minutes_per_km,
    )
    .await;

    Eta {
        eta_minutes: directions.duration_min,
        distance_km: round_km(directions.distance_km),
    }
}
