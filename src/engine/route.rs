use serde::Serialize;

use crate::error::AppError;
use crate::geo;
use crate::models::waypoint::Waypoint;

#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub waypoints: Vec<Waypoint>,
    pub total_distance_km: f64,
    pub total_duration_min: i64,
}

/// Nearest-neighbor waypoint reordering.
///
/// The first waypoint is fixed as the start; each step appends the unvisited
/// waypoint closest to the last-placed one, ties broken by input order.
/// Sequence numbers are rewritten to the optimized order (1..N). Duration is
/// the straight-line estimate, used when no road-network duration exists.
pub fn optimize(waypoints: &[Waypoint], minutes_per_km: f64) -> Result<RoutePlan, AppError> {
    if waypoints.len() < 2 {
        return Err(AppError::InvalidInput(
            "route optimization requires at least 2 waypoints".to_string(),
        ));
    }

    let mut remaining: Vec<&Waypoint> = waypoints.iter().skip(1).collect();
    let mut ordered: Vec<Waypoint> = vec![waypoints[0].clone()];

    while !remaining.is_empty() {
        let last = &ordered[ordered.len() - 1].location;
        let mut best_index = 0;
        let mut best_distance = f64::INFINITY;
        for (index, candidate) in remaining.iter().enumerate() {
            let distance = geo::haversine_km(last, &candidate.location);
            // Strict < keeps the earliest input-order waypoint on ties.
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
            }
        }
        ordered.push(remaining.remove(best_index).clone());
    }

    let mut total_distance_km = 0.0;
    for pair in ordered.windows(2) {
        total_distance_km += geo::haversine_km(&pair[0].location, &pair[1].location);
    }

    for (position, waypoint) in ordered.iter_mut().enumerate() {
        waypoint.sequence = position as u32 + 1;
    }

    Ok(RoutePlan {
        waypoints: ordered,
        total_distance_km,
        total_duration_min: (total_distance_km * minutes_per_km).round() as i64,
    })
}

/// base + distance×perKm + duration×perMin, rounded to 2 decimals at the
/// boundary only.
pub fn estimate_fare(
    distance_km: f64,
    duration_min: f64,
    base_fare: f64,
    per_km_rate: f64,
    per_min_rate: f64,
) -> f64 {
    let total = base_fare + distance_km * per_km_rate + duration_min * per_min_rate;
    (total * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::models::waypoint::WaypointKind;

    fn waypoint(sequence: u32, lat: f64, lng: f64) -> Waypoint {
        Waypoint::new(sequence, WaypointKind::Intermediate, GeoPoint::new(lat, lng))
    }

    #[test]
    fn fewer_than_two_waypoints_is_invalid_input() {
        assert!(matches!(
            optimize(&[], 2.0).unwrap_err(),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            optimize(&[waypoint(1, 0.0, 0.0)], 2.0).unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }

    #[test]
    fn two_points_keep_their_order() {
        let a = waypoint(1, 6.5244, 3.3792);
        let b = waypoint(2, 6.4281, 3.4219);
        let plan = optimize(&[a.clone(), b.clone()], 2.0).unwrap();

        assert_eq!(plan.waypoints.len(), 2);
        assert_eq!(plan.waypoints[0].location, a.location);
        assert_eq!(plan.waypoints[1].location, b.location);

        let expected = geo::haversine_km(&a.location, &b.location);
        assert!((plan.total_distance_km - expected).abs() < 1e-9);
    }

    #[test]
    fn nearest_neighbor_reorders_out_of_order_stops() {
        // Input A(0,0), C(0,2), B(0,1): greedy from A picks B before C.
        let a = waypoint(1, 0.0, 0.0);
        let c = waypoint(2, 0.0, 2.0);
        let b = waypoint(3, 0.0, 1.0);
        let plan = optimize(&[a.clone(), c.clone(), b.clone()], 2.0).unwrap();

        let lngs: Vec<f64> = plan.waypoints.iter().map(|wp| wp.location.lng).collect();
        assert_eq!(lngs, vec![0.0, 1.0, 2.0]);

        let expected = geo::haversine_km(&a.location, &b.location)
            + geo::haversine_km(&b.location, &c.location);
        assert!((plan.total_distance_km - expected).abs() < 1e-9);
        assert_eq!(
            plan.total_duration_min,
            (expected * 2.0).round() as i64
        );
    }

    #[test]
    fn sequences_are_rewritten_to_route_order() {
        let plan = optimize(
            &[
                waypoint(1, 0.0, 0.0),
                waypoint(2, 0.0, 2.0),
                waypoint(3, 0.0, 1.0),
            ],
            2.0,
        )
        .unwrap();

        let sequences: Vec<u32> = plan.waypoints.iter().map(|wp| wp.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn equidistant_stops_keep_input_order() {
        // B and C both 1 degree from A; B comes first in the input.
        let plan = optimize(
            &[
                waypoint(1, 0.0, 0.0),
                waypoint(2, 0.0, 1.0),
                waypoint(3, 0.0, -1.0),
            ],
            2.0,
        )
        .unwrap();

        assert_eq!(plan.waypoints[1].location.lng, 1.0);
        assert_eq!(plan.waypoints[2].location.lng, -1.0);
    }

    #[test]
    fn fare_is_linear_and_rounded_at_the_boundary() {
        let fare = estimate_fare(10.0, 20.0, 500.0, 120.0, 25.0);
        assert_eq!(fare, 500.0 + 1200.0 + 500.0);

        let fractional = estimate_fare(1.234, 2.468, 100.0, 33.33, 11.11);
        let raw = 100.0 + 1.234 * 33.33 + 2.468 * 11.11;
        assert_eq!(fractional, (raw * 100.0_f64).round() / 100.0);
    }
}
