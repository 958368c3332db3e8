use serde::Serialize;

use crate::geo::{self, GeoPoint, DEGREES_PER_KM};
use crate::models::provider::ProviderSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub provider: ProviderSnapshot,
    pub distance_km: f64,
}

/// Radius search over a provider-location snapshot.
///
/// Eligible providers within `radius_km` of `center`, sorted ascending by
/// distance and truncated to `limit`. The sort is stable, so equal distances
/// keep the pool's original relative order. Returns an empty vec on an empty
/// pool or no matches, never an error.
///
/// A bounding-box pre-filter trims the pool before the exact haversine pass;
/// an O(n) scan is fine at the expected pool sizes.
pub fn find_candidates(
    center: &GeoPoint,
    radius_km: f64,
    pool: &[ProviderSnapshot],
    limit: usize,
) -> Vec<Candidate> {
    let lat_delta = radius_km * DEGREES_PER_KM;
    // Longitude degrees shrink with latitude; clamp the cosine so the box
    // stays finite near the poles.
    let lng_delta = radius_km * DEGREES_PER_KM / center.lat.to_radians().cos().abs().max(1e-6);

    let mut candidates: Vec<Candidate> = pool
        .iter()
        .filter(|provider| provider.is_eligible())
        .filter(|provider| {
            (provider.location.lat - center.lat).abs() <= lat_delta
                && (provider.location.lng - center.lng).abs() <= lng_delta
        })
        .filter_map(|provider| {
            let distance_km = geo::haversine_km(center, &provider.location);
            if distance_km <= radius_km {
                Some(Candidate {
                    provider: provider.clone(),
                    distance_km,
                })
            } else {
                None
            }
        })
        .collect();

    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::provider::ProviderStatus;

    fn provider(seed: u128, lat: f64, lng: f64) -> ProviderSnapshot {
        ProviderSnapshot {
            id: Uuid::from_u128(seed),
            name: format!("provider-{seed}"),
            location: GeoPoint::new(lat, lng),
            status: ProviderStatus::Available,
            approved: true,
            updated_at: Utc::now(),
        }
    }

    fn provider_km_north(seed: u128, center: &GeoPoint, km: f64) -> ProviderSnapshot {
        provider(seed, center.lat + km * DEGREES_PER_KM, center.lng)
    }

    #[test]
    fn empty_pool_yields_empty_result() {
        let center = GeoPoint::new(6.5244, 3.3792);
        assert!(find_candidates(&center, 5.0, &[], 10).is_empty());
    }

    #[test]
    fn lagos_radius_scenario() {
        let center = GeoPoint::new(6.5244, 3.3792);
        let pool = vec![
            provider_km_north(3, &center, 8.0),
            provider_km_north(1, &center, 1.0),
            provider_km_north(2, &center, 4.0),
        ];

        let result = find_candidates(&center, 5.0, &pool, 10);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].provider.id, Uuid::from_u128(1));
        assert_eq!(result[1].provider.id, Uuid::from_u128(2));
        assert!(result[0].distance_km < result[1].distance_km);
    }

    #[test]
    fn every_in_radius_provider_is_included() {
        let center = GeoPoint::new(6.5244, 3.3792);
        let pool: Vec<ProviderSnapshot> = (1..=20)
            .map(|i| provider_km_north(i as u128, &center, i as f64 * 0.4))
            .collect();

        let result = find_candidates(&center, 5.0, &pool, 100);

        for p in &pool {
            let d = geo::haversine_km(&center, &p.location);
            let included = result.iter().any(|c| c.provider.id == p.id);
            assert_eq!(included, d <= 5.0, "provider at {d:.3} km");
        }
    }

    #[test]
    fn ineligible_providers_are_excluded() {
        let center = GeoPoint::new(6.5244, 3.3792);
        let mut engaged = provider_km_north(1, &center, 1.0);
        engaged.status = ProviderStatus::Engaged;
        let mut offline = provider_km_north(2, &center, 1.0);
        offline.status = ProviderStatus::Offline;
        let mut unapproved = provider_km_north(3, &center, 1.0);
        unapproved.approved = false;
        let pool = vec![engaged, offline, unapproved, provider_km_north(4, &center, 1.0)];

        let result = find_candidates(&center, 5.0, &pool, 10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].provider.id, Uuid::from_u128(4));
    }

    #[test]
    fn equal_distances_keep_pool_order() {
        let center = GeoPoint::new(0.0, 0.0);
        let pool = vec![
            provider(7, 0.01, 0.0),
            provider(3, 0.01, 0.0),
            provider(9, 0.01, 0.0),
        ];

        let result = find_candidates(&center, 5.0, &pool, 10);
        let ids: Vec<Uuid> = result.iter().map(|c| c.provider.id).collect();
        assert_eq!(
            ids,
            vec![Uuid::from_u128(7), Uuid::from_u128(3), Uuid::from_u128(9)]
        );
    }

    #[test]
    fn result_is_truncated_to_limit() {
        let center = GeoPoint::new(6.5244, 3.3792);
        let pool: Vec<ProviderSnapshot> = (1..=8)
            .map(|i| provider_km_north(i as u128, &center, i as f64 * 0.1))
            .collect();

        let result = find_candidates(&center, 5.0, &pool, 3);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].provider.id, Uuid::from_u128(1));
    }
}
