use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::geo::{self, GeoPoint};

/// Result of a directions lookup, either from the external provider or from
/// the haversine fallback.
#[derive(Debug, Clone, Serialize)]
pub struct Directions {
    pub distance_km: f64,
    pub duration_min: i64,
    pub polyline: Option<String>,
}

/// External routing collaborator. Implementations talk to a road-network
/// service; absence or failure always degrades to the haversine fallback.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Directions, AppError>;
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    distance_km: f64,
    duration_min: i64,
    polyline: Option<String>,
}

/// HTTP directions client. Expects a JSON endpoint at
/// `{base_url}/directions` taking origin/destination coordinates as query
/// parameters.
pub struct HttpRoutingProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoutingProvider {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl RoutingProvider for HttpRoutingProvider {
    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Directions, AppError> {
        let url = format!("{}/directions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("origin_lat", origin.lat),
                ("origin_lng", origin.lng),
                ("dest_lat", destination.lat),
                ("dest_lng", destination.lng),
            ])
            .send()
            .await
            .map_err(|err| AppError::Internal(format!("routing request failed: {err}")))?
            .error_for_status()
            .map_err(|err| AppError::Internal(format!("routing provider error: {err}")))?;

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| AppError::Internal(format!("invalid routing response: {err}")))?;

        Ok(Directions {
            distance_km: body.distance_km,
            duration_min: body.duration_min,
            polyline: body.polyline,
        })
    }
}

/// Straight-line estimate used whenever no road-network answer is available.
pub fn fallback_directions(
    origin: &GeoPoint,
    destination: &GeoPoint,
    minutes_per_km: f64,
) -> Directions {
    let distance_km = geo::haversine_km(origin, destination);
    Directions {
        distance_km,
        duration_min: (distance_km * minutes_per_km).round() as i64,
        polyline: None,
    }
}

/// Provider when configured and reachable, fallback otherwise. The fallback
/// path is unconditional and silent; routing failures never surface to
/// callers.
pub async fn directions_or_fallback(
    provider: Option<&dyn RoutingProvider>,
    origin: &GeoPoint,
    destination: &GeoPoint,
    minutes_per_km: f64,
) -> Directions {
    if let Some(provider) = provider {
        match provider.directions(origin, destination).await {
            Ok(directions) => return directions,
            Err(err) => {
                warn!(error = %err, "routing provider unavailable, using haversine fallback");
            }
        }
    }

    fallback_directions(origin, destination, minutes_per_km)
}
