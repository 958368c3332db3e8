use serde::{Deserialize, Serialize};

use crate::error::AppError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Degrees of latitude spanned by one kilometer, used for bounding-box
/// pre-filtering before the exact haversine pass.
pub const DEGREES_PER_KM: f64 = 1.0 / 111.32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Initial compass bearing from `a` to `b`, normalized to [0, 360).
pub fn bearing_degrees(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::InvalidCoordinate { lat, lng });
    }
    Ok(())
}

/// Decodes an encoded polyline (signed-delta, base-64-ish, factor 1e-5) into
/// an ordered list of points. Only used when an external routing provider
/// supplies one.
pub fn decode_polyline(encoded: &str) -> Result<Vec<GeoPoint>, AppError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        lat += decode_varint(bytes, &mut index)?;
        lng += decode_varint(bytes, &mut index)?;
        points.push(GeoPoint {
            lat: lat as f64 * 1e-5,
            lng: lng as f64 * 1e-5,
        });
    }

    Ok(points)
}

fn decode_varint(bytes: &[u8], index: &mut usize) -> Result<i64, AppError> {
    let mut shift = 0u32;
    let mut result: i64 = 0;

    loop {
        let byte = *bytes
            .get(*index)
            .ok_or_else(|| AppError::BadRequest("truncated polyline".to_string()))?
            as i64
            - 63;
        if byte < 0 {
            return Err(AppError::BadRequest("invalid polyline byte".to_string()));
        }
        *index += 1;
        result |= (byte & 0x1F) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }

    if result & 1 != 0 {
        Ok(!(result >> 1))
    } else {
        Ok(result >> 1)
    }
}

/// Rounds at the API boundary only; internal math keeps full precision.
pub fn round_km(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(53.5511, 9.9937);
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(6.5244, 3.3792);
        let b = GeoPoint::new(6.4281, 3.4219);
        let ab = haversine_km(&a, &b);
        let ba = haversine_km(&b, &a);
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab > 0.0);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn bearing_due_east_is_90() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 1.0);
        assert!((bearing_degrees(&a, &b) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn bearing_is_always_in_range() {
        let a = GeoPoint::new(10.0, 20.0);
        let b = GeoPoint::new(-5.0, -120.0);
        let bearing = bearing_degrees(&a, &b);
        assert!((0.0..360.0).contains(&bearing));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(-91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
    }

    #[test]
    fn decodes_reference_polyline() {
        // Canonical example from the polyline format description.
        let points = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(points.len(), 3);
        assert!((points[0].lat - 38.5).abs() < 1e-5);
        assert!((points[0].lng - -120.2).abs() < 1e-5);
        assert!((points[2].lat - 43.252).abs() < 1e-5);
        assert!((points[2].lng - -126.453).abs() < 1e-5);
    }

    #[test]
    fn empty_polyline_decodes_to_no_points() {
        assert!(decode_polyline("").unwrap().is_empty());
    }

    #[test]
    fn truncated_polyline_is_rejected() {
        assert!(decode_polyline("_p~iF").is_err());
    }
}
