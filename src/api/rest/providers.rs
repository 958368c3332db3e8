use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::locator::{find_candidates, Candidate};
use crate::engine::tracker::{self, LocationUpdate, TrackSummary};
use crate::error::AppError;
use crate::geo::{self, GeoPoint};
use crate::models::provider::{ProviderSnapshot, ProviderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", post(create_provider).get(list_providers))
        .route("/providers/nearby", get(nearby_providers))
        .route("/providers/:id/status", patch(update_provider_status))
        .route("/providers/:id/location", patch(update_provider_location))
        .route("/providers/:id/track", get(provider_track))
}

#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    pub location: GeoPoint,
    #[serde(default = "default_approved")]
    pub approved: bool,
}

fn default_approved() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ProviderStatus,
    pub approved: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lng: f64,
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct UpdateLocationResponse {
    pub provider_id: Uuid,
    pub outcome: LocationUpdate,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

async fn create_provider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProviderRequest>,
) -> Result<Json<ProviderSnapshot>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    geo::validate_coordinates(payload.location.lat, payload.location.lng)?;

    let provider = ProviderSnapshot {
        id: Uuid::new_v4(),
        name: payload.name,
        location: payload.location,
        status: ProviderStatus::Available,
        approved: payload.approved,
        updated_at: Utc::now(),
    };

    state.providers.insert(provider.id, provider.clone());
    Ok(Json(provider))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderSnapshot>> {
    Json(state.provider_pool())
}

async fn nearby_providers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    geo::validate_coordinates(query.lat, query.lng)?;

    let center = GeoPoint::new(query.lat, query.lng);
    let radius_km = query.radius_km.unwrap_or(state.config.default_radius_km);
    let limit = query.limit.unwrap_or(state.config.candidate_limit);

    let pool = state.provider_pool();
    let mut candidates = find_candidates(&center, radius_km, &pool, limit);
    for candidate in &mut candidates {
        candidate.distance_km = geo::round_km(candidate.distance_km);
    }

    Ok(Json(candidates))
}

async fn update_provider_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ProviderSnapshot>, AppError> {
    let mut provider = state
        .providers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("provider {id} not found")))?;

    provider.status = payload.status;
    if let Some(approved) = payload.approved {
        provider.approved = approved;
    }
    provider.updated_at = Utc::now();

    Ok(Json(provider.clone()))
}

async fn update_provider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<UpdateLocationResponse>, AppError> {
    if !state.providers.contains_key(&id) {
        return Err(AppError::NotFound(format!("provider {id} not found")));
    }

    let observed_at = payload.observed_at.unwrap_or_else(Utc::now);
    let outcome = tracker::update_location(&state, id, payload.lat, payload.lng, observed_at)?;

    Ok(Json(UpdateLocationResponse {
        provider_id: id,
        outcome,
    }))
}

async fn provider_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackSummary>, AppError> {
    let track = state
        .tracks
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no track for provider {id}")))?;

    Ok(Json(tracker::track_summary(&track)))
}
