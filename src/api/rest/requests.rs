use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::broadcast::{broadcast, enqueue_dispatch, DispatchJob};
use crate::engine::lifecycle::{self, AssignMode};
use crate::engine::route::{estimate_fare, optimize};
use crate::engine::tracker::{self, Eta};
use crate::error::AppError;
use crate::geo::{self, round_km, GeoPoint};
use crate::models::request::{Fare, ServiceKind, ServiceRequest};
use crate::models::waypoint::{Waypoint, WaypointKind};
use crate::routing::fallback_directions;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/broadcast", post(rebroadcast))
        .route("/requests/:id/assign", post(assign))
        .route("/requests/:id/pickup", post(start_pickup))
        .route("/requests/:id/transit", post(mark_in_transit))
        .route("/requests/:id/complete", post(mark_completed))
        .route("/requests/:id/cancel", post(cancel))
        .route("/requests/:id/reject", post(reject))
        .route("/requests/:id/fail", post(fail))
        .route(
            "/requests/:id/waypoints/:sequence/complete",
            post(complete_waypoint),
        )
        .route("/requests/:id/route/optimize", post(optimize_route))
        .route("/requests/:id/eta", get(request_eta))
}

#[derive(Deserialize)]
pub struct WaypointInput {
    pub kind: WaypointKind,
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct CreateRequestPayload {
    pub kind: ServiceKind,
    pub requester_id: Uuid,
    pub origin: GeoPoint,
    pub destination: Option<GeoPoint>,
    #[serde(default)]
    pub waypoints: Vec<WaypointInput>,
    pub radius_km: Option<f64>,
}

#[derive(Deserialize)]
pub struct AssignPayload {
    pub provider_id: Uuid,
    pub mode: AssignMode,
}

#[derive(Deserialize)]
pub struct ReasonPayload {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RadiusPayload {
    pub radius_km: Option<f64>,
}

#[derive(Serialize)]
pub struct BroadcastResponse {
    pub request_id: Uuid,
    pub notified: usize,
}

#[derive(Serialize)]
pub struct WaypointCompletionResponse {
    pub request: ServiceRequest,
    pub route_complete: bool,
}

#[derive(Serialize)]
pub struct OptimizeResponse {
    pub waypoints: Vec<Waypoint>,
    pub total_distance_km: f64,
    pub total_duration_min: i64,
    pub estimated_fare: f64,
}

#[derive(Deserialize)]
pub struct EtaQuery {
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<ServiceRequest>, AppError> {
    geo::validate_coordinates(payload.origin.lat, payload.origin.lng)?;
    if let Some(destination) = &payload.destination {
        geo::validate_coordinates(destination.lat, destination.lng)?;
    }
    for waypoint in &payload.waypoints {
        geo::validate_coordinates(waypoint.location.lat, waypoint.location.lng)?;
    }

    let mut request = ServiceRequest::new(payload.kind, payload.requester_id, payload.origin);
    request.destination = payload.destination;
    request.waypoints = payload
        .waypoints
        .iter()
        .enumerate()
        .map(|(index, wp)| Waypoint::new(index as u32 + 1, wp.kind, wp.location))
        .collect();

    // Fare is estimated once here; it is immutable after the request leaves
    // Pending.
    if let Some(destination) = &request.destination {
        let directions = fallback_directions(
            &request.origin,
            destination,
            state.config.minutes_per_km,
        );
        let total = estimate_fare(
            directions.distance_km,
            directions.duration_min as f64,
            state.config.base_fare,
            state.config.per_km_rate,
            state.config.per_min_rate,
        );
        request.fare = Some(Fare {
            base: state.config.base_fare,
            distance: round_km(directions.distance_km * state.config.per_km_rate),
            total,
        });
        request.total_distance_km = Some(round_km(directions.distance_km));
        request.total_duration_min = Some(directions.duration_min);
    }

    state.requests.insert(request.id, request.clone());
    enqueue_dispatch(
        &state,
        DispatchJob {
            request_id: request.id,
            radius_km: payload.radius_km,
        },
    )
    .await?;

    Ok(Json(request))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    Ok(Json(request.value().clone()))
}

/// Manual re-broadcast, the recovery path after retry exhaustion or a
/// scheduled sweep.
async fn rebroadcast(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RadiusPayload>>,
) -> Result<Json<BroadcastResponse>, AppError> {
    if !state.requests.contains_key(&id) {
        return Err(AppError::NotFound(format!("request {id} not found")));
    }

    let radius_km = payload
        .and_then(|Json(body)| body.radius_km)
        .unwrap_or(state.config.default_radius_km);
    let notified = broadcast(&state, id, radius_km).await;

    Ok(Json(BroadcastResponse {
        request_id: id,
        notified,
    }))
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignPayload>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = lifecycle::assign(&state, id, payload.provider_id, payload.mode)?;
    Ok(Json(request))
}

async fn start_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(lifecycle::start_pickup(&state, id)?))
}

async fn mark_in_transit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(lifecycle::mark_in_transit(&state, id)?))
}

async fn mark_completed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(lifecycle::mark_completed(&state, id)?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonPayload>>,
) -> Result<Json<ServiceRequest>, AppError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    Ok(Json(lifecycle::cancel(&state, id, reason)?))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonPayload>>,
) -> Result<Json<ServiceRequest>, AppError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    Ok(Json(lifecycle::reject(&state, id, reason)?))
}

async fn fail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonPayload>>,
) -> Result<Json<ServiceRequest>, AppError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    Ok(Json(lifecycle::fail(&state, id, reason)?))
}

async fn complete_waypoint(
    State(state): State<Arc<AppState>>,
    Path((id, sequence)): Path<(Uuid, u32)>,
) -> Result<Json<WaypointCompletionResponse>, AppError> {
    let (request, route_complete) = lifecycle::complete_waypoint(&state, id, sequence)?;
    Ok(Json(WaypointCompletionResponse {
        request,
        route_complete,
    }))
}

async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OptimizeResponse>, AppError> {
    let waypoints = {
        let request = state
            .requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;
        request.waypoints.clone()
    };

    let plan = optimize(&waypoints, state.config.minutes_per_km)?;
    let estimated_fare = estimate_fare(
        plan.total_distance_km,
        plan.total_duration_min as f64,
        state.config.base_fare,
        state.config.per_km_rate,
        state.config.per_min_rate,
    );

    let total_distance_km = round_km(plan.total_distance_km);
    {
        let mut request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;
        request.waypoints = plan.waypoints.clone();
        request.total_distance_km = Some(total_distance_km);
        request.total_duration_min = Some(plan.total_duration_min);
    }

    Ok(Json(OptimizeResponse {
        waypoints: plan.waypoints,
        total_distance_km,
        total_duration_min: plan.total_duration_min,
        estimated_fare,
    }))
}

async fn request_eta(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EtaQuery>,
) -> Result<Json<Eta>, AppError> {
    let (origin, destination) = {
        let request = state
            .requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;
        let destination = request.destination.ok_or_else(|| {
            AppError::InvalidInput("request has no destination for an eta".to_string())
        })?;
        (request.origin, destination)
    };

    let current = match (query.current_lat, query.current_lng) {
        (Some(lat), Some(lng)) => {
            geo::validate_coordinates(lat, lng)?;
            Some(GeoPoint::new(lat, lng))
        }
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "current_lat and current_lng must be provided together".to_string(),
            ))
        }
    };

    let eta = tracker::eta(&state, origin, destination, current).await;
    Ok(Json(eta))
}
