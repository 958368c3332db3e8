use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::{RequestStatus, ServiceRequest};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub enum AssignMode {
    /// A notified candidate claims the request itself.
    SelfAccept,
    /// The requester hand-picks a provider; the notified-set check is
    /// bypassed and repeating the same assignment is a no-op success.
    RequesterAssign,
}

/// Claims a pending request for `candidate_id`.
///
/// The check-and-set of assignee/status runs entirely under the map's shard
/// write guard for this request, so under N concurrent calls exactly one
/// succeeds and the rest observe `AlreadyAssigned`. This is the only
/// serialization point in the engine; `cancel` goes through the same guard.
pub fn assign(
    state: &AppState,
    request_id: Uuid,
    candidate_id: Uuid,
    mode: AssignMode,
) -> Result<ServiceRequest, AppError> {
    let mut request = state
        .requests
        .get_mut(&request_id)
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    let outcome = try_assign(&mut request, candidate_id, mode);

    let label = match &outcome {
        Ok(_) => "success",
        Err(AppError::AlreadyAssigned) => "already_assigned",
        Err(AppError::NotEligible) => "not_eligible",
        Err(_) => "error",
    };
    state
        .metrics
        .assignments_total
        .with_label_values(&[label])
        .inc();

    if outcome.is_ok() {
        info!(
            request_id = %request_id,
            provider_id = %candidate_id,
            mode = ?mode,
            "request assigned"
        );
    }

    outcome.map(|_| request.clone())
}

fn try_assign(
    request: &mut ServiceRequest,
    candidate_id: Uuid,
    mode: AssignMode,
) -> Result<(), AppError> {
    match mode {
        AssignMode::SelfAccept => {
            if request.assignee_id.is_some() {
                return Err(AppError::AlreadyAssigned);
            }
            if request.status != RequestStatus::Pending
                || !request.notified.contains(&candidate_id)
            {
                return Err(AppError::NotEligible);
            }
        }
        AssignMode::RequesterAssign => {
            // Repeating a won assignment is a no-op success.
            if request.status == RequestStatus::Assigned
                && request.assignee_id == Some(candidate_id)
            {
                return Ok(());
            }
            if request.assignee_id.is_some() {
                return Err(AppError::AlreadyAssigned);
            }
            if request.status != RequestStatus::Pending {
                return Err(AppError::InvalidTransition {
                    from: request.status.as_str(),
                    to: RequestStatus::Assigned.as_str(),
                });
            }
        }
    }

    request.assignee_id = Some(candidate_id);
    request.status = RequestStatus::Assigned;
    request.assigned_at = Some(Utc::now());
    Ok(())
}

pub fn start_pickup(state: &AppState, request_id: Uuid) -> Result<ServiceRequest, AppError> {
    transition(
        state,
        request_id,
        &[RequestStatus::Assigned],
        RequestStatus::PickedUp,
        |request| {
            request.picked_up_at = Some(Utc::now());
        },
    )
}

pub fn mark_in_transit(state: &AppState, request_id: Uuid) -> Result<ServiceRequest, AppError> {
    transition(
        state,
        request_id,
        &[RequestStatus::PickedUp],
        RequestStatus::InTransit,
        |request| {
            request.in_transit_at = Some(Utc::now());
        },
    )
}

pub fn mark_completed(state: &AppState, request_id: Uuid) -> Result<ServiceRequest, AppError> {
    transition(
        state,
        request_id,
        &[RequestStatus::PickedUp, RequestStatus::InTransit],
        RequestStatus::Completed,
        |request| {
            request.completed_at = Some(Utc::now());
        },
    )
}

/// Cancellation races against `assign` through the same per-request write
/// guard: whichever lands first wins, and a request can never end up both
/// cancelled and freshly assigned.
pub fn cancel(
    state: &AppState,
    request_id: Uuid,
    reason: Option<String>,
) -> Result<ServiceRequest, AppError> {
    transition(
        state,
        request_id,
        &[RequestStatus::Pending, RequestStatus::Assigned],
        RequestStatus::Cancelled,
        |request| {
            request.cancelled_at = Some(Utc::now());
            request.cancel_reason = reason;
        },
    )
}

pub fn reject(
    state: &AppState,
    request_id: Uuid,
    reason: Option<String>,
) -> Result<ServiceRequest, AppError> {
    transition(
        state,
        request_id,
        &[RequestStatus::Pending],
        RequestStatus::Rejected,
        |request| {
            request.rejected_at = Some(Utc::now());
            request.cancel_reason = reason;
        },
    )
}

pub fn fail(
    state: &AppState,
    request_id: Uuid,
    reason: Option<String>,
) -> Result<ServiceRequest, AppError> {
    transition(
        state,
        request_id,
        &[
            RequestStatus::Assigned,
            RequestStatus::PickedUp,
            RequestStatus::InTransit,
        ],
        RequestStatus::Failed,
        |request| {
            request.cancel_reason = reason;
        },
    )
}

/// Marks one waypoint done and reports whether the whole route is complete.
pub fn complete_waypoint(
    state: &AppState,
    request_id: Uuid,
    sequence: u32,
) -> Result<(ServiceRequest, bool), AppError> {
    let mut request = state
        .requests
        .get_mut(&request_id)
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    if !request.status.is_in_progress() {
        return Err(AppError::InvalidTransition {
            from: request.status.as_str(),
            to: "waypoint completion",
        });
    }

    let waypoint = request
        .waypoints
        .iter_mut()
        .find(|wp| wp.sequence == sequence)
        .ok_or_else(|| AppError::NotFound(format!("waypoint {sequence} not found")))?;

    if !waypoint.completed {
        waypoint.completed = true;
        waypoint.completed_at = Some(Utc::now());
    }

    let route_complete = request.is_route_complete();
    Ok((request.clone(), route_complete))
}

fn transition<F>(
    state: &AppState,
    request_id: Uuid,
    allowed_from: &[RequestStatus],
    to: RequestStatus,
    apply: F,
) -> Result<ServiceRequest, AppError>
where
    F: FnOnce(&mut ServiceRequest),
{
    let mut request = state
        .requests
        .get_mut(&request_id)
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    if !allowed_from.contains(&request.status) {
        return Err(AppError::InvalidTransition {
            from: request.status.as_str(),
            to: to.as_str(),
        });
    }

    let from = request.status;
    request.status = to;
    apply(&mut request);
    info!(
        request_id = %request_id,
        from = from.as_str(),
        to = request.status.as_str(),
        "request transitioned"
    );
    Ok(request.clone())
}
