use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::locator::find_candidates;
use crate::error::AppError;
use crate::models::request::RequestStatus;
use crate::notify::{summary_for, DispatchNotification};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub request_id: Uuid,
    pub radius_km: Option<f64>,
}

/// Bounded retry with exponential backoff, framework-independent so the
/// broadcaster does not depend on any task-queue runtime.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(state: &AppState) -> Self {
        Self {
            max_attempts: state.config.broadcast_max_attempts,
            base_delay: Duration::from_secs(state.config.broadcast_backoff_secs),
        }
    }

    /// delay = base × 2^attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

pub async fn enqueue_dispatch(state: &AppState, job: DispatchJob) -> Result<(), AppError> {
    state
        .dispatch_tx
        .send(job)
        .await
        .map_err(|err| AppError::Internal(format!("dispatch queue send failed: {err}")))?;

    state.metrics.dispatch_jobs_in_queue.inc();
    Ok(())
}

/// Background dispatch loop: runs candidate search and notification fan-out
/// for each queued request, decoupled from the request-creation path.
pub async fn run_dispatch_engine(state: Arc<AppState>, mut job_rx: mpsc::Receiver<DispatchJob>) {
    info!("dispatch engine started");

    while let Some(job) = job_rx.recv().await {
        state.metrics.dispatch_jobs_in_queue.dec();

        let radius_km = job.radius_km.unwrap_or(state.config.default_radius_km);
        let start = Instant::now();
        let notified = broadcast(&state, job.request_id, radius_km).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = if notified > 0 { "notified" } else { "empty" };
        state
            .metrics
            .assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed);
        state
            .metrics
            .broadcasts_total
            .with_label_values(&[outcome])
            .inc();
    }

    warn!("dispatch engine stopped: job channel closed");
}

/// Finds candidates around the request origin, records them in the notified
/// set and hands notifications to the sink. Returns the number of providers
/// newly added to the notified set.
///
/// Transient failures are retried with exponential backoff; after exhaustion
/// the request is left Pending and re-broadcastable, never failed outright.
pub async fn broadcast(state: &AppState, request_id: Uuid, radius_km: f64) -> usize {
    let policy = RetryPolicy::from_config(state);

    for attempt in 0..policy.max_attempts {
        match try_broadcast(state, request_id, radius_km).await {
            Ok(notified) => return notified,
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    attempt,
                    error = %err,
                    "broadcast attempt failed"
                );
                if attempt + 1 < policy.max_attempts {
                    sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    error!(
        request_id = %request_id,
        attempts = policy.max_attempts,
        "broadcast retries exhausted; request stays pending"
    );
    0
}

async fn try_broadcast(
    state: &AppState,
    request_id: Uuid,
    radius_km: f64,
) -> Result<usize, AppError> {
    let (origin, kind) = {
        let request = state
            .requests
            .get(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        // Never re-broadcast a claimed or settled request.
        if request.assignee_id.is_some() || request.status != RequestStatus::Pending {
            info!(
                request_id = %request_id,
                status = request.status.as_str(),
                "skipping broadcast for non-pending request"
            );
            return Ok(0);
        }

        (request.origin, request.kind)
    };

    let pool = state.provider_pool();
    let candidates = find_candidates(&origin, radius_km, &pool, state.config.candidate_limit);

    let mut newly_notified = 0;
    for candidate in &candidates {
        let inserted = match state.requests.get_mut(&request_id) {
            Some(mut request) => request.notified.insert(candidate.provider.id),
            None => {
                return Err(AppError::NotFound(format!(
                    "request {request_id} disappeared mid-broadcast"
                )))
            }
        };
        if inserted {
            newly_notified += 1;
        }

        let notification = DispatchNotification {
            provider_id: candidate.provider.id,
            request_id,
            kind,
            origin,
            distance_km: crate::geo::round_km(candidate.distance_km),
            summary: summary_for(kind, candidate.distance_km),
        };

        // A failing sink must not abort the batch.
        if let Err(err) = state.notifier.notify(notification).await {
            warn!(
                request_id = %request_id,
                provider_id = %candidate.provider.id,
                error = %err,
                "notification failed; candidate skipped"
            );
        }
    }

    let kind_label = format!("{kind:?}");
    state
        .metrics
        .providers_notified_total
        .with_label_values(&[kind_label.as_str()])
        .inc_by(newly_notified as u64);

    info!(
        request_id = %request_id,
        candidates = candidates.len(),
        newly_notified,
        radius_km,
        "broadcast complete"
    );
    Ok(newly_notified)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::config::Config;
    use crate::geo::{GeoPoint, DEGREES_PER_KM};
    use crate::models::provider::{ProviderSnapshot, ProviderStatus};
    use crate::models::request::{ServiceKind, ServiceRequest};
    use crate::notify::NotificationSink;

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn notify(&self, _: DispatchNotification) -> Result<(), AppError> {
            Err(AppError::Internal("sink down".to_string()))
        }
    }

    fn test_state() -> Arc<AppState> {
        let config = Config {
            broadcast_backoff_secs: 0,
            ..Config::default()
        };
        let (state, _rx) = AppState::new(config);
        Arc::new(state)
    }

    fn seed_provider(state: &AppState, center: &GeoPoint, km_north: f64) -> Uuid {
        let provider = ProviderSnapshot {
            id: Uuid::new_v4(),
            name: "test-provider".to_string(),
            location: GeoPoint::new(center.lat + km_north * DEGREES_PER_KM, center.lng),
            status: ProviderStatus::Available,
            approved: true,
            updated_at: Utc::now(),
        };
        let id = provider.id;
        state.providers.insert(id, provider);
        id
    }

    fn seed_request(state: &AppState, origin: GeoPoint) -> Uuid {
        let request = ServiceRequest::new(ServiceKind::Repair, Uuid::new_v4(), origin);
        let id = request.id;
        state.requests.insert(id, request);
        id
    }

    #[tokio::test]
    async fn broadcast_records_in_radius_candidates() {
        let state = test_state();
        let origin = GeoPoint::new(6.5244, 3.3792);
        let near = seed_provider(&state, &origin, 1.0);
        let mid = seed_provider(&state, &origin, 4.0);
        let far = seed_provider(&state, &origin, 8.0);

        let request_id = seed_request(&state, origin);
        let notified = broadcast(&state, request_id, 5.0).await;

        assert_eq!(notified, 2);
        let request = state.requests.get(&request_id).unwrap();
        assert!(request.notified.contains(&near));
        assert!(request.notified.contains(&mid));
        assert!(!request.notified.contains(&far));
    }

    #[tokio::test]
    async fn broadcast_is_idempotent_per_provider() {
        let state = test_state();
        let origin = GeoPoint::new(6.5244, 3.3792);
        seed_provider(&state, &origin, 1.0);
        let request_id = seed_request(&state, origin);

        assert_eq!(broadcast(&state, request_id, 5.0).await, 1);
        // Same candidate again: already in the notified set.
        assert_eq!(broadcast(&state, request_id, 5.0).await, 0);
        assert_eq!(state.requests.get(&request_id).unwrap().notified.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_skips_assigned_requests() {
        let state = test_state();
        let origin = GeoPoint::new(6.5244, 3.3792);
        seed_provider(&state, &origin, 1.0);
        let request_id = seed_request(&state, origin);

        let assignee = Uuid::new_v4();
        {
            let mut request = state.requests.get_mut(&request_id).unwrap();
            request.assignee_id = Some(assignee);
            request.status = RequestStatus::Assigned;
        }

        assert_eq!(broadcast(&state, request_id, 5.0).await, 0);
        let request = state.requests.get(&request_id).unwrap();
        assert!(request.notified.is_empty());
        assert_eq!(request.assignee_id, Some(assignee));
    }

    #[tokio::test]
    async fn sink_failure_does_not_reduce_notified_count() {
        let config = Config {
            broadcast_backoff_secs: 0,
            ..Config::default()
        };
        let (mut state, _rx) = AppState::new(config);
        state.notifier = Arc::new(FailingSink);
        let state = Arc::new(state);

        let origin = GeoPoint::new(6.5244, 3.3792);
        seed_provider(&state, &origin, 1.0);
        seed_provider(&state, &origin, 2.0);
        let request_id = seed_request(&state, origin);

        assert_eq!(broadcast(&state, request_id, 5.0).await, 2);
        assert_eq!(state.requests.get(&request_id).unwrap().notified.len(), 2);
    }

    #[tokio::test]
    async fn missing_request_exhausts_retries_and_returns_zero() {
        let state = test_state();
        assert_eq!(broadcast(&state, Uuid::new_v4(), 5.0).await, 0);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(120));
        assert_eq!(policy.delay_for(2), Duration::from_secs(240));
    }
}
