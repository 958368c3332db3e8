use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::request::ServiceKind;

/// Payload handed to the notification transport for each candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchNotification {
    pub provider_id: Uuid,
    pub request_id: Uuid,
    pub kind: ServiceKind,
    pub origin: GeoPoint,
    pub distance_km: f64,
    pub summary: String,
}

/// External notification collaborator (push/email/WebSocket system).
/// Failures here are non-fatal to a broadcast; the caller logs and skips.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: DispatchNotification) -> Result<(), AppError>;
}

/// Fan-out sink backed by a tokio broadcast channel; WebSocket subscribers
/// receive every notification. Having no subscribers is not a failure.
pub struct BroadcastSink {
    tx: broadcast::Sender<DispatchNotification>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<DispatchNotification>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn notify(&self, notification: DispatchNotification) -> Result<(), AppError> {
        let _ = self.tx.send(notification);
        Ok(())
    }
}

pub fn summary_for(kind: ServiceKind, distance_km: f64) -> String {
    let label = match kind {
        ServiceKind::Repair => "repair request",
        ServiceKind::Courier => "delivery request",
        ServiceKind::Ride => "ride request",
    };
    format!("New {label} {distance_km:.2} km from your location")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_names_the_service_kind() {
        assert!(summary_for(ServiceKind::Repair, 1.5).contains("repair"));
        assert!(summary_for(ServiceKind::Courier, 1.5).contains("delivery"));
        assert!(summary_for(ServiceKind::Ride, 1.5).contains("ride"));
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(8);
        let sink = BroadcastSink::new(tx);

        let notification = DispatchNotification {
            provider_id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            kind: ServiceKind::Ride,
            origin: GeoPoint::new(6.5244, 3.3792),
            distance_km: 2.0,
            summary: summary_for(ServiceKind::Ride, 2.0),
        };

        sink.notify(notification.clone()).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.request_id, notification.request_id);
    }

    #[tokio::test]
    async fn broadcast_sink_tolerates_no_subscribers() {
        let (tx, _) = broadcast::channel(8);
        let sink = BroadcastSink::new(tx);

        let notification = DispatchNotification {
            provider_id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            kind: ServiceKind::Courier,
            origin: GeoPoint::new(0.0, 0.0),
            distance_km: 0.5,
            summary: "test".to_string(),
        };

        assert!(sink.notify(notification).await.is_ok());
    }
}
