//! Broadcast Hub
//!
//! Fans a notification out to every registered connection.
//!
//! Delivery is fire-and-forget: at most once per recipient, no retry, no
//! acknowledgment. A recipient whose queue is gone is logged and skipped;
//! it stays registered until its own connection task ends and drops its
//! registration.

use std::sync::Arc;

use super::messages::Notification;
use super::registry::ConnectionRegistry;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients whose queue accepted the frame
    pub delivered: usize,
    /// Recipients whose write failed
    pub failed: usize,
}

impl DeliveryReport {
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Publishes notifications to all live connections
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `notification` to every connection currently registered
    ///
    /// Completes the whole fan-out before returning. Failures never
    /// propagate to the caller; they are logged and counted.
    pub fn publish(&self, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let text = match serde_json::to_string(notification) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    kind = ?notification.kind,
                    error = %e,
                    "Failed to serialize notification"
                );
                return report;
            }
        };

        self.registry.for_each(|connection| {
            match connection.send_text(text.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection_id = %connection.id(),
                        kind = ?notification.kind,
                        error = %e,
                        "Failed to deliver notification"
                    );
                }
            }
        });

        tracing::debug!(
            kind = ?notification.kind,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast notification"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Connection;
    use crate::websocket::messages::NotificationKind;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn posts_notification() -> Notification {
        Notification::new(NotificationKind::PostsUpdated, json!({ "allPosts": [] }))
    }

    #[test]
    fn test_publish_reaches_every_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = BroadcastHub::new(Arc::clone(&registry));

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.register(Connection::new(tx));
            receivers.push(rx);
        }

        let report = hub.publish(&posts_notification());
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 0);

        for rx in receivers.iter_mut() {
            let frame = rx.try_recv().unwrap();
            assert!(frame.contains("\"type\":\"updateAllPosts\""));
        }
    }

    #[test]
    fn test_one_failure_does_not_stop_fan_out() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = BroadcastHub::new(Arc::clone(&registry));

        let (tx_ok1, mut rx_ok1) = mpsc::unbounded_channel();
        let (tx_ok2, mut rx_ok2) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        registry.register(Connection::with_id("ok1", tx_ok1));
        registry.register(Connection::with_id("ok2", tx_ok2));
        registry.register(Connection::with_id("dead", tx_dead));
        drop(rx_dead);

        let report = hub.publish(&posts_notification());
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.recipients(), 3);

        assert!(rx_ok1.try_recv().is_ok());
        assert!(rx_ok2.try_recv().is_ok());

        // Failed recipients are left for their own task to clean up
        assert!(registry.contains("dead"));
    }

    #[test]
    fn test_unregistered_connection_not_delivered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = BroadcastHub::new(Arc::clone(&registry));

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(Connection::with_id("a", tx));
        registry.unregister("a");
        assert!(registry.is_empty());

        let report = hub.publish(&posts_notification());
        assert_eq!(report.recipients(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_with_no_connections() {
        let hub = BroadcastHub::new(Arc::new(ConnectionRegistry::new()));
        assert_eq!(hub.publish(&posts_notification()), DeliveryReport::default());
    }
}
