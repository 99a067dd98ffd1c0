use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::{Availability, Group, StatusReport, Target};
use crate::plugins::traits::{EventKind, NotificationEvent, NotifierPlugin};
use crate::state::RuntimeFlags;
use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Endpoint acknowledged the message
    Sent,
    /// Nothing was sent (suppressed or not alertable)
    Skipped,
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// Sends group notifications with a minimum gap between consecutive sends.
///
/// The gap is enforced here rather than per endpoint: every message leaving
/// the process goes through one throttle. Delivery failures are logged and
/// returned as an outcome, never as an error.
pub struct AlertDispatcher {
    notifier: Arc<dyn NotifierPlugin>,
    flags: Arc<RuntimeFlags>,
    min_delay: Duration,
    // Held across the wait and the send, so sends are serialised.
    last_sent: Mutex<Option<Instant>>,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn NotifierPlugin>,
        flags: Arc<RuntimeFlags>,
        min_delay: Duration,
    ) -> Self {
        Self {
            notifier,
            flags,
            min_delay,
            last_sent: Mutex::new(None),
        }
    }

    /// Alert `group` about the availability in `report`.
    pub async fn dispatch(
        &self,
        group: &Group,
        target: &Target,
        report: &StatusReport,
    ) -> DispatchOutcome {
        if report.availability == Availability::OutOfStock && self.flags.suppress_out_of_stock() {
            tracing::debug!("Suppressed out-of-stock alert for {}", target.url);
            return DispatchOutcome::Skipped;
        }

        let Some(event) = NotificationEvent::stock_change(&group.name, target, report) else {
            return DispatchOutcome::Skipped;
        };
        let outcome = self.send(&group.endpoint, &event).await;
        if outcome.is_sent() {
            tracing::info!(
                "Sent {} alert for {} to group {}",
                report.availability,
                target.name,
                group.name
            );
        }
        outcome
    }

    pub async fn send_test(&self, group: &Group) -> DispatchOutcome {
        self.send(&group.endpoint, &NotificationEvent::test(&group.name)).await
    }

    pub async fn send_summary(&self, group: &Group) -> DispatchOutcome {
        let event = NotificationEvent::summary(&group.name, &group.targets);
        self.send(&group.endpoint, &event).await
    }

    async fn send(&self, endpoint: &str, event: &NotificationEvent) -> DispatchOutcome {
        let mut last_sent = self.last_sent.lock().await;

        if let Some(previous) = *last_sent {
            tokio::time::sleep_until(previous + self.min_delay).await;
        }

        let delivery = match event.kind {
            EventKind::Test => self.notifier.test_connection(endpoint, &event.group).await,
            _ => self.notifier.notify(endpoint, event).await,
        };

        let outcome = match delivery {
            Ok(result) if result.success => DispatchOutcome::Sent,
            Ok(result) => {
                let error = AppError::Delivery {
                    status: result.status.unwrap_or_default(),
                    body: result.error.unwrap_or_default(),
                };
                tracing::warn!("Notification to group {} rejected: {}", event.group, error);
                DispatchOutcome::Failed {
                    reason: error.to_string(),
                }
            }
            Err(e) => {
                tracing::error!("Failed to deliver notification to group {}: {}", event.group, e);
                DispatchOutcome::Failed { reason: e.to_string() }
            }
        };

        *last_sent = Some(Instant::now());
        outcome
    }
}
