use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Availability, StatusReport, Target};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    /// A target became (or was seeded as) in stock
    InStock,
    OutOfStock,
    /// Connectivity check
    Test,
    /// Listing of a group's targets
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub group: String,
    pub product: Option<ProductInfo>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl NotificationEvent {
    /// Alert for a determinable report. `None` when the availability is unknown.
    pub fn stock_change(group: &str, target: &Target, report: &StatusReport) -> Option<Self> {
        let kind = match report.availability {
            Availability::InStock => EventKind::InStock,
            Availability::OutOfStock => EventKind::OutOfStock,
            Availability::Unknown => return None,
        };

        Some(Self {
            kind,
            group: group.to_string(),
            product: Some(ProductInfo {
                name: target.name.clone(),
                url: target.url.clone(),
            }),
            price: report.price.clone(),
            image_url: report.image_url.clone(),
            lines: Vec::new(),
        })
    }

    pub fn test(group: &str) -> Self {
        Self {
            kind: EventKind::Test,
            group: group.to_string(),
            product: None,
            price: None,
            image_url: None,
            lines: Vec::new(),
        }
    }

    pub fn summary(group: &str, targets: &[Target]) -> Self {
        Self {
            kind: EventKind::Summary,
            group: group.to_string(),
            product: None,
            price: None,
            image_url: None,
            lines: targets
                .iter()
                .map(|t| format!("[{}]({})", t.name, t.url))
                .collect(),
        }
    }
}

/// Outbound message transport (Discord webhooks and friends).
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    /// Deliver one event to `endpoint`. A non-success response is reported in
    /// the result; only transport failures are errors.
    async fn notify(
        &self,
        endpoint: &str,
        event: &NotificationEvent,
    ) -> Result<NotificationResult, AppError>;

    /// Send a benign connectivity message for `group`.
    async fn test_connection(
        &self,
        endpoint: &str,
        group: &str,
    ) -> Result<NotificationResult, AppError> {
        self.notify(endpoint, &NotificationEvent::test(group)).await
    }
}
