use crate::config::DiscordConfig;
use crate::plugins::traits::{EventKind, NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
}

impl DiscordNotifier {
    /// Every webhook call is bounded by `timeout`, connect through body.
    pub fn new(config: DiscordConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(DiscordNotifier { client, config })
    }

    fn get_embed_color(&self, kind: &EventKind) -> u32 {
        match kind {
            EventKind::InStock => 0x00ff00, // Green for restocks
            EventKind::OutOfStock => 0xff3300,
            EventKind::Test | EventKind::Summary => 0x0099ff,
        }
    }

    fn get_title(&self, event: &NotificationEvent) -> String {
        let name = event
            .product
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or(event.group.as_str());

        match &event.kind {
            EventKind::InStock => format!("🎉 IN STOCK: {}", name),
            EventKind::OutOfStock => format!("❌ OUT OF STOCK: {}", name),
            EventKind::Test => format!("🧪 Connection test: {}", event.group),
            EventKind::Summary => format!("📋 Watching {} products", event.lines.len()),
        }
    }

    fn create_embed(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut embed = json!({
            "title": self.get_title(event),
            "color": self.get_embed_color(&event.kind),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut fields = Vec::new();

        if let Some(product) = &event.product {
            embed["url"] = json!(product.url);
            let description = match event.kind {
                EventKind::InStock => {
                    format!("**{}** is available. Go now: {}", product.name, product.url)
                }
                EventKind::OutOfStock => {
                    format!("**{}** has sold out: {}", product.name, product.url)
                }
                _ => product.url.clone(),
            };
            embed["description"] = json!(description);
        }

        if let Some(price) = &event.price {
            fields.push(json!({
                "name": "💰 Price",
                "value": price,
                "inline": true
            }));
        }

        fields.push(json!({
            "name": "📦 Group",
            "value": event.group,
            "inline": true
        }));

        if !event.lines.is_empty() {
            embed["description"] = json!(event.lines.join("\n"));
        }

        if let Some(image_url) = &event.image_url {
            embed["image"] = json!({ "url": image_url });
        }

        embed["fields"] = json!(fields);

        // Add footer
        embed["footer"] = json!({
            "text": "Restock Watcher"
        });

        embed
    }

    pub fn create_webhook_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut payload = match event.kind {
            // Connectivity checks stay a plain message
            EventKind::Test => json!({
                "content": format!(
                    "🧪 Restock Watcher connection test for group **{}**",
                    event.group
                )
            }),
            _ => json!({
                "embeds": [self.create_embed(event)]
            }),
        };

        // Add webhook customization
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    async fn notify(
        &self,
        endpoint: &str,
        event: &NotificationEvent,
    ) -> Result<NotificationResult, AppError> {
        let payload = self.create_webhook_payload(event);

        let response = self.client.post(endpoint).json(&payload).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(NotificationResult {
                success: true,
                status: Some(status.as_u16()),
                error: None,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Ok(NotificationResult {
            success: false,
            status: Some(status.as_u16()),
            error: Some(body),
        })
    }
}
