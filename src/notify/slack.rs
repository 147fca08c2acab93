//! Slack webhook channel.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::{ChannelSender, NotifyError};
use crate::order::Order;

/// Posts one webhook note per changed order, in the classic `slack-notify`
/// note shape (username, icon, attachment fields).
pub struct SlackSender {
    client: reqwest::Client,
    username: String,
    icon_emoji: String,
}

impl SlackSender {
    pub fn new(client: reqwest::Client, username: String, icon_emoji: String) -> Self {
        Self {
            client,
            username,
            icon_emoji,
        }
    }

    async fn post_note(
        &self,
        webhook_url: &str,
        channel: &str,
        order: &Order,
        position: u32,
    ) -> Result<(), NotifyError> {
        let payload = json!({
            "channel": channel,
            "username": self.username,
            "icon_emoji": self.icon_emoji,
            "text": "Queue position update",
            "attachments": [{
                "fallback": format!(
                    "Order {} ({}) | Queue nr: {}",
                    order.order_nr, order.category, position
                ),
                "fields": [
                    {"title": "Queue", "value": order.category.to_string(), "short": true},
                    {"title": "Order", "value": order.order_nr.to_string(), "short": true},
                    {"title": "Position", "value": position.to_string(), "short": true},
                ],
            }],
        });

        let resp = self.client.post(webhook_url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Api {
                channel: "slack",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for SlackSender {
    fn name(&self) -> &'static str {
        "slack"
    }

    /// One HTTP call per configured channel; a failed post does not stop
    /// the rest of the batch.
    async fn deliver(&self, batch: &[Order]) -> Result<(), NotifyError> {
        let mut last_err = None;

        for order in batch {
            let Some((webhook_url, channel)) = order.slack_target() else {
                continue;
            };
            let Some(position) = order.queue_nr else {
                continue;
            };

            match self.post_note(webhook_url, channel, order, position).await {
                Ok(()) => {
                    info!(
                        "Slack note sent to {} for order {}",
                        channel, order.order_nr
                    );
                }
                Err(e) => {
                    warn!("Slack note for order {} failed: {}", order.order_nr, e);
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
