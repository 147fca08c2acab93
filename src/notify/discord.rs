//! Discord bot direct-message channel.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::{ChannelSender, NotifyError};
use crate::order::Order;

/// Sends one plain-text DM per recipient through the Discord REST API.
///
/// Constructed only when a bot token exists; absence of the token disables
/// the channel at the router instead.
pub struct DiscordSender {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl DiscordSender {
    pub fn new(client: reqwest::Client, token: String, api_base: String) -> Self {
        Self {
            client,
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Open (or reuse) the DM channel for a user and return its id.
    async fn open_dm(&self, user_id: &str) -> Result<String, NotifyError> {
        let resp = self
            .client
            .post(format!("{}/users/@me/channels", self.api_base))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({"recipient_id": user_id}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Api {
                channel: "discord",
                status: resp.status().as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        body["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| NotifyError::InvalidResponse("Missing DM channel id".to_string()))
    }

    async fn send_dm(&self, channel_id: &str, content: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({"content": content}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Api {
                channel: "discord",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn notify_user(&self, user_id: &str, order: &Order, position: u32) -> Result<(), NotifyError> {
        let channel_id = self.open_dm(user_id).await?;
        let content = format!(
            "Order {} ({}) | Queue nr: {}",
            order.order_nr, order.category, position
        );
        self.send_dm(&channel_id, &content).await
    }
}

#[async_trait]
impl ChannelSender for DiscordSender {
    fn name(&self) -> &'static str {
        "discord"
    }

    /// One DM per recipient; a failure for one recipient must not prevent
    /// delivery attempts to the remaining recipients in the batch.
    async fn deliver(&self, batch: &[Order]) -> Result<(), NotifyError> {
        let mut last_err = None;

        for order in batch {
            let Some(user_id) = order.discord_target() else {
                continue;
            };
            let Some(position) = order.queue_nr else {
                continue;
            };

            match self.notify_user(user_id, order, position).await {
                Ok(()) => {
                    info!("Discord DM sent to {} for order {}", user_id, order.order_nr);
                }
                Err(e) => {
                    warn!(
                        "Discord DM to {} for order {} failed: {}",
                        user_id, order.order_nr, e
                    );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ProductCategory;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order(order_nr: u64, user_id: &str, queue_nr: u32) -> Order {
        Order {
            category: ProductCategory::NvidiaGpu,
            order_nr,
            zipcode: "1234AB".to_string(),
            slack_webhook_url: None,
            slack_channel: None,
            discord_user_id: Some(user_id.to_string()),
            queue_nr: Some(queue_nr),
        }
    }

    fn sender(server: &MockServer) -> DiscordSender {
        DiscordSender::new(reqwest::Client::new(), "token123".to_string(), server.uri())
    }

    #[tokio::test]
    async fn test_dm_flow_opens_channel_then_posts_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .and(header("Authorization", "Bot token123"))
            .and(body_partial_json(serde_json::json!({"recipient_id": "42"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "C1"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/channels/C1/messages"))
            .and(body_partial_json(serde_json::json!({
                "content": "Order 123456 (Nvidia GPU) | Queue nr: 2009"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let batch = vec![order(123456, "42", 2009)];
        sender(&server).deliver(&batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_one_unreachable_recipient_does_not_block_the_rest() {
        let server = MockServer::start().await;

        // First recipient cannot be DMed, second can.
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .and(body_partial_json(serde_json::json!({"recipient_id": "1"})))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .and(body_partial_json(serde_json::json!({"recipient_id": "2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "C2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/C2/messages"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let batch = vec![order(10, "1", 5), order(20, "2", 6)];

        let result = sender(&server).deliver(&batch).await;
        assert!(matches!(
            result,
            Err(NotifyError::Api {
                channel: "discord",
                status: 403
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_channel_id_is_an_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let batch = vec![order(1, "42", 5)];
        let result = sender(&server).deliver(&batch).await;
        assert!(matches!(result, Err(NotifyError::InvalidResponse(_))));
    }
}
