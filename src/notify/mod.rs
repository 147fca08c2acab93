//! Notification fan-out for changed orders.

mod discord;
mod slack;

pub use discord::DiscordSender;
pub use slack::SlackSender;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::order::Order;

/// Delivery errors. Logged by the router, never fatal to a run.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{channel} API error: {status}")]
    Api { channel: &'static str, status: u16 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A delivery channel. Receives the full changed batch once per run and
/// owns its per-recipient pacing and partial-failure isolation.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, batch: &[Order]) -> Result<(), NotifyError>;
}

/// Partitions changed orders by configured target and hands each partition
/// to its channel sender in a single call.
///
/// The Discord slot is optional: without a bot token the channel does not
/// exist, rather than existing and failing.
pub struct NotificationRouter {
    slack: Box<dyn ChannelSender>,
    discord: Option<Box<dyn ChannelSender>>,
}

impl NotificationRouter {
    pub fn new(slack: Box<dyn ChannelSender>, discord: Option<Box<dyn ChannelSender>>) -> Self {
        Self { slack, discord }
    }

    /// Deliver the changed batch. Failures are logged; state persistence
    /// must proceed regardless of delivery outcome.
    pub async fn dispatch(&self, changed: &[Order]) {
        let slack_batch: Vec<Order> = changed
            .iter()
            .filter(|o| o.slack_target().is_some())
            .cloned()
            .collect();
        let discord_batch: Vec<Order> = changed
            .iter()
            .filter(|o| o.discord_target().is_some())
            .cloned()
            .collect();

        debug!(
            changed = changed.len(),
            slack = slack_batch.len(),
            discord = discord_batch.len(),
            "dispatching notification batches"
        );

        if !slack_batch.is_empty() {
            if let Err(e) = self.slack.deliver(&slack_batch).await {
                warn!("{} delivery failed: {}", self.slack.name(), e);
            }
        }

        if !discord_batch.is_empty() {
            match &self.discord {
                Some(sender) => {
                    if let Err(e) = sender.deliver(&discord_batch).await {
                        warn!("{} delivery failed: {}", sender.name(), e);
                    }
                }
                None => {
                    warn!(
                        "{} changed order(s) have a Discord target but the Discord channel is disabled",
                        discord_batch.len()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ProductCategory;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct RecordingSender {
        name: &'static str,
        batches: Arc<Mutex<Vec<Vec<u64>>>>,
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn deliver(&self, batch: &[Order]) -> Result<(), NotifyError> {
            let order_nrs = batch.iter().map(|o| o.order_nr).collect();
            self.batches.lock().unwrap().push(order_nrs);
            Ok(())
        }
    }

    fn order(
        order_nr: u64,
        slack: bool,
        discord: bool,
    ) -> Order {
        Order {
            category: ProductCategory::AmdCpu,
            order_nr,
            zipcode: "1234AB".to_string(),
            slack_webhook_url: slack.then(|| "https://hooks.example.com/x".to_string()),
            slack_channel: slack.then(|| "#orders".to_string()),
            discord_user_id: discord.then(|| "42".to_string()),
            queue_nr: Some(7),
        }
    }

    fn recording(name: &'static str) -> (Box<dyn ChannelSender>, Arc<Mutex<Vec<Vec<u64>>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sender = RecordingSender {
            name,
            batches: batches.clone(),
        };
        (Box::new(sender), batches)
    }

    #[tokio::test]
    async fn test_dual_target_order_appears_once_per_sender() {
        let (slack, slack_batches) = recording("slack");
        let (discord, discord_batches) = recording("discord");
        let router = NotificationRouter::new(slack, Some(discord));

        router.dispatch(&[order(1, true, true)]).await;

        assert_eq!(*slack_batches.lock().unwrap(), vec![vec![1]]);
        assert_eq!(*discord_batches.lock().unwrap(), vec![vec![1]]);
    }

    #[tokio::test]
    async fn test_untargeted_order_is_dropped_silently() {
        let (slack, slack_batches) = recording("slack");
        let (discord, discord_batches) = recording("discord");
        let router = NotificationRouter::new(slack, Some(discord));

        router.dispatch(&[order(1, false, false)]).await;

        assert!(slack_batches.lock().unwrap().is_empty());
        assert!(discord_batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_each_sender_gets_one_batched_call() {
        let (slack, slack_batches) = recording("slack");
        let (discord, discord_batches) = recording("discord");
        let router = NotificationRouter::new(slack, Some(discord));

        router
            .dispatch(&[
                order(1, true, false),
                order(2, false, true),
                order(3, true, true),
            ])
            .await;

        assert_eq!(*slack_batches.lock().unwrap(), vec![vec![1, 3]]);
        assert_eq!(*discord_batches.lock().unwrap(), vec![vec![2, 3]]);
    }

    #[tokio::test]
    async fn test_disabled_discord_channel_is_a_noop() {
        let (slack, slack_batches) = recording("slack");
        let router = NotificationRouter::new(slack, None);

        router.dispatch(&[order(1, false, true)]).await;

        assert!(slack_batches.lock().unwrap().is_empty());
    }
}
