//! Order model and the closed set of tracked product categories.

use serde::{Deserialize, Serialize};

/// Product categories the vendor exposes a queue-check form for.
///
/// Each category maps to exactly one form page and one check endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCategory {
    #[serde(rename = "AMD CPU")]
    AmdCpu,
    #[serde(rename = "AMD GPU")]
    AmdGpu,
    #[serde(rename = "Nvidia GPU")]
    NvidiaGpu,
}

impl ProductCategory {
    /// Form page URL and the exact URL of the check response to intercept.
    ///
    /// The scheme mix (https form, http check for two categories) is what
    /// the vendor actually serves; matching is exact string equality.
    pub fn endpoints(&self) -> (&'static str, &'static str) {
        match self {
            ProductCategory::AmdCpu => (
                "https://include.alternate.nl/ryzen5000",
                "http://include.alternate.nl/ryzen5000/check.php",
            ),
            ProductCategory::AmdGpu => (
                "https://include.alternate.nl/rx6x00",
                "https://include.alternate.nl/rx6x00/check.php",
            ),
            ProductCategory::NvidiaGpu => (
                "https://include.alternate.nl/3080",
                "http://include.alternate.nl/3080/check.php",
            ),
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProductCategory::AmdCpu => "AMD CPU",
            ProductCategory::AmdGpu => "AMD GPU",
            ProductCategory::NvidiaGpu => "Nvidia GPU",
        };
        f.write_str(name)
    }
}

/// One tracked purchase.
///
/// Serialized field names mirror the persisted JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "type")]
    pub category: ProductCategory,
    pub order_nr: u64,
    pub zipcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_nr: Option<u32>,
}

impl Order {
    /// Slack delivery needs both the webhook URL and a channel name.
    pub fn slack_target(&self) -> Option<(&str, &str)> {
        match (&self.slack_webhook_url, &self.slack_channel) {
            (Some(url), Some(channel)) => Some((url, channel)),
            _ => None,
        }
    }

    /// Discord delivery needs a recipient user id.
    pub fn discord_target(&self) -> Option<&str> {
        self.discord_user_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_json_field_names() {
        let json = serde_json::json!({
            "type": "AMD CPU",
            "orderNr": 123456,
            "zipcode": "1234AB",
            "slackWebhookUrl": "https://hooks.example.com/x",
            "slackChannel": "#orders",
            "queueNr": 42
        });

        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.category, ProductCategory::AmdCpu);
        assert_eq!(order.order_nr, 123456);
        assert_eq!(order.queue_nr, Some(42));
        assert!(order.slack_target().is_some());
        assert!(order.discord_target().is_none());
    }

    #[test]
    fn test_absent_optionals_are_omitted() {
        let order = Order {
            category: ProductCategory::NvidiaGpu,
            order_nr: 1,
            zipcode: "1000AA".to_string(),
            slack_webhook_url: None,
            slack_channel: None,
            discord_user_id: None,
            queue_nr: None,
        };

        let json = serde_json::to_value(&order).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["type"], "Nvidia GPU");
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let json = serde_json::json!({
            "type": "Intel CPU",
            "orderNr": 1,
            "zipcode": "1234AB"
        });

        assert!(serde_json::from_value::<Order>(json).is_err());
    }

    #[test]
    fn test_slack_target_needs_both_fields() {
        let mut order = Order {
            category: ProductCategory::AmdGpu,
            order_nr: 2,
            zipcode: "5678CD".to_string(),
            slack_webhook_url: Some("https://hooks.example.com/y".to_string()),
            slack_channel: None,
            discord_user_id: None,
            queue_nr: None,
        };
        assert!(order.slack_target().is_none());

        order.slack_channel = Some("#orders".to_string());
        assert!(order.slack_target().is_some());
    }

    #[test]
    fn test_endpoint_table() {
        let (form, check) = ProductCategory::AmdCpu.endpoints();
        assert!(form.ends_with("/ryzen5000"));
        assert!(check.ends_with("/ryzen5000/check.php"));

        let (form, check) = ProductCategory::NvidiaGpu.endpoints();
        assert!(form.ends_with("/3080"));
        assert!(check.ends_with("/3080/check.php"));
    }
}
