//! Persisted run state: the order list and the last-run stamp.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::order::Order;

/// `lastRun` value of a state file that has never completed a run.
pub const LAST_RUN_INIT: &str = "INIT";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The persisted document. Owned exclusively by the orchestrator for the
/// duration of one run; no locking guards against overlapping runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub last_run: String,
    pub orders: Vec<Order>,
}

impl RunState {
    pub fn empty() -> Self {
        Self {
            last_run: LAST_RUN_INIT.to_string(),
            orders: Vec::new(),
        }
    }

    /// Load the state file, seeding an empty document first if absent.
    pub async fn load_or_init(path: &Path) -> Result<Self, StateError> {
        if !fs::try_exists(path).await? {
            let state = Self::empty();
            state.save(path).await?;
            info!("Seeded new state file at {}", path.display());
            return Ok(state);
        }

        let content = fs::read_to_string(path).await?;
        let state = serde_json::from_str(&content)?;
        Ok(state)
    }

    /// Write the whole document back atomically (temp file + rename).
    pub async fn save(&self, path: &Path) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;

        debug!("Saved {} order(s) to {}", self.orders.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ProductCategory;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_seeded_with_init_marker() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        let state = RunState::load_or_init(&path).await.unwrap();
        assert_eq!(state.last_run, LAST_RUN_INIT);
        assert!(state.orders.is_empty());

        // The seed hit disk too.
        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["lastRun"], "INIT");
        assert_eq!(value["orders"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_orders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        let state = RunState {
            last_run: "2021-01-05T10:00:00.000".to_string(),
            orders: vec![Order {
                category: ProductCategory::AmdGpu,
                order_nr: 99,
                zipcode: "4321BA".to_string(),
                slack_webhook_url: None,
                slack_channel: None,
                discord_user_id: Some("42".to_string()),
                queue_nr: Some(17),
            }],
        };
        state.save(&path).await.unwrap();

        let loaded = RunState::load_or_init(&path).await.unwrap();
        assert_eq!(loaded.last_run, "2021-01-05T10:00:00.000");
        assert_eq!(loaded.orders.len(), 1);
        assert_eq!(loaded.orders[0].order_nr, 99);
        assert_eq!(loaded.orders[0].queue_nr, Some(17));
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        let mut state = RunState::empty();
        state.save(&path).await.unwrap();

        state.last_run = "2021-01-06T10:00:00.000".to_string();
        state.save(&path).await.unwrap();

        let loaded = RunState::load_or_init(&path).await.unwrap();
        assert_eq!(loaded.last_run, "2021-01-06T10:00:00.000");
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error_not_a_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "not json").unwrap();

        let result = RunState::load_or_init(&path).await;
        assert!(matches!(result, Err(StateError::Serialization(_))));
    }
}
