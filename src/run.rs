//! One full polling pass: load, probe, detect, notify, persist.

use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info};

use crate::detect;
use crate::notify::NotificationRouter;
use crate::order::Order;
use crate::probe::{FormPage, QueueProbe};
use crate::state::{RunState, StateError};

/// Orchestrator for a single run. Owns the in-memory state and the shared
/// browser page for the run's duration; probes are strictly sequential.
pub struct PollRun {
    state_path: PathBuf,
    probe: QueueProbe,
    router: NotificationRouter,
}

impl PollRun {
    pub fn new(state_path: PathBuf, probe: QueueProbe, router: NotificationRouter) -> Self {
        Self {
            state_path,
            probe,
            router,
        }
    }

    /// Run one pass over the stored order list.
    ///
    /// Probe failures are scoped to their order and the pass continues.
    /// A state write failure is fatal: a stale file would corrupt the next
    /// run's change detection.
    pub async fn execute<P: FormPage>(&self, page: &mut P) -> Result<(), StateError> {
        let mut state = RunState::load_or_init(&self.state_path).await?;
        let mut changed: Vec<Order> = Vec::new();

        for order in &mut state.orders {
            info!(
                "Checking {} order queue (order nr: {}, zipcode: {})",
                order.category, order.order_nr, order.zipcode
            );

            let queue_nr = match self
                .probe
                .probe(page, order.category, order.order_nr, &order.zipcode)
                .await
            {
                Ok(n) => n,
                Err(e) => {
                    error!("Probe for order {} failed: {}", order.order_nr, e);
                    continue;
                }
            };

            info!(
                "Order {} ({}) | Queue nr: {}",
                order.order_nr, order.category, queue_nr
            );

            if detect::apply(order, queue_nr) {
                changed.push(order.clone());
            }
        }

        // Batches go out only after the full probing pass.
        self.router.dispatch(&changed).await;

        let last_run = local_timestamp();
        info!("Last run: {}", last_run);
        state.last_run = last_run;

        state.save(&self.state_path).await
    }
}

/// Local-offset ISO-8601 stamp without a zone suffix, millisecond
/// precision (e.g. `2021-01-05T10:00:00.000`).
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_local_timestamp_is_naive_iso_with_millis() {
        let stamp = local_timestamp();
        assert!(NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%dT%H:%M:%S%.3f").is_ok());
        assert!(!stamp.ends_with('Z'));
    }
}
