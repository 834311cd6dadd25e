//! Alert Worker
//!
//! Feeds hub snapshots through the evaluator and into the notification log.

use feed::Subscription;
use std::sync::Arc;
use telemetry::Snapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::evaluator::AlertEvaluator;
use crate::notification::NotificationLog;
use crate::settings::UserSettings;

/// Consumer that turns snapshots into logged notifications
pub struct AlertWorker {
    evaluator: AlertEvaluator,
    settings: watch::Receiver<UserSettings>,
    log: Arc<NotificationLog>,
}

impl AlertWorker {
    pub fn new(
        evaluator: AlertEvaluator,
        settings: watch::Receiver<UserSettings>,
        log: Arc<NotificationLog>,
    ) -> Self {
        Self {
            evaluator,
            settings,
            log,
        }
    }

    /// Evaluate one snapshot with the latest settings. Returns the number of
    /// notifications appended.
    pub fn process(&mut self, snapshot: &Snapshot) -> usize {
        // Read-only view for this pass
        let settings = self.settings.borrow().clone();
        let fired = self.evaluator.evaluate(snapshot, &settings);
        let count = fired.len();

        for notification in fired {
            self.log.append(notification);
        }
        count
    }

    /// Process snapshots until the subscription ends
    pub async fn run(mut self, mut subscription: Subscription) {
        info!("Alert worker listening as subscriber {}", subscription.id());
        while let Some(snapshot) = subscription.recv().await {
            self.process(&snapshot);
        }
        warn!("Alert worker subscription closed");
    }

    /// Run on the current runtime
    pub fn spawn(self, subscription: Subscription) -> JoinHandle<()> {
        tokio::spawn(self.run(subscription))
    }
}
