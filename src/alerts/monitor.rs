//! The poll loop: Fetch → Decode → Filter → Notify → Sleep.

use crate::alerts::dedup::DeduplicationFilter;
use crate::alerts::fetcher::{AlertSource, FeedPoll};
use crate::alerts::model::Alert;
use crate::diagnostics::DiagnosticsLog;
use crate::error::{BotError, Result};
use crate::fanout::SubscriptionFanout;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Filter plus fan-out: the publish path shared by the poll loop and the
/// dev-mode alert injection flow. Recording happens before delivery, so a
/// cycle that dies mid-fan-out loses notifications rather than duplicating
/// them.
pub struct AlertPipeline {
    filter: DeduplicationFilter,
    fanout: SubscriptionFanout,
}

impl AlertPipeline {
    pub fn new(filter: DeduplicationFilter, fanout: SubscriptionFanout) -> Self {
        Self { filter, fanout }
    }

    /// Screens the alert against the dedup window and delivers whatever is
    /// newly notifiable. Returns the number of deliveries made.
    pub async fn publish(&self, alert: &Alert) -> Result<usize> {
        let fresh = self.filter.screen(alert).await;
        if fresh.is_empty() {
            info!(
                "No locations to publish for alert {}, not yet expired...",
                alert.id
            );
            return Ok(0);
        }
        self.fanout.publish(alert, &fresh).await
    }
}

pub struct AlertMonitor {
    source: Arc<dyn AlertSource>,
    pipeline: Arc<AlertPipeline>,
    diagnostics: DiagnosticsLog,
    poll_interval: Duration,
}

impl AlertMonitor {
    pub fn new(
        source: Arc<dyn AlertSource>,
        pipeline: Arc<AlertPipeline>,
        diagnostics: DiagnosticsLog,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            pipeline,
            diagnostics,
            poll_interval,
        }
    }

    /// Runs forever. One cycle per interval; a slow cycle delays the next
    /// tick instead of overlapping it, and no cycle failure ever escapes.
    pub async fn run(&self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Alert monitor running, polling every {:?}",
            self.poll_interval
        );
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// Executes a single cycle and absorbs its failure.
    pub async fn run_once(&self) {
        if let Err(err) = self.run_cycle().await {
            self.absorb_cycle_failure(err);
        }
    }

    async fn run_cycle(&self) -> Result<()> {
        let alert = match self.source.poll().await? {
            FeedPoll::Quiet => return Ok(()),
            FeedPoll::Alert(alert) => alert,
        };
        info!("Alert in progress: {}", alert.title);
        self.pipeline.publish(&alert).await?;
        Ok(())
    }

    fn absorb_cycle_failure(&self, err: BotError) {
        match &err {
            // Transient; the next interval retries anyway.
            BotError::Network(reason) => warn!("Alert check failed: {}", reason),
            _ => error!("Error checking alerts: {}", err),
        }
        if err.wants_diagnostic() {
            self.diagnostics
                .record(err.kind(), &err.to_string(), err.raw_payload().unwrap_or(""));
        }
    }
}
