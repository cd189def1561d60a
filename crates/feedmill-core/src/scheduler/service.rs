use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::pull::Pipeline;
use crate::Result;

use super::tasks::{pull_all_feeds, PullSummary};

/// Events emitted by the scheduler to whoever is listening
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A pull cycle finished
    PullCompleted(PullSummary),
    /// An error occurred during a background task
    Error { task: String, message: String },
    /// The scheduler loop exited; `drained` is false if enrichment was cut short
    Stopped { drained: bool },
}

/// Background service that pulls all feeds on a fixed interval
pub struct SchedulerService {
    pipeline: Pipeline,
    config: Arc<AppConfig>,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl SchedulerService {
    pub fn new(pipeline: Pipeline, config: Arc<AppConfig>) -> Self {
        Self {
            pipeline,
            config,
            event_tx: None,
        }
    }

    /// Set the event sender for notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    /// Run pull cycles until the shutdown signal, then stop background enrichment.
    ///
    /// The first cycle starts immediately. A shutdown signal received mid-cycle
    /// abandons the cycle; feeds already pulled keep their results.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.pull.interval();

        if interval.is_zero() {
            info!("Background scheduler disabled (pull.interval_secs = 0)");
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        } else {
            info!(
                interval_secs = interval.as_secs(),
                concurrency = self.config.pull.concurrency,
                "Scheduler started"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            info!("Scheduler received shutdown signal");
                            break;
                        }
                    }

                    _ = ticker.tick() => {
                        debug!("Running scheduled pull");
                        let cycle = pull_all_feeds(&self.pipeline, &self.config.pull);
                        tokio::pin!(cycle);

                        let interrupted = loop {
                            tokio::select! {
                                result = &mut cycle => {
                                    self.report(result);
                                    break false;
                                }
                                result = shutdown.changed() => {
                                    if result.is_err() || *shutdown.borrow() {
                                        break true;
                                    }
                                }
                            }
                        };
                        if interrupted {
                            info!("Scheduler received shutdown signal during pull cycle");
                            break;
                        }
                    }
                }
            }
        }

        let drained = self
            .pipeline
            .supervisor()
            .shutdown(self.config.enrichment.shutdown_grace())
            .await;
        self.send_event(SchedulerEvent::Stopped { drained });
        info!(drained, "Scheduler stopped");
    }

    fn report(&self, result: Result<PullSummary>) {
        match result {
            Ok(summary) => {
                if summary.new_items > 0 {
                    info!("Scheduled pull: {} new items", summary.new_items);
                }
                self.send_event(SchedulerEvent::PullCompleted(summary));
            }
            Err(e) => {
                error!("Scheduled pull failed: {}", e);
                self.send_event(SchedulerEvent::Error {
                    task: "pull".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Run a single pull cycle immediately
    pub async fn pull_now(&self) -> Result<PullSummary> {
        let summary = pull_all_feeds(&self.pipeline, &self.config.pull).await?;
        self.send_event(SchedulerEvent::PullCompleted(summary));
        Ok(summary)
    }
}
