use chrono::Utc;
use tokio::task::JoinSet;

use crate::config::PullConfig;
use crate::feed::Feed;
use crate::pull::{decide, Pipeline, PullDecision, PullOutcome};
use crate::storage::FeedRepository;
use crate::Result;

/// Totals for one pull cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullSummary {
    /// Feeds that were read successfully
    pub pulled: u32,
    /// Feeds whose read failed or whose results could not be stored
    pub failed: u32,
    /// Suspended feeds and feeds still backing off
    pub skipped: u32,
    pub new_items: u32,
}

impl PullSummary {
    fn record(&mut self, outcome: &Result<PullOutcome>) {
        match outcome {
            Ok(PullOutcome::Fetched(count)) => {
                self.pulled += 1;
                self.new_items += u32::try_from(*count).unwrap_or(u32::MAX);
            }
            Ok(PullOutcome::ReadFailed) | Err(_) => self.failed += 1,
        }
    }
}

/// Pull every feed that is due, at most `config.concurrency` at a time
pub async fn pull_all_feeds(pipeline: &Pipeline, config: &PullConfig) -> Result<PullSummary> {
    let feeds = FeedRepository::new(pipeline.database()).list_all().await?;
    let now = Utc::now();
    let mut summary = PullSummary::default();

    let mut due = Vec::with_capacity(feeds.len());
    for feed in feeds {
        match decide(&feed, now, config.interval(), config.max_backoff()) {
            PullDecision::Pull => due.push(feed),
            PullDecision::Suspended => {
                tracing::debug!(feed_id = feed.id, "Skipping suspended feed");
                summary.skipped += 1;
            }
            PullDecision::BackingOff(next) => {
                tracing::debug!(
                    feed_id = feed.id,
                    failures = feed.consecutive_failures,
                    next = %next,
                    "Skipping feed in backoff"
                );
                summary.skipped += 1;
            }
        }
    }

    let concurrency = config.concurrency.max(1);
    let mut join_set: JoinSet<(i64, Result<PullOutcome>)> = JoinSet::new();
    let mut iter = due.into_iter();

    fn spawn_pull(join_set: &mut JoinSet<(i64, Result<PullOutcome>)>, pipeline: Pipeline, feed: Feed) {
        join_set.spawn(async move {
            let outcome = pipeline.pull(&feed).await;
            (feed.id, outcome)
        });
    }

    for _ in 0..concurrency {
        if let Some(feed) = iter.next() {
            spawn_pull(&mut join_set, pipeline.clone(), feed);
        }
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((feed_id, outcome)) => {
                if let Err(e) = &outcome {
                    tracing::error!(feed_id, error = %e, "Failed to store pull result");
                }
                summary.record(&outcome);
            }
            Err(e) => {
                tracing::error!(error = %e, "Pull task panicked");
                summary.failed += 1;
            }
        }

        if let Some(feed) = iter.next() {
            spawn_pull(&mut join_set, pipeline.clone(), feed);
        }
    }

    tracing::info!(
        pulled = summary.pulled,
        failed = summary.failed,
        skipped = summary.skipped,
        new_items = summary.new_items,
        "Pull cycle finished"
    );

    Ok(summary)
}

/// Pull one feed immediately, ignoring backoff and suspension
pub async fn pull_feed_by_id(pipeline: &Pipeline, feed_id: i64) -> Result<PullOutcome> {
    let feed = FeedRepository::new(pipeline.database()).get(feed_id).await?;
    pipeline.pull(&feed).await
}
