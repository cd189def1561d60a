use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::enrich::Enricher;
use crate::feed::{FeedUpdate, NewItem, ReadError};
use crate::observe::PullObserver;
use crate::storage::{Database, FeedRepository, ItemRepository};
use crate::Result;

/// Where the outcome of pulling one feed is written
#[async_trait]
pub trait SingleFeedRepo: Send + Sync {
    /// Store new items, returning how many were not already stored
    async fn insert_items(&self, items: Vec<NewItem>) -> Result<usize>;

    /// Mark the feed healthy; `None` keeps the stored build time
    async fn record_success(&self, last_build: Option<DateTime<Utc>>) -> Result<()>;

    /// Record a failed read on the feed's health record
    async fn record_failure(&self, error: &ReadError) -> Result<()>;
}

/// SQLite-backed [`SingleFeedRepo`] for one feed.
///
/// Inserting items hands the newly stored ones to the [`Enricher`] in the
/// background; the insert result never depends on enrichment.
pub struct SingleFeedStore {
    feed_id: i64,
    auto_fetch_default: bool,
    db: Database,
    enricher: Enricher,
    observer: Arc<dyn PullObserver>,
}

impl SingleFeedStore {
    pub fn new(
        feed_id: i64,
        auto_fetch_default: bool,
        db: Database,
        enricher: Enricher,
        observer: Arc<dyn PullObserver>,
    ) -> Self {
        Self {
            feed_id,
            auto_fetch_default,
            db,
            enricher,
            observer,
        }
    }

    pub fn feed_id(&self) -> i64 {
        self.feed_id
    }
}

#[async_trait]
impl SingleFeedRepo for SingleFeedStore {
    async fn insert_items(&self, mut items: Vec<NewItem>) -> Result<usize> {
        for item in &mut items {
            item.feed_id = self.feed_id;
        }

        let inserted = ItemRepository::new(&self.db).insert_batch(&items).await?;
        let count = inserted.len();

        if !inserted.is_empty() {
            self.enricher.spawn(
                self.db.clone(),
                self.feed_id,
                self.auto_fetch_default,
                inserted,
            );
        }

        Ok(count)
    }

    async fn record_success(&self, last_build: Option<DateTime<Utc>>) -> Result<()> {
        FeedRepository::new(&self.db)
            .update(
                self.feed_id,
                &FeedUpdate {
                    last_build,
                    failure: Some(None),
                    consecutive_failures: Some(0),
                    ..Default::default()
                },
            )
            .await
    }

    async fn record_failure(&self, error: &ReadError) -> Result<()> {
        let feeds = FeedRepository::new(&self.db);
        let feed = feeds.get(self.feed_id).await?;

        let failures = feed.consecutive_failures.saturating_add(1);
        let message = error.to_string();
        feeds
            .update(
                self.feed_id,
                &FeedUpdate {
                    failure: Some(Some(message.clone())),
                    consecutive_failures: Some(failures),
                    ..Default::default()
                },
            )
            .await?;

        self.observer
            .failure_recorded(self.feed_id, failures, &message);
        Ok(())
    }
}
