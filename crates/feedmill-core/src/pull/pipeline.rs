use std::sync::Arc;
use std::time::Duration;

use super::enrich::Enricher;
use super::puller::{PullOutcome, SingleFeedPuller};
use super::store::SingleFeedStore;
use super::supervisor::EnrichmentSupervisor;
use crate::config::AppConfig;
use crate::content::ContentFetcher;
use crate::feed::{Feed, HttpFeedReader, ReadFeedItems};
use crate::observe::PullObserver;
use crate::storage::Database;
use crate::Result;

/// Everything a pull needs, wired once and shared by every feed
#[derive(Clone)]
pub struct Pipeline {
    db: Database,
    reader: Arc<dyn ReadFeedItems>,
    enricher: Enricher,
    auto_fetch_default: bool,
    feed_timeout: Option<Duration>,
    observer: Arc<dyn PullObserver>,
}

impl Pipeline {
    pub fn new(
        db: Database,
        reader: Arc<dyn ReadFeedItems>,
        enricher: Enricher,
        observer: Arc<dyn PullObserver>,
    ) -> Self {
        Self {
            db,
            reader,
            enricher,
            auto_fetch_default: false,
            feed_timeout: None,
            observer,
        }
    }

    /// Production wiring: HTTP feed reader, readability fetcher, fresh supervisor
    pub fn from_config(
        db: Database,
        config: &AppConfig,
        observer: Arc<dyn PullObserver>,
    ) -> Result<Self> {
        let reader = Arc::new(HttpFeedReader::new(&config.pull)?);
        let fetcher = Arc::new(ContentFetcher::new(
            config.enrichment.fetch_timeout(),
            Arc::clone(&observer),
        )?);
        let enricher = Enricher::from_config(
            &config.enrichment,
            fetcher,
            EnrichmentSupervisor::new(),
            Arc::clone(&observer),
        );

        Ok(Self::new(db, reader, enricher, observer)
            .with_auto_fetch_default(config.enrichment.auto_fetch_full_content)
            .with_feed_timeout(config.pull.feed_timeout()))
    }

    /// System-wide enrichment default used when neither feed nor group decide
    pub fn with_auto_fetch_default(mut self, enabled: bool) -> Self {
        self.auto_fetch_default = enabled;
        self
    }

    /// Bound on one feed's read; zero disables it
    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub fn supervisor(&self) -> &EnrichmentSupervisor {
        self.enricher.supervisor()
    }

    pub fn observer(&self) -> Arc<dyn PullObserver> {
        Arc::clone(&self.observer)
    }

    /// Store adapter for one feed
    pub fn store(&self, feed_id: i64) -> SingleFeedStore {
        SingleFeedStore::new(
            feed_id,
            self.auto_fetch_default,
            self.db.clone(),
            self.enricher.clone(),
            Arc::clone(&self.observer),
        )
    }

    pub fn puller(&self, feed_id: i64) -> SingleFeedPuller<SingleFeedStore> {
        let puller = SingleFeedPuller::new(
            Arc::clone(&self.reader),
            self.store(feed_id),
            Arc::clone(&self.observer),
        );
        match self.feed_timeout {
            Some(timeout) => puller.with_timeout(timeout),
            None => puller,
        }
    }

    /// Pull one feed now, regardless of its health
    pub async fn pull(&self, feed: &Feed) -> Result<PullOutcome> {
        self.puller(feed.id).pull(feed).await
    }
}
