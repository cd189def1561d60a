//! Full-content enrichment of newly inserted items.
//!
//! Runs off the insert path on the [`EnrichmentSupervisor`]. Fetches are
//! bounded by a per-batch semaphore and, optionally, a semaphore shared by
//! every feed. Results fan in through a `JoinSet` and are written with a
//! single batched update once every fetch of the batch has finished.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::policy::should_auto_fetch;
use super::supervisor::EnrichmentSupervisor;
use crate::config::EnrichmentConfig;
use crate::content::{FetchContent, FetchError, FetchedContent};
use crate::feed::Item;
use crate::observe::{EnrichmentOutcome, PullObserver};
use crate::storage::{Database, FeedRepository, ItemRepository};

/// Default number of in-flight fetches per inserted batch
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

type FetchResult = (i64, String, Result<FetchedContent, FetchError>);

#[derive(Clone)]
pub struct Enricher {
    fetcher: Arc<dyn FetchContent>,
    concurrency: usize,
    global_limit: Option<Arc<Semaphore>>,
    supervisor: EnrichmentSupervisor,
    observer: Arc<dyn PullObserver>,
}

impl Enricher {
    pub fn new(
        fetcher: Arc<dyn FetchContent>,
        supervisor: EnrichmentSupervisor,
        observer: Arc<dyn PullObserver>,
    ) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            global_limit: None,
            supervisor,
            observer,
        }
    }

    pub fn from_config(
        config: &EnrichmentConfig,
        fetcher: Arc<dyn FetchContent>,
        supervisor: EnrichmentSupervisor,
        observer: Arc<dyn PullObserver>,
    ) -> Self {
        Self::new(fetcher, supervisor, observer)
            .with_concurrency(config.concurrency)
            .with_global_limit(config.global_max_concurrency)
    }

    /// In-flight fetches per batch; at least one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Cap on in-flight fetches across all batches; 0 removes the cap
    pub fn with_global_limit(mut self, max: usize) -> Self {
        self.global_limit = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn fetcher(&self) -> Arc<dyn FetchContent> {
        Arc::clone(&self.fetcher)
    }

    pub fn supervisor(&self) -> &EnrichmentSupervisor {
        &self.supervisor
    }

    /// Run [`Enricher::run`] in the background on the supervisor
    pub fn spawn(&self, db: Database, feed_id: i64, system_default: bool, items: Vec<Item>) {
        let enricher = self.clone();
        self.supervisor.spawn(async move {
            enricher.run(&db, feed_id, system_default, items).await;
        });
    }

    /// Enrich freshly inserted `items` of one feed and report how it went
    pub async fn run(
        &self,
        db: &Database,
        feed_id: i64,
        system_default: bool,
        items: Vec<Item>,
    ) -> EnrichmentOutcome {
        let outcome = self.enrich(db, feed_id, system_default, items).await;
        self.observer.enrichment_finished(feed_id, &outcome);
        outcome
    }

    async fn enrich(
        &self,
        db: &Database,
        feed_id: i64,
        system_default: bool,
        items: Vec<Item>,
    ) -> EnrichmentOutcome {
        let feed = match FeedRepository::new(db).get(feed_id).await {
            Ok(feed) => feed,
            Err(e) => return EnrichmentOutcome::FeedUnavailable(e.to_string()),
        };

        if !should_auto_fetch(&feed, system_default) {
            return EnrichmentOutcome::Disabled;
        }

        let candidates: Vec<(i64, String)> = items
            .iter()
            .filter_map(|item| item.fetchable_link().map(|link| (item.id, link.to_string())))
            .collect();
        if candidates.is_empty() {
            return EnrichmentOutcome::NoCandidates;
        }

        self.observer.enrichment_started(feed_id, candidates.len());

        let token = self.supervisor.token();
        let Some(updates) = self.fetch_all(feed_id, candidates, &token).await else {
            return EnrichmentOutcome::Cancelled;
        };

        if updates.is_empty() {
            return EnrichmentOutcome::NothingToUpdate;
        }
        if token.is_cancelled() {
            return EnrichmentOutcome::Cancelled;
        }

        tracing::info!(feed_id, count = updates.len(), "Batch updating full content");
        match ItemRepository::new(db)
            .batch_update_full_content(&updates)
            .await
        {
            Ok(()) => EnrichmentOutcome::Updated(updates.len()),
            Err(e) => EnrichmentOutcome::UpdateFailed(e.to_string()),
        }
    }

    /// Fetch every candidate, returning item id -> content for the ones that
    /// produced content, or `None` if shutdown interrupted the batch
    async fn fetch_all(
        &self,
        feed_id: i64,
        candidates: Vec<(i64, String)>,
        token: &CancellationToken,
    ) -> Option<HashMap<i64, String>> {
        let batch_limit = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<Option<FetchResult>> = JoinSet::new();

        for (item_id, link) in candidates {
            let batch_limit = Arc::clone(&batch_limit);
            let global_limit = self.global_limit.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let token = token.clone();

            join_set.spawn(async move {
                let url = link.clone();
                let fetch = async move {
                    let _batch_permit = batch_limit.acquire_owned().await;
                    let _global_permit = match global_limit {
                        Some(limit) => Some(limit.acquire_owned().await),
                        None => None,
                    };
                    fetcher.fetch(&url).await
                };

                tokio::select! {
                    _ = token.cancelled() => None,
                    result = fetch => Some((item_id, link, result)),
                }
            });
        }

        let mut updates = HashMap::new();
        let mut cancelled = false;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some((item_id, _, Ok(fetched)))) => {
                    if !fetched.content.trim().is_empty() {
                        updates.insert(item_id, fetched.content);
                    }
                }
                Ok(Some((item_id, link, Err(e)))) => {
                    self.observer
                        .enrichment_item_failed(feed_id, item_id, &link, &e);
                }
                Ok(None) => cancelled = true,
                Err(e) => tracing::error!(feed_id, error = %e, "Content fetch task failed"),
            }
        }

        (!cancelled).then_some(updates)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::feed::{NewFeed, NewItem};
    use crate::observe::testing::RecordingObserver;
    use crate::observe::TracingObserver;
    use crate::storage::GroupRepository;

    /// Serves canned pages and records how many fetches overlapped
    #[derive(Default)]
    struct MockFetcher {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl FetchContent for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if url.contains("broken") {
                return Err(FetchError::Status(500));
            }
            let content = if url.contains("empty") {
                String::new()
            } else {
                format!("<p>full text of {url}</p>")
            };
            Ok(FetchedContent {
                content,
                title: String::new(),
            })
        }
    }

    async fn setup(auto_fetch: Option<bool>) -> (Database, i64) {
        let db = Database::new_in_memory().await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Example".to_string(),
                link: "https://example.com/feed".to_string(),
                auto_fetch_full_content: auto_fetch,
                ..Default::default()
            })
            .await
            .unwrap();
        (db, feed.id)
    }

    async fn insert(db: &Database, feed_id: i64, links: &[Option<&str>]) -> Vec<Item> {
        let items: Vec<NewItem> = links
            .iter()
            .enumerate()
            .map(|(i, link)| NewItem {
                feed_id,
                guid: format!("guid-{i}"),
                title: format!("Item {i}"),
                link: link.map(str::to_string),
                content: Some("summary".to_string()),
                pub_date: None,
            })
            .collect();
        ItemRepository::new(db).insert_batch(&items).await.unwrap()
    }

    fn enricher(fetcher: Arc<MockFetcher>, observer: Arc<dyn PullObserver>) -> Enricher {
        Enricher::new(fetcher, EnrichmentSupervisor::new(), observer)
    }

    async fn full_content_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE full_content IS NOT NULL")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enriches_linked_items() {
        let (db, feed_id) = setup(Some(true)).await;
        let items = insert(
            &db,
            feed_id,
            &[Some("https://example.com/a"), None, Some("  "), Some("https://example.com/b")],
        )
        .await;

        let fetcher = Arc::new(MockFetcher::default());
        let outcome = enricher(fetcher.clone(), Arc::new(TracingObserver))
            .run(&db, feed_id, false, items.clone())
            .await;

        assert_eq!(outcome, EnrichmentOutcome::Updated(2));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        let stored = ItemRepository::new(&db).get(items[0].id).await.unwrap();
        assert_eq!(
            stored.full_content.as_deref(),
            Some("<p>full text of https://example.com/a</p>")
        );
        assert!(ItemRepository::new(&db)
            .get(items[1].id)
            .await
            .unwrap()
            .full_content
            .is_none());
    }

    #[tokio::test]
    async fn test_disabled_policy_fetches_nothing() {
        let (db, feed_id) = setup(None).await;
        let items = insert(&db, feed_id, &[Some("https://example.com/a")]).await;

        let fetcher = Arc::new(MockFetcher::default());
        let outcome = enricher(fetcher.clone(), Arc::new(TracingObserver))
            .run(&db, feed_id, false, items)
            .await;

        assert_eq!(outcome, EnrichmentOutcome::Disabled);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_group_override_enables_enrichment() {
        let db = Database::new_in_memory().await.unwrap();
        let group = GroupRepository::new(&db)
            .create("Longreads", Some(true))
            .await
            .unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Example".to_string(),
                link: "https://example.com/feed".to_string(),
                group_id: Some(group.id),
                ..Default::default()
            })
            .await
            .unwrap();
        let items = insert(&db, feed.id, &[Some("https://example.com/a")]).await;

        let outcome = enricher(Arc::new(MockFetcher::default()), Arc::new(TracingObserver))
            .run(&db, feed.id, false, items)
            .await;
        assert_eq!(outcome, EnrichmentOutcome::Updated(1));
    }

    #[tokio::test]
    async fn test_failures_and_empty_content_are_dropped() {
        let (db, feed_id) = setup(Some(true)).await;
        let items = insert(
            &db,
            feed_id,
            &[
                Some("https://example.com/ok"),
                Some("https://example.com/broken"),
                Some("https://example.com/empty"),
            ],
        )
        .await;

        let observer = Arc::new(RecordingObserver::default());
        let outcome = enricher(Arc::new(MockFetcher::default()), observer.clone())
            .run(&db, feed_id, false, items.clone())
            .await;

        assert_eq!(outcome, EnrichmentOutcome::Updated(1));
        assert_eq!(*observer.item_failures.lock().unwrap(), vec![items[1].id]);
        assert_eq!(full_content_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_all_failures_means_nothing_to_update() {
        let (db, feed_id) = setup(Some(true)).await;
        let items = insert(&db, feed_id, &[Some("https://example.com/broken")]).await;

        let outcome = enricher(Arc::new(MockFetcher::default()), Arc::new(TracingObserver))
            .run(&db, feed_id, false, items)
            .await;
        assert_eq!(outcome, EnrichmentOutcome::NothingToUpdate);
    }

    #[tokio::test]
    async fn test_missing_feed_stops_enrichment() {
        let (db, feed_id) = setup(Some(true)).await;
        let items = insert(&db, feed_id, &[Some("https://example.com/a")]).await;

        let fetcher = Arc::new(MockFetcher::default());
        let outcome = enricher(fetcher.clone(), Arc::new(TracingObserver))
            .run(&db, feed_id + 1, true, items)
            .await;

        assert!(matches!(outcome, EnrichmentOutcome::FeedUnavailable(_)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_concurrency_is_bounded() {
        let (db, feed_id) = setup(Some(true)).await;
        let links: Vec<String> = (0..10).map(|i| format!("https://example.com/{i}")).collect();
        let links: Vec<Option<&str>> = links.iter().map(|l| Some(l.as_str())).collect();
        let items = insert(&db, feed_id, &links).await;

        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(30)));
        let outcome = enricher(fetcher.clone(), Arc::new(TracingObserver))
            .run(&db, feed_id, false, items)
            .await;

        assert_eq!(outcome, EnrichmentOutcome::Updated(10));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= DEFAULT_BATCH_CONCURRENCY);
    }

    #[tokio::test]
    async fn test_global_limit_caps_concurrent_batches() {
        let (db, feed_id) = setup(Some(true)).await;
        let links: Vec<String> = (0..12).map(|i| format!("https://example.com/{i}")).collect();
        let links: Vec<Option<&str>> = links.iter().map(|l| Some(l.as_str())).collect();
        let items = insert(&db, feed_id, &links).await;

        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(20)));
        let enricher = enricher(fetcher.clone(), Arc::new(TracingObserver))
            .with_concurrency(4)
            .with_global_limit(2);

        let (first, second) = items.split_at(6);
        let (a, b) = tokio::join!(
            enricher.run(&db, feed_id, false, first.to_vec()),
            enricher.run(&db, feed_id, false, second.to_vec()),
        );

        assert_eq!(a, EnrichmentOutcome::Updated(6));
        assert_eq!(b, EnrichmentOutcome::Updated(6));
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_without_writing() {
        let (db, feed_id) = setup(Some(true)).await;
        let items = insert(
            &db,
            feed_id,
            &[Some("https://example.com/a"), Some("https://example.com/b")],
        )
        .await;

        let observer = Arc::new(RecordingObserver::default());
        let enricher = Enricher::new(
            Arc::new(MockFetcher::with_delay(Duration::from_secs(30))),
            EnrichmentSupervisor::new(),
            observer.clone(),
        );

        enricher.spawn(db.clone(), feed_id, false, items);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(enricher.supervisor().shutdown(Duration::from_secs(5)).await);

        assert_eq!(
            *observer.outcomes.lock().unwrap(),
            vec![EnrichmentOutcome::Cancelled]
        );
        assert_eq!(full_content_count(&db).await, 0);
    }
}
