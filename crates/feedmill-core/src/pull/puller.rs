use std::sync::Arc;
use std::time::Duration;

use super::store::SingleFeedRepo;
use crate::feed::{Feed, FetchItemsResult, ReadError, ReadFeedItems};
use crate::observe::PullObserver;
use crate::Result;

/// What a pull did with the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The feed was read; this many items were new
    Fetched(usize),
    /// The read failed and was recorded on the feed
    ReadFailed,
}

impl PullOutcome {
    pub fn new_items(&self) -> usize {
        match self {
            PullOutcome::Fetched(count) => *count,
            PullOutcome::ReadFailed => 0,
        }
    }
}

/// Runs one pull of one feed: read it, then hand the outcome to the repo.
pub struct SingleFeedPuller<R> {
    reader: Arc<dyn ReadFeedItems>,
    repo: R,
    observer: Arc<dyn PullObserver>,
    timeout: Option<Duration>,
}

impl<R: SingleFeedRepo> SingleFeedPuller<R> {
    pub fn new(reader: Arc<dyn ReadFeedItems>, repo: R, observer: Arc<dyn PullObserver>) -> Self {
        Self {
            reader,
            repo,
            observer,
            timeout: None,
        }
    }

    /// Bound the feed read; running over is recorded as a failed read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Pull `feed` once.
    ///
    /// A failed read is not an error here: it is recorded on the feed and
    /// reported as [`PullOutcome::ReadFailed`]. Errors come only from the repo.
    pub async fn pull(&self, feed: &Feed) -> Result<PullOutcome> {
        let fetched = self.read(feed).await;
        self.observer
            .feed_read(feed, fetched.as_ref().map(|result| result.items.len()));

        match fetched {
            Ok(result) => {
                let inserted = self.repo.insert_items(result.items).await?;
                self.repo.record_success(result.last_build).await?;
                Ok(PullOutcome::Fetched(inserted))
            }
            Err(error) => {
                self.repo.record_failure(&error).await?;
                Ok(PullOutcome::ReadFailed)
            }
        }
    }

    async fn read(&self, feed: &Feed) -> std::result::Result<FetchItemsResult, ReadError> {
        let read = self.reader.read(&feed.link, &feed.request_options);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .unwrap_or(Err(ReadError::Timeout(limit))),
            None => read.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::feed::{FeedGroup, FeedRequestOptions, NewItem};
    use crate::observe::testing::RecordingObserver;
    use crate::observe::TracingObserver;
    use crate::Error;

    #[derive(Debug, PartialEq)]
    enum Call {
        Insert(Vec<String>),
        Success(Option<DateTime<Utc>>),
        Failure(String),
    }

    #[derive(Default)]
    struct MockRepo {
        calls: Mutex<Vec<Call>>,
        fail_insert: bool,
        insert_delay: Duration,
    }

    #[async_trait]
    impl SingleFeedRepo for MockRepo {
        async fn insert_items(&self, items: Vec<NewItem>) -> Result<usize> {
            let guids = items.iter().map(|i| i.guid.clone()).collect::<Vec<_>>();
            let count = guids.len();
            self.calls.lock().unwrap().push(Call::Insert(guids));
            if !self.insert_delay.is_zero() {
                tokio::time::sleep(self.insert_delay).await;
            }
            if self.fail_insert {
                return Err(Error::Other("disk full".to_string()));
            }
            Ok(count)
        }

        async fn record_success(&self, last_build: Option<DateTime<Utc>>) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Success(last_build));
            Ok(())
        }

        async fn record_failure(&self, error: &ReadError) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Failure(error.to_string()));
            Ok(())
        }
    }

    fn feed() -> Feed {
        let now = Utc::now();
        Feed {
            id: 7,
            name: "Example".to_string(),
            link: "https://example.com/feed".to_string(),
            last_build: None,
            failure: None,
            consecutive_failures: 0,
            suspended: false,
            auto_fetch_full_content: None,
            request_options: FeedRequestOptions::default(),
            group: FeedGroup::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn build_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap()
    }

    fn ok_reader() -> Arc<dyn ReadFeedItems> {
        Arc::new(|_url: String, _options: FeedRequestOptions| async move {
            Ok::<_, ReadError>(FetchItemsResult {
                items: vec![
                    NewItem {
                        guid: "a".to_string(),
                        ..Default::default()
                    },
                    NewItem {
                        guid: "b".to_string(),
                        ..Default::default()
                    },
                ],
                last_build: Some(build_time()),
            })
        })
    }

    fn failing_reader() -> Arc<dyn ReadFeedItems> {
        Arc::new(|_url: String, _options: FeedRequestOptions| async move {
            Err::<FetchItemsResult, _>(ReadError::Status(503))
        })
    }

    #[tokio::test]
    async fn test_success_inserts_then_records_success() {
        let puller = SingleFeedPuller::new(ok_reader(), MockRepo::default(), Arc::new(TracingObserver));

        assert_eq!(puller.pull(&feed()).await.unwrap(), PullOutcome::Fetched(2));
        assert_eq!(
            *puller.repo.calls.lock().unwrap(),
            vec![
                Call::Insert(vec!["a".to_string(), "b".to_string()]),
                Call::Success(Some(build_time())),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_error_is_recorded_not_returned() {
        let observer = Arc::new(RecordingObserver::default());
        let puller = SingleFeedPuller::new(failing_reader(), MockRepo::default(), observer.clone());

        assert_eq!(puller.pull(&feed()).await.unwrap(), PullOutcome::ReadFailed);
        assert_eq!(
            *puller.repo.calls.lock().unwrap(),
            vec![Call::Failure("unexpected status code: 503".to_string())]
        );
        assert_eq!(observer.read_errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_error_skips_success() {
        let repo = MockRepo {
            fail_insert: true,
            ..Default::default()
        };
        let puller = SingleFeedPuller::new(ok_reader(), repo, Arc::new(TracingObserver));

        assert!(puller.pull(&feed()).await.is_err());
        let calls = puller.repo.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], Call::Insert(_)));
    }

    #[tokio::test]
    async fn test_reader_receives_feed_link_and_options() {
        let seen = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let reader: Arc<dyn ReadFeedItems> =
            Arc::new(move |url: String, options: FeedRequestOptions| {
                *captured.lock().unwrap() = Some((url, options));
                async move { Ok::<_, ReadError>(FetchItemsResult::default()) }
            });

        let mut feed = feed();
        feed.request_options
            .headers
            .insert("X-Token".to_string(), "t".to_string());

        let puller = SingleFeedPuller::new(reader, MockRepo::default(), Arc::new(TracingObserver));
        puller.pull(&feed).await.unwrap();

        let (url, options) = seen.lock().unwrap().take().unwrap();
        assert_eq!(url, feed.link);
        assert_eq!(options, feed.request_options);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded_as_failure() {
        let reader: Arc<dyn ReadFeedItems> =
            Arc::new(|_url: String, _options: FeedRequestOptions| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, ReadError>(FetchItemsResult::default())
            });

        let puller = SingleFeedPuller::new(reader, MockRepo::default(), Arc::new(TracingObserver))
            .with_timeout(Duration::from_secs(5));

        assert_eq!(puller.pull(&feed()).await.unwrap(), PullOutcome::ReadFailed);
        let calls = puller.repo.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Failure(message) if message.starts_with("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_insert_error_is_not_a_read_timeout() {
        let repo = MockRepo {
            fail_insert: true,
            insert_delay: Duration::from_secs(120),
            ..Default::default()
        };
        let puller = SingleFeedPuller::new(ok_reader(), repo, Arc::new(TracingObserver))
            .with_timeout(Duration::from_secs(60));

        let err = puller.pull(&feed()).await.unwrap_err();
        assert!(matches!(err, Error::Other(message) if message == "disk full"));

        let calls = puller.repo.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], Call::Insert(_)));
    }
}
