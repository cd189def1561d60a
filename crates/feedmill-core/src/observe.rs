//! Pipeline observability.
//!
//! Components receive an `Arc<dyn PullObserver>` at construction instead of
//! logging through ambient globals, so tests can capture exactly what the
//! pipeline reports. [`TracingObserver`] is the production implementation.

use crate::content::{FetchError, FetchedContent};
use crate::feed::{Feed, ReadError};

/// How an enrichment run for one inserted batch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// The feed could not be loaded to resolve the policy
    FeedUnavailable(String),
    /// Policy resolved to "off" for this feed
    Disabled,
    /// No newly inserted item carried a link
    NoCandidates,
    /// Every fetch failed or returned nothing
    NothingToUpdate,
    /// Full content stored for this many items
    Updated(usize),
    /// The batched write failed; nothing was stored
    UpdateFailed(String),
    /// Shutdown cancelled the run before it finished
    Cancelled,
}

/// Receives the pipeline's structured events
pub trait PullObserver: Send + Sync {
    /// A feed read finished, with the number of items read or the read error
    fn feed_read(&self, feed: &Feed, outcome: Result<usize, &ReadError>);

    /// A failed read was recorded on the feed's health record
    fn failure_recorded(&self, feed_id: i64, consecutive_failures: u32, message: &str);

    /// A single article page fetch finished
    fn content_fetched(&self, url: &str, outcome: Result<&FetchedContent, &FetchError>);

    /// Enrichment was dispatched for `candidates` items of a feed
    fn enrichment_started(&self, feed_id: i64, candidates: usize);

    /// One item's fetch failed and was dropped from its batch
    fn enrichment_item_failed(&self, feed_id: i64, item_id: i64, link: &str, error: &FetchError);

    /// An enrichment run ended
    fn enrichment_finished(&self, feed_id: i64, outcome: &EnrichmentOutcome);
}

/// Forwards pipeline events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PullObserver for TracingObserver {
    fn feed_read(&self, feed: &Feed, outcome: Result<usize, &ReadError>) {
        match outcome {
            Ok(count) => tracing::info!(
                feed_id = feed.id,
                feed_link = %feed.link,
                "fetched {} items",
                count
            ),
            Err(error) => tracing::warn!(
                feed_id = feed.id,
                feed_link = %feed.link,
                error = %error,
                "failed to fetch feed"
            ),
        }
    }

    fn failure_recorded(&self, feed_id: i64, consecutive_failures: u32, message: &str) {
        tracing::info!(
            feed_id,
            consecutive_failures,
            failure = message,
            "Recorded feed failure"
        );
    }

    fn content_fetched(&self, url: &str, outcome: Result<&FetchedContent, &FetchError>) {
        match outcome {
            Ok(fetched) => tracing::info!(
                url,
                title = %fetched.title,
                "Successfully fetched full content"
            ),
            Err(error) => tracing::warn!(url, error = %error, "Failed to fetch full content"),
        }
    }

    fn enrichment_started(&self, feed_id: i64, candidates: usize) {
        tracing::info!(feed_id, items_count = candidates, "Auto-fetching full content");
    }

    fn enrichment_item_failed(&self, feed_id: i64, item_id: i64, link: &str, error: &FetchError) {
        tracing::warn!(
            feed_id,
            item_id,
            link,
            error = %error,
            "Failed to auto-fetch full content"
        );
    }

    fn enrichment_finished(&self, feed_id: i64, outcome: &EnrichmentOutcome) {
        match outcome {
            EnrichmentOutcome::FeedUnavailable(error) => {
                tracing::error!(feed_id, error = %error, "Failed to get feed for auto-fetch")
            }
            EnrichmentOutcome::Disabled | EnrichmentOutcome::NoCandidates => {
                tracing::debug!(feed_id, ?outcome, "Skipped auto-fetching full content")
            }
            EnrichmentOutcome::NothingToUpdate => {
                tracing::info!(feed_id, "No full content to update")
            }
            EnrichmentOutcome::Updated(count) => tracing::info!(
                feed_id,
                success_count = count,
                "Completed auto-fetching full content"
            ),
            EnrichmentOutcome::UpdateFailed(error) => {
                tracing::error!(feed_id, error = %error, "Failed to batch update full content")
            }
            EnrichmentOutcome::Cancelled => {
                tracing::info!(feed_id, "Auto-fetch cancelled by shutdown")
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records events for assertions
    #[derive(Default)]
    pub struct RecordingObserver {
        pub read_errors: Mutex<Vec<String>>,
        pub failures: Mutex<Vec<(i64, u32)>>,
        pub item_failures: Mutex<Vec<i64>>,
        pub outcomes: Mutex<Vec<EnrichmentOutcome>>,
    }

    impl PullObserver for RecordingObserver {
        fn feed_read(&self, _feed: &Feed, outcome: Result<usize, &ReadError>) {
            if let Err(error) = outcome {
                self.read_errors.lock().unwrap().push(error.to_string());
            }
        }

        fn failure_recorded(&self, feed_id: i64, consecutive_failures: u32, _message: &str) {
            self.failures
                .lock()
                .unwrap()
                .push((feed_id, consecutive_failures));
        }

        fn content_fetched(&self, _url: &str, _outcome: Result<&FetchedContent, &FetchError>) {}

        fn enrichment_started(&self, _feed_id: i64, _candidates: usize) {}

        fn enrichment_item_failed(
            &self,
            _feed_id: i64,
            item_id: i64,
            _link: &str,
            _error: &FetchError,
        ) {
            self.item_failures.lock().unwrap().push(item_id);
        }

        fn enrichment_finished(&self, _feed_id: i64, outcome: &EnrichmentOutcome) {
            self.outcomes.lock().unwrap().push(outcome.clone());
        }
    }
}
