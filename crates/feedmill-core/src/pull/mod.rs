//! Per-feed pull orchestration and full-content enrichment.

mod backoff;
mod enrich;
mod pipeline;
mod policy;
mod puller;
mod store;
mod supervisor;

pub use backoff::{backoff_delay, decide, PullDecision};
pub use enrich::{Enricher, DEFAULT_BATCH_CONCURRENCY};
pub use pipeline::Pipeline;
pub use policy::should_auto_fetch;
pub use puller::{PullOutcome, SingleFeedPuller};
pub use store::{SingleFeedRepo, SingleFeedStore};
pub use supervisor::EnrichmentSupervisor;
