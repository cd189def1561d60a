mod service;
pub mod tasks;

pub use service::{SchedulerEvent, SchedulerService};
pub use tasks::{pull_all_feeds, pull_feed_by_id, PullSummary};
