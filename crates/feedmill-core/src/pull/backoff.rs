use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::feed::Feed;

const BACKOFF_FACTOR: f64 = 1.8;

/// Whether the scheduler should pull a feed this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullDecision {
    Pull,
    Suspended,
    /// Failing feed; retry no earlier than this
    BackingOff(DateTime<Utc>),
}

/// Wait after `failures` consecutive failures: `interval * 1.8^failures`, capped
pub fn backoff_delay(interval: Duration, failures: u32, max_backoff: Duration) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
    let secs = interval.as_secs_f64() * BACKOFF_FACTOR.powi(exponent);
    if !secs.is_finite() || secs >= max_backoff.as_secs_f64() {
        max_backoff
    } else {
        Duration::from_secs_f64(secs)
    }
}

/// Decide from the feed's health record; a failing feed's clock starts at
/// its last health write (`updated_at`)
pub fn decide(
    feed: &Feed,
    now: DateTime<Utc>,
    interval: Duration,
    max_backoff: Duration,
) -> PullDecision {
    if feed.suspended {
        return PullDecision::Suspended;
    }
    if feed.consecutive_failures == 0 {
        return PullDecision::Pull;
    }

    let delay = backoff_delay(interval, feed.consecutive_failures, max_backoff);
    let next = chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| feed.updated_at.checked_add_signed(delay));

    match next {
        Some(next) if now < next => PullDecision::BackingOff(next),
        _ => PullDecision::Pull,
    }
}
