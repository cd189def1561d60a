//! Retry for transient SQLite errors.
//!
//! Scheduler pulls and enrichment tasks write to the same WAL database from
//! many tasks at once, so health writes can hit `SQLITE_BUSY` or a short I/O
//! failure. Those are retried with exponential backoff; every other error is
//! returned on the first attempt.

use std::future::Future;
use std::time::Duration;

/// Maximum number of retries after the first attempt
pub const MAX_RETRIES: u32 = 5;

const BASE_DELAY_MS: u64 = 200;

/// Whether a SQLite error is worth retrying.
///
/// Matches the primary codes BUSY (5), LOCKED (6) and IOERR (10) along with
/// their extended forms (`primary | n << 8`), e.g. BUSY_SNAPSHOT (1032) or
/// IOERR_LOCK (5386).
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6 | 10))
            .unwrap_or(false),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// 200ms, 400ms, 800ms, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// Run `operation`, retrying transient failures up to [`MAX_RETRIES`] times
pub async fn with_retry<F, Fut, T>(operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if is_transient_error(&e) && attempts < MAX_RETRIES => {
                attempts += 1;
                let delay = backoff_delay(attempts);
                tracing::debug!(
                    error = %e,
                    attempt = attempts,
                    max_retries = MAX_RETRIES,
                    delay_ms = delay.as_millis(),
                    "Transient database error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
