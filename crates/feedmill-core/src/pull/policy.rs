use crate::feed::Feed;

/// Decide whether newly inserted items of `feed` get their full content fetched.
///
/// The most specific setting wins: the feed's own override, then its group's,
/// then `system_default`.
pub fn should_auto_fetch(feed: &Feed, system_default: bool) -> bool {
    feed.auto_fetch_full_content
        .or(feed.group.auto_fetch_full_content)
        .unwrap_or(system_default)
}
