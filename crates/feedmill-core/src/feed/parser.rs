use chrono::{DateTime, Utc};
use feed_rs::parser;

use super::models::NewItem;
use crate::{Error, Result};

/// Parsed feed data from RSS/Atom/JSON Feed content
#[derive(Debug)]
pub struct ParsedFeed {
    /// Feed-level `updated`/`lastBuildDate`
    pub last_build: Option<DateTime<Utc>>,
    pub items: Vec<NewItem>,
}

/// Parse feed content into items; `feed_id` is left at 0 for the store to stamp
pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    let last_build = feed.updated.map(DateTime::<Utc>::from);

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());

            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            // Entries without any stable identity cannot be deduplicated
            let guid = Some(entry.id)
                .filter(|id| !id.trim().is_empty())
                .or_else(|| link.clone())?;

            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));

            let pub_date = entry
                .published
                .or(entry.updated)
                .map(DateTime::<Utc>::from);

            Some(NewItem {
                feed_id: 0,
                guid,
                title,
                link,
                content,
                pub_date,
            })
        })
        .collect();

    Ok(ParsedFeed { last_build, items })
}
