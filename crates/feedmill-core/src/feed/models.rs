use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-feed HTTP request customisation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRequestOptions {
    /// Extra headers sent with every request for this feed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Proxy used for this feed only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl FeedRequestOptions {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.proxy.is_none()
    }
}

/// A group of feeds sharing an enrichment override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    /// `None` defers to the system default
    pub auto_fetch_full_content: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The group fields a feed carries for policy resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedGroup {
    pub id: i64,
    pub name: String,
    pub auto_fetch_full_content: Option<bool>,
}

/// A polled feed subscription together with its health record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub link: String,
    /// Build time reported by the source on the last successful pull
    pub last_build: Option<DateTime<Utc>>,
    /// Message of the most recent failed pull; cleared on success
    pub failure: Option<String>,
    pub consecutive_failures: u32,
    pub suspended: bool,
    /// `None` defers to the group, then to the system default
    pub auto_fetch_full_content: Option<bool>,
    pub request_options: FeedRequestOptions,
    pub group: FeedGroup,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    /// Check if the last pull of this feed failed
    pub fn has_error(&self) -> bool {
        self.failure.as_deref().is_some_and(|f| !f.is_empty())
    }
}

/// Data required to create a new feed
#[derive(Debug, Clone, Default)]
pub struct NewFeed {
    pub name: String,
    pub link: String,
    /// Defaults to the built-in group
    pub group_id: Option<i64>,
    pub auto_fetch_full_content: Option<bool>,
    pub request_options: FeedRequestOptions,
}

/// Partial update of a feed row; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct FeedUpdate {
    pub name: Option<String>,
    pub link: Option<String>,
    pub last_build: Option<DateTime<Utc>>,
    /// `Some(None)` clears the stored message
    pub failure: Option<Option<String>>,
    pub consecutive_failures: Option<u32>,
    pub suspended: Option<bool>,
    /// `Some(None)` resets the override to "unset"
    pub auto_fetch_full_content: Option<Option<bool>>,
    pub group_id: Option<i64>,
    pub request_options: Option<FeedRequestOptions>,
}

impl FeedUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.link.is_none()
            && self.last_build.is_none()
            && self.failure.is_none()
            && self.consecutive_failures.is_none()
            && self.suspended.is_none()
            && self.auto_fetch_full_content.is_none()
            && self.group_id.is_none()
            && self.request_options.is_none()
    }
}

/// A stored feed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    /// Content carried by the feed payload
    pub content: Option<String>,
    /// Article content extracted from the linked page
    pub full_content: Option<String>,
    pub unread: bool,
    pub bookmark: bool,
    pub pub_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Full content when present, otherwise the feed's own content
    pub fn display_content(&self) -> &str {
        match self.full_content.as_deref() {
            Some(full) if !full.is_empty() => full,
            _ => self.content.as_deref().unwrap_or(""),
        }
    }

    pub fn has_full_content(&self) -> bool {
        self.full_content.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Link suitable for enrichment, if any
    pub fn fetchable_link(&self) -> Option<&str> {
        self.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// An entry read from a feed, not yet stored
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    /// Overwritten with the owning feed's id on insert
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub content: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
}
