use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::database::DEFAULT_GROUP_ID;
use super::retry::with_retry;
use super::Database;
use crate::feed::{Feed, FeedGroup, FeedRequestOptions, FeedUpdate, NewFeed};
use crate::{Error, Result};

const FEED_COLUMNS: &str = r#"
    f.id, f.name, f.link, f.last_build, f.failure, f.consecutive_failures,
    f.suspended, f.auto_fetch_full_content, f.request_options,
    f.created_at, f.updated_at,
    g.id AS group_id, g.name AS group_name,
    g.auto_fetch_full_content AS group_auto_fetch_full_content
"#;

/// Repository for feed CRUD and health writes
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: i64,
    name: String,
    link: String,
    last_build: Option<DateTime<Utc>>,
    failure: Option<String>,
    consecutive_failures: i64,
    suspended: i32,
    auto_fetch_full_content: Option<bool>,
    request_options: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    group_id: i64,
    group_name: String,
    group_auto_fetch_full_content: Option<bool>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        let request_options = row
            .request_options
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Feed {
            id: row.id,
            name: row.name,
            link: row.link,
            last_build: row.last_build,
            failure: row.failure,
            consecutive_failures: u32::try_from(row.consecutive_failures).unwrap_or(0),
            suspended: row.suspended != 0,
            auto_fetch_full_content: row.auto_fetch_full_content,
            request_options,
            group: FeedGroup {
                id: row.group_id,
                name: row.group_name,
                auto_fetch_full_content: row.group_auto_fetch_full_content,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Request options as stored: `NULL` when there is nothing to store
fn encode_request_options(options: &FeedRequestOptions) -> Result<Option<String>> {
    if options.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(options)?))
    }
}

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new feed subscription
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let now = Utc::now();
        let request_options = encode_request_options(&new_feed.request_options)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feeds
            (name, link, auto_fetch_full_content, request_options, group_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&new_feed.name)
        .bind(&new_feed.link)
        .bind(new_feed.auto_fetch_full_content)
        .bind(request_options)
        .bind(new_feed.group_id.unwrap_or(DEFAULT_GROUP_ID))
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        self.get(id).await
    }

    /// Get a feed with its group; missing feeds are [`Error::FeedNotFound`]
    pub async fn get(&self, id: i64) -> Result<Feed> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds f JOIN feed_groups g ON g.id = f.group_id WHERE f.id = ?"
        );

        let row = with_retry(|| {
            sqlx::query_as::<_, FeedRow>(&query)
                .bind(id)
                .fetch_optional(self.db.pool())
        })
        .await?;

        row.map(Feed::from).ok_or(Error::FeedNotFound(id))
    }

    /// Find a feed by its source URL
    pub async fn find_by_link(&self, link: &str) -> Result<Option<Feed>> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds f JOIN feed_groups g ON g.id = f.group_id WHERE f.link = ?"
        );

        let row: Option<FeedRow> = sqlx::query_as(&query)
            .bind(link)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(Feed::from))
    }

    /// Get all feeds, ordered by id
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds f JOIN feed_groups g ON g.id = f.group_id ORDER BY f.id ASC"
        );

        let rows: Vec<FeedRow> = sqlx::query_as(&query).fetch_all(self.db.pool()).await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Apply the set fields of `update`; `updated_at` is always refreshed
    pub async fn update(&self, id: i64, update: &FeedUpdate) -> Result<()> {
        let request_options = match &update.request_options {
            Some(options) => Some(encode_request_options(options)?),
            None => None,
        };
        let now = Utc::now();

        let result = with_retry(|| async {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE feeds SET ");
            let mut set = builder.separated(", ");

            if let Some(name) = &update.name {
                set.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(link) = &update.link {
                set.push("link = ").push_bind_unseparated(link.clone());
            }
            if let Some(last_build) = update.last_build {
                set.push("last_build = ").push_bind_unseparated(last_build);
            }
            if let Some(failure) = &update.failure {
                set.push("failure = ").push_bind_unseparated(failure.clone());
            }
            if let Some(count) = update.consecutive_failures {
                set.push("consecutive_failures = ")
                    .push_bind_unseparated(i64::from(count));
            }
            if let Some(suspended) = update.suspended {
                set.push("suspended = ").push_bind_unseparated(suspended);
            }
            if let Some(auto_fetch) = update.auto_fetch_full_content {
                set.push("auto_fetch_full_content = ")
                    .push_bind_unseparated(auto_fetch);
            }
            if let Some(group_id) = update.group_id {
                set.push("group_id = ").push_bind_unseparated(group_id);
            }
            if let Some(options) = &request_options {
                set.push("request_options = ")
                    .push_bind_unseparated(options.clone());
            }
            set.push("updated_at = ").push_bind_unseparated(now);

            builder.push(" WHERE id = ").push_bind(id);
            builder.build().execute(self.db.pool()).await
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::FeedNotFound(id));
        }
        Ok(())
    }

    /// Delete a feed and all its items
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
