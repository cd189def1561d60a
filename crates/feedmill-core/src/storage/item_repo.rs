use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::Database;
use crate::feed::{Item, NewItem};
use crate::{Error, Result};

/// At or below this many entries full content is written with one UPDATE per item
const SMALL_BATCH: usize = 5;

const ITEM_COLUMNS: &str = r#"
    items.id, items.feed_id, items.guid, items.title, items.link, items.content,
    items.full_content, items.unread, items.bookmark, items.pub_date,
    items.created_at, items.updated_at
"#;

/// Repository for stored feed items
pub struct ItemRepository<'a> {
    db: &'a Database,
}

/// Narrows [`ItemRepository::list`]; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Substring of the title or content
    pub keyword: Option<String>,
    pub feed_id: Option<i64>,
    pub group_id: Option<i64>,
    pub unread: Option<bool>,
    pub bookmark: Option<bool>,
}

#[derive(FromRow)]
struct ItemRow {
    id: i64,
    feed_id: i64,
    guid: String,
    title: String,
    link: Option<String>,
    content: Option<String>,
    full_content: Option<String>,
    unread: i32,
    bookmark: i32,
    pub_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            feed_id: row.feed_id,
            guid: row.guid,
            title: row.title,
            link: row.link,
            content: row.content,
            full_content: row.full_content,
            unread: row.unread != 0,
            bookmark: row.bookmark != 0,
            pub_date: row.pub_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl ItemFilter {
    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(keyword) = &self.keyword {
            let pattern = format!("%{}%", keyword);
            builder
                .push(" AND (items.title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR items.content LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(feed_id) = self.feed_id {
            builder.push(" AND items.feed_id = ").push_bind(feed_id);
        }
        if let Some(group_id) = self.group_id {
            builder.push(" AND feeds.group_id = ").push_bind(group_id);
        }
        if let Some(unread) = self.unread {
            builder.push(" AND items.unread = ").push_bind(unread);
        }
        if let Some(bookmark) = self.bookmark {
            builder.push(" AND items.bookmark = ").push_bind(bookmark);
        }
    }
}

impl<'a> ItemRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert items in one transaction, skipping any whose (feed_id, guid)
    /// already exists. Existing rows are left untouched.
    ///
    /// Returns only the newly inserted items, with their assigned ids.
    pub async fn insert_batch(&self, items: &[NewItem]) -> Result<Vec<Item>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = Vec::new();

        for item in items {
            let id: Option<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO items
                (feed_id, guid, title, link, content, pub_date, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(feed_id, guid) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(item.feed_id)
            .bind(&item.guid)
            .bind(&item.title)
            .bind(&item.link)
            .bind(&item.content)
            .bind(item.pub_date)
            .bind(now)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(id) = id {
                inserted.push(Item {
                    id,
                    feed_id: item.feed_id,
                    guid: item.guid.clone(),
                    title: item.title.clone(),
                    link: item.link.clone(),
                    content: item.content.clone(),
                    full_content: None,
                    unread: true,
                    bookmark: false,
                    pub_date: item.pub_date,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        tx.commit().await?;

        tracing::debug!(
            received = items.len(),
            inserted = inserted.len(),
            "Inserted feed items"
        );
        Ok(inserted)
    }

    /// Get an item; missing items are [`Error::ItemNotFound`]
    pub async fn get(&self, id: i64) -> Result<Item> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM items WHERE items.id = ?");

        let row: Option<ItemRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(Item::from).ok_or(Error::ItemNotFound(id))
    }

    /// One page of matching items, newest first, plus the total match count
    pub async fn list(
        &self,
        filter: &ItemFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Item>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM items JOIN feeds ON feeds.id = items.feed_id",
        );
        filter.push_conditions(&mut count);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.db.pool())
            .await?;

        let offset = i64::from(page.max(1) - 1) * i64::from(page_size);
        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ITEM_COLUMNS} FROM items JOIN feeds ON feeds.id = items.feed_id"
        ));
        filter.push_conditions(&mut select);
        select
            .push(" ORDER BY items.pub_date DESC, items.created_at DESC LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<ItemRow> = select
            .build_query_as()
            .fetch_all(self.db.pool())
            .await?;

        Ok((rows.into_iter().map(Item::from).collect(), total))
    }

    pub async fn update_full_content(&self, id: i64, full_content: &str) -> Result<()> {
        sqlx::query("UPDATE items SET full_content = ?, updated_at = ? WHERE id = ?")
            .bind(full_content)
            .bind(Utc::now())
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Store full content for many items atomically: either every entry is
    /// written or none is. All touched rows share one `updated_at`.
    pub async fn batch_update_full_content(&self, updates: &HashMap<i64, String>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        if updates.len() <= SMALL_BATCH {
            for (id, content) in updates {
                sqlx::query("UPDATE items SET full_content = ?, updated_at = ? WHERE id = ?")
                    .bind(content)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        } else {
            let mut ids = Vec::with_capacity(updates.len());
            let mut cases = Vec::with_capacity(updates.len());
            for id in updates.keys() {
                ids.push(*id);
                cases.push("WHEN ? THEN ?");
            }

            let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
            let query = format!(
                "UPDATE items SET full_content = CASE id {} END, updated_at = ? WHERE id IN ({})",
                cases.join(" "),
                placeholders.join(", ")
            );

            let mut statement = sqlx::query(&query);
            for id in &ids {
                statement = statement.bind(id).bind(&updates[id]);
            }
            statement = statement.bind(now);
            for id in &ids {
                statement = statement.bind(id);
            }
            statement.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Set the read state of several items at once
    pub async fn update_unread(&self, ids: &[i64], unread: bool) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE items SET unread = ");
        builder.push_bind(unread);
        builder.push(", updated_at = ").push_bind(Utc::now());
        builder.push(" WHERE id IN (");
        let mut in_list = builder.separated(", ");
        for id in ids {
            in_list.push_bind(*id);
        }
        in_list.push_unseparated(")");

        let result = builder.build().execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }

    pub async fn update_bookmark(&self, id: i64, bookmark: bool) -> Result<()> {
        let result = sqlx::query("UPDATE items SET bookmark = ?, updated_at = ? WHERE id = ?")
            .bind(bookmark)
            .bind(Utc::now())
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ItemNotFound(id));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
