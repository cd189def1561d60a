use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::feed::Group;
use crate::{Error, Result};

/// Repository for feed groups
pub struct GroupRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    auto_fetch_full_content: Option<bool>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.id,
            name: row.name,
            auto_fetch_full_content: row.auto_fetch_full_content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> GroupRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: &str, auto_fetch_full_content: Option<bool>) -> Result<Group> {
        let now = Utc::now();

        let row: GroupRow = sqlx::query_as(
            r#"
            INSERT INTO feed_groups (name, auto_fetch_full_content, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, auto_fetch_full_content, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(auto_fetch_full_content)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.into())
    }

    pub async fn get(&self, id: i64) -> Result<Group> {
        let row: Option<GroupRow> = sqlx::query_as(
            r#"
            SELECT id, name, auto_fetch_full_content, created_at, updated_at
            FROM feed_groups
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(Group::from).ok_or(Error::GroupNotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Group>> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            r#"
            SELECT id, name, auto_fetch_full_content, created_at, updated_at
            FROM feed_groups
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Group::from).collect())
    }

    /// Set or clear (`None`) the group's enrichment override
    pub async fn set_auto_fetch(&self, id: i64, auto_fetch_full_content: Option<bool>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE feed_groups
            SET auto_fetch_full_content = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(auto_fetch_full_content)
        .bind(Utc::now())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::GroupNotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_GROUP_ID;

    #[tokio::test]
    async fn test_default_group_listed_first() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = GroupRepository::new(&db);
        repo.create("News", None).await.unwrap();

        let groups = repo.list().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, DEFAULT_GROUP_ID);
        assert_eq!(groups[1].name, "News");
        assert!(groups[0].auto_fetch_full_content.is_none());
    }

    #[tokio::test]
    async fn test_set_auto_fetch() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = GroupRepository::new(&db);
        let group = repo.create("News", None).await.unwrap();

        repo.set_auto_fetch(group.id, Some(false)).await.unwrap();
        assert_eq!(
            repo.get(group.id).await.unwrap().auto_fetch_full_content,
            Some(false)
        );

        repo.set_auto_fetch(group.id, None).await.unwrap();
        assert!(repo.get(group.id).await.unwrap().auto_fetch_full_content.is_none());
    }

    #[tokio::test]
    async fn test_missing_group() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = GroupRepository::new(&db);
        assert!(matches!(repo.get(77).await, Err(Error::GroupNotFound(77))));
        assert!(matches!(
            repo.set_auto_fetch(77, Some(true)).await,
            Err(Error::GroupNotFound(77))
        ));
    }
}
