//! Reading items, with on-demand full-content fetching.

use std::sync::Arc;

use crate::content::FetchContent;
use crate::feed::Item;
use crate::pull::EnrichmentSupervisor;
use crate::storage::{Database, ItemFilter, ItemRepository};
use crate::Result;

/// Item access for readers
#[derive(Clone)]
pub struct ItemService {
    db: Database,
    fetcher: Arc<dyn FetchContent>,
    supervisor: EnrichmentSupervisor,
}

impl ItemService {
    pub fn new(db: Database, fetcher: Arc<dyn FetchContent>, supervisor: EnrichmentSupervisor) -> Self {
        Self {
            db,
            fetcher,
            supervisor,
        }
    }

    /// Load an item, fetching its full content first when `fetch` is set and
    /// the item has a link but no full content yet.
    ///
    /// A failed fetch is logged and the item comes back with only its feed
    /// content. The fetched content is written back in the background.
    pub async fn get(&self, id: i64, fetch: bool) -> Result<Item> {
        let mut item = ItemRepository::new(&self.db).get(id).await?;

        if !fetch || item.has_full_content() {
            return Ok(item);
        }
        let Some(link) = item.fetchable_link().map(str::to_string) else {
            return Ok(item);
        };

        tracing::info!(item_id = id, link = %link, "Fetching full content for item");
        match self.fetcher.fetch(&link).await {
            Ok(fetched) if !fetched.content.is_empty() => {
                item.full_content = Some(fetched.content.clone());

                let db = self.db.clone();
                self.supervisor.spawn(async move {
                    if let Err(e) = ItemRepository::new(&db)
                        .update_full_content(id, &fetched.content)
                        .await
                    {
                        tracing::error!(item_id = id, error = %e, "Failed to save full content");
                    }
                });
            }
            Ok(_) => {
                tracing::debug!(item_id = id, "Fetched page had no readable content");
            }
            Err(e) => {
                tracing::warn!(
                    item_id = id,
                    error = %e,
                    "Failed to fetch full content, using feed content"
                );
            }
        }

        Ok(item)
    }

    /// Supervisor owning the background write-backs
    pub fn supervisor(&self) -> &EnrichmentSupervisor {
        &self.supervisor
    }

    pub async fn list(&self, filter: &ItemFilter, page: u32, page_size: u32) -> Result<(Vec<Item>, i64)> {
        ItemRepository::new(&self.db).list(filter, page, page_size).await
    }

    pub async fn mark_read(&self, id: i64) -> Result<()> {
        ItemRepository::new(&self.db).update_unread(&[id], false).await?;
        Ok(())
    }
}
