use std::sync::Arc;

use anyhow::Result;

use feedmill_core::{
    content::ContentFetcher,
    pull::EnrichmentSupervisor,
    storage::{Database, ItemFilter},
    AppConfig, ItemService, TracingObserver,
};

fn service(db: Database, config: &AppConfig) -> Result<ItemService> {
    let fetcher = ContentFetcher::new(config.enrichment.fetch_timeout(), Arc::new(TracingObserver))?;
    Ok(ItemService::new(db, Arc::new(fetcher), EnrichmentSupervisor::new()))
}

pub async fn list(
    db: Database,
    config: &AppConfig,
    feed_id: Option<i64>,
    unread_only: bool,
    limit: u32,
) -> Result<()> {
    let filter = ItemFilter {
        feed_id,
        unread: unread_only.then_some(true),
        ..Default::default()
    };
    let (items, total) = service(db, config)?.list(&filter, 1, limit.max(1)).await?;

    if items.is_empty() {
        println!("No items.");
        return Ok(());
    }

    for item in &items {
        let marker = if item.unread { "*" } else { " " };
        let full = if item.has_full_content() { " [full]" } else { "" };
        let date = item
            .pub_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!("{} [{}] {} {}{}", marker, item.id, date, item.title, full);
    }
    println!("\nShowing {} of {} items.", items.len(), total);

    Ok(())
}

pub async fn read(db: Database, config: &AppConfig, id: i64, fetch: bool) -> Result<()> {
    let service = service(db, config)?;
    let item = service.get(id, fetch).await?;

    println!("{}", item.title);
    if let Some(link) = &item.link {
        println!("{}", link);
    }
    println!();

    let html = item.display_content();
    let text = html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|_| html.to_string());
    println!("{}", text.trim_end());

    service.mark_read(id).await?;
    service.supervisor().drain().await;

    Ok(())
}
