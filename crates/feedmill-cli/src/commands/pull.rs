use anyhow::Result;

use feedmill_core::{
    pull::PullOutcome,
    scheduler::{pull_all_feeds, pull_feed_by_id},
    storage::Database,
    AppConfig,
};

pub async fn run(db: Database, config: &AppConfig, feed_id: Option<i64>) -> Result<()> {
    let pipeline = super::pipeline(db, config)?;

    match feed_id {
        Some(id) => match pull_feed_by_id(&pipeline, id).await? {
            PullOutcome::Fetched(count) => println!("Feed {}: {} new items", id, count),
            PullOutcome::ReadFailed => println!("Feed {}: pull failed (see 'feedmill list')", id),
        },
        None => {
            println!("Pulling all feeds...\n");
            let summary = pull_all_feeds(&pipeline, &config.pull).await?;
            println!(
                "\nPull complete. {} pulled, {} failed, {} skipped, {} new items.",
                summary.pulled, summary.failed, summary.skipped, summary.new_items
            );
        }
    }

    if pipeline.supervisor().active() > 0 {
        println!("Waiting for full-content fetching to finish...");
    }
    pipeline.supervisor().drain().await;

    Ok(())
}
