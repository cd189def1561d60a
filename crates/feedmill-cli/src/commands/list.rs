use anyhow::Result;

use feedmill_core::storage::{Database, FeedRepository};

fn describe_override(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "on",
        Some(false) => "off",
        None => "inherit",
    }
}

pub async fn run(db: &Database) -> Result<()> {
    let feeds = FeedRepository::new(db).list_all().await?;

    if feeds.is_empty() {
        println!("No subscriptions yet.");
        println!("\nTo subscribe to a feed, run:");
        println!("  feedmill subscribe -s <url> -n <name>");
        return Ok(());
    }

    println!("Subscriptions ({}):\n", feeds.len());

    for feed in &feeds {
        let state = if feed.suspended { " [SUSPENDED]" } else { "" };
        println!("  [{}] {}{}", feed.id, feed.name, state);
        println!("    URL: {}", feed.link);
        println!(
            "    Group: {} ({}), full content: {}",
            feed.group.name,
            feed.group.id,
            describe_override(feed.auto_fetch_full_content)
        );
        if let Some(built) = feed.last_build {
            println!("    Last build: {}", built.format("%Y-%m-%d %H:%M"));
        }
        if feed.has_error() {
            println!(
                "    Failures: {} (last error: {})",
                feed.consecutive_failures,
                feed.failure.as_deref().unwrap_or_default()
            );
        }
        println!();
    }

    Ok(())
}
