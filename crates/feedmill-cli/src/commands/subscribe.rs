use anyhow::{anyhow, Result};

use feedmill_core::{
    feed::{FeedRequestOptions, NewFeed},
    pull::PullOutcome,
    storage::{Database, FeedRepository},
    AppConfig,
};

pub struct SubscribeArgs {
    pub url: String,
    pub name: Option<String>,
    pub group: Option<i64>,
    pub auto_fetch: Option<bool>,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<String>,
}

/// Parse a `Name: value` header argument
pub fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub async fn run(db: Database, config: &AppConfig, args: SubscribeArgs) -> Result<()> {
    let link = url::Url::parse(args.url.trim())
        .map_err(|e| anyhow!("invalid feed URL {:?}: {}", args.url, e))?
        .to_string();

    let feed_repo = FeedRepository::new(&db);
    if let Some(existing) = feed_repo.find_by_link(&link).await? {
        println!("Already subscribed to this feed ({}).", existing.id);
        return Ok(());
    }

    let new_feed = NewFeed {
        name: args.name.unwrap_or_else(|| link.clone()),
        link,
        group_id: args.group,
        auto_fetch_full_content: args.auto_fetch,
        request_options: FeedRequestOptions {
            headers: args.headers.into_iter().collect(),
            proxy: args.proxy,
        },
    };

    let feed = feed_repo.create(&new_feed).await?;
    println!("Created subscription: {} ({})", feed.name, feed.id);

    println!("Pulling items...");
    let pipeline = super::pipeline(db.clone(), config)?;
    match pipeline.pull(&feed).await? {
        PullOutcome::Fetched(count) => {
            println!("Stored {} items from '{}'", count, feed.name);
        }
        PullOutcome::ReadFailed => {
            let failure = FeedRepository::new(&db).get(feed.id).await?.failure;
            println!(
                "Warning: initial pull failed: {}",
                failure.as_deref().unwrap_or("unknown error")
            );
            println!("The subscription was created; the daemon will retry it.");
        }
    }
    pipeline.supervisor().drain().await;

    Ok(())
}
