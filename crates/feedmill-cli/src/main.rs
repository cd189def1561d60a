use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedmill_core::{config::GeneralConfig, storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "feedmill")]
#[command(author, version, about = "Feed ingestion daemon with full-content enrichment")]
struct Cli {
    /// Path to the config file (defaults to ~/.config/feedmill/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull feeds on the configured interval until Ctrl+C
    Daemon,
    /// Run one pull cycle and wait for enrichment to finish
    Pull {
        /// Pull only this feed, even if it is suspended or backing off
        #[arg(short, long)]
        feed: Option<i64>,
    },
    /// Subscribe to a feed
    Subscribe {
        /// Feed URL
        #[arg(short = 's', long)]
        url: String,
        /// Display name (defaults to the URL)
        #[arg(short, long)]
        name: Option<String>,
        /// Group id (defaults to the built-in group)
        #[arg(short, long)]
        group: Option<i64>,
        /// Override full-content fetching for this feed
        #[arg(long)]
        auto_fetch: Option<bool>,
        /// Extra request header, as `Name: value` (repeatable)
        #[arg(long = "header", value_parser = commands::subscribe::parse_header)]
        headers: Vec<(String, String)>,
        /// Proxy used for this feed only
        #[arg(long)]
        proxy: Option<String>,
    },
    /// Remove a feed and its items
    Unsubscribe {
        /// Feed id
        id: i64,
    },
    /// List feeds with their health
    List,
    /// Change an existing feed
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },
    /// Manage feed groups
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// List stored items, newest first
    Items {
        #[arg(short, long)]
        feed: Option<i64>,
        /// Only unread items
        #[arg(short, long)]
        unread: bool,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Print an item, fetching its full content if missing, and mark it read
    Read {
        /// Item id
        id: i64,
        /// Do not fetch the linked page
        #[arg(long)]
        no_fetch: bool,
    },
}

#[derive(Subcommand)]
enum FeedAction {
    /// Rename, regroup, suspend or resume a feed, or change its override
    Set {
        /// Feed id
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        /// Move the feed to this group
        #[arg(short, long)]
        group: Option<i64>,
        /// Suspended feeds are skipped by scheduled pulls
        #[arg(long)]
        suspended: Option<bool>,
        /// Full-content fetching: on, off or inherit
        #[arg(long, value_parser = commands::feed::parse_auto_fetch)]
        auto_fetch: Option<commands::feed::AutoFetch>,
    },
}

#[derive(Subcommand)]
enum GroupAction {
    /// Create a group
    Add {
        name: String,
        /// Override full-content fetching for feeds in this group
        #[arg(long)]
        auto_fetch: Option<bool>,
    },
    /// Change a group's full-content override
    Set {
        /// Group id
        id: i64,
        /// on, off or inherit
        #[arg(long, value_parser = commands::feed::parse_auto_fetch)]
        auto_fetch: commands::feed::AutoFetch,
    },
    /// List groups
    List,
}

fn init_logging(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(general.log_level.as_str()));

    let (json, text) = if general.log_format.eq_ignore_ascii_case("json") {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_target(false)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&config.general);
    config.apply_env_overrides();

    let config = Arc::new(config);
    let db = Database::new(&config).await?;

    match cli.command {
        Commands::Daemon => commands::daemon::run(db, config).await,
        Commands::Pull { feed } => commands::pull::run(db, &config, feed).await,
        Commands::Subscribe {
            url,
            name,
            group,
            auto_fetch,
            headers,
            proxy,
        } => {
            let args = commands::subscribe::SubscribeArgs {
                url,
                name,
                group,
                auto_fetch,
                headers,
                proxy,
            };
            commands::subscribe::run(db, &config, args).await
        }
        Commands::Unsubscribe { id } => commands::unsubscribe::run(&db, id).await,
        Commands::List => commands::list::run(&db).await,
        Commands::Feed { action } => match action {
            FeedAction::Set {
                id,
                name,
                group,
                suspended,
                auto_fetch,
            } => {
                let args = commands::feed::FeedSetArgs {
                    name,
                    group,
                    suspended,
                    auto_fetch,
                };
                commands::feed::set(&db, id, args).await
            }
        },
        Commands::Group { action } => match action {
            GroupAction::Add { name, auto_fetch } => {
                commands::group::add(&db, &name, auto_fetch).await
            }
            GroupAction::Set { id, auto_fetch } => {
                commands::group::set(&db, id, auto_fetch).await
            }
            GroupAction::List => commands::group::list(&db).await,
        },
        Commands::Items {
            feed,
            unread,
            limit,
        } => commands::items::list(db, &config, feed, unread, limit).await,
        Commands::Read { id, no_fetch } => commands::items::read(db, &config, id, !no_fetch).await,
    }
}
