use clap::Parser;
use feedsift::{AiConfig, FeedSift, FetchConfig, ItemStore, MemoryStore, SqliteStore, ViewQuery};
use std::sync::Arc;
use tracing::{info, warn};

/// Fetch a list of feeds once and print the filtered result for a view built
/// over all of them.
#[derive(Parser, Debug)]
#[command(name = "feedsift", version, about)]
struct Args {
    /// Path to a newline-separated list of feed URLs to import
    #[arg(long)]
    feeds: std::path::PathBuf,

    /// SQLite database URL; omit to run against an in-memory store
    #[arg(long)]
    db: Option<String>,

    /// Only show unread items
    #[arg(long)]
    unread_only: bool,

    /// Drop items older than this many minutes
    #[arg(long)]
    max_age: Option<i64>,

    /// Natural-language whitelist rule for the AI stage
    #[arg(long)]
    ai_whitelist: Option<String>,

    /// Natural-language blacklist rule for the AI stage
    #[arg(long)]
    ai_blacklist: Option<String>,

    /// API key for the remote classifier (falls back to FEEDSIFT_AI_KEY)
    #[arg(long, env = "FEEDSIFT_AI_KEY")]
    ai_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let store: Arc<dyn ItemStore> = match &args.db {
        Some(url) => Arc::new(SqliteStore::connect(url).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let ai_config = AiConfig {
        api_key: args.ai_key.clone(),
        ..AiConfig::default()
    };
    let app = FeedSift::new(store, FetchConfig::default(), ai_config);

    let feed_list = tokio::fs::read_to_string(&args.feeds).await?;
    let source_ids = app.import_sources(&feed_list).await;
    if source_ids.is_empty() {
        anyhow::bail!("no usable feed URLs in {}", args.feeds.display());
    }
    info!("imported {} sources", source_ids.len());

    let view_id = {
        let registry = app.registry();
        let mut registry = registry.write().await;
        let view_id = registry.add_view("all feeds", source_ids);
        if let Some(rule) = &args.ai_whitelist {
            let rule_id =
                registry.add_ai_rule("cli whitelist", feedsift::RuleKind::Whitelist, rule.as_str());
            registry.set_ai_rule(view_id, rule_id);
        }
        if let Some(rule) = &args.ai_blacklist {
            let rule_id =
                registry.add_ai_rule("cli blacklist", feedsift::RuleKind::Blacklist, rule.as_str());
            registry.set_ai_rule(view_id, rule_id);
        }
        view_id
    };

    let report = app.refresh_all().await?;
    info!("fetched {} items", report.fetched);
    for url in &report.failed_sources {
        warn!("source failed this cycle: {}", url);
    }

    let ai_enabled = args.ai_whitelist.is_some() || args.ai_blacklist.is_some();
    let result = app
        .items_for_view(&ViewQuery {
            view_id,
            unread_only: args.unread_only,
            max_age_minutes: args.max_age,
            ai_enabled,
        })
        .await?;

    println!("{} items:", result.items.len());
    for item in &result.items {
        let highlight = result
            .matched_keywords
            .get(&item.id)
            .map(|terms| format!(" [matched: {}]", terms.join(", ")))
            .unwrap_or_default();
        println!("  {}  {}{}", item.published_at.format("%Y-%m-%d %H:%M"), item.title, highlight);
    }

    Ok(())
}
