mod config;
mod dedup;
mod intent;
mod listings;
mod parser;
mod pipeline;
mod platform;
mod reply;
mod resolver;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::intent::IntentExtractor;
use crate::listings::ListingsClient;
use crate::pipeline::Pipeline;
use crate::platform::telegram::AppState;
use crate::resolver::Resolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,listingbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Listings API: {}", config.listings.base_url);
    info!(
        "  Extractor: {}",
        if config.extractor.api_key.is_empty() {
            "local parser only"
        } else {
            config.extractor.model.as_str()
        }
    );
    info!("  State directory: {}", config.dedup.state_dir.display());
    info!("  Allowed chats: {:?}", config.telegram.allowed_chat_ids);

    let extractor = IntentExtractor::new(config.extractor.clone());
    let resolver = Resolver::new(ListingsClient::new(config.listings.clone()));
    let pipeline = Pipeline::new(extractor, resolver);

    let state = Arc::new(AppState::new(pipeline, config.dedup.state_dir.clone()));

    info!("Bot is starting...");
    platform::telegram::run(
        state,
        &config.telegram.bot_token,
        config.telegram.allowed_chat_ids.clone(),
    )
    .await?;

    Ok(())
}
