use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub listings: ListingsConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chats the bot responds in. Empty means every chat.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    /// Empty key disables the remote extractor; the local parser takes over.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_extractor_model")]
    pub model: String,
    #[serde(default = "default_extractor_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingsConfig {
    #[serde(default = "default_listings_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_extractor_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_extractor_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_listings_base_url() -> String {
    "https://theunitypro.com".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_extractor_model(),
            base_url: default_extractor_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ListingsConfig {
    fn default() -> Self {
        Self {
            base_url: default_listings_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // The listings API paths are joined onto this, so no trailing slash.
        while config.listings.base_url.ends_with('/') {
            config.listings.base_url.pop();
        }

        if !config.dedup.state_dir.exists() {
            std::fs::create_dir_all(&config.dedup.state_dir).with_context(|| {
                format!(
                    "Failed to create state directory: {}",
                    config.dedup.state_dir.display()
                )
            })?;
        }

        Ok(config)
    }
}
