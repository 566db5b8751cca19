use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Notion database that holds the watch log
    pub notion_database_id: String,

    /// Notion integration secret
    pub notion_api_key: String,

    /// Value sent in the `Notion-Version` header (e.g. 2022-06-28)
    pub notion_version: String,

    /// Letterboxd account whose RSS feed is synced
    pub letterboxd_username: String,

    /// Notion API base URL
    #[serde(default = "default_notion_api_url")]
    pub notion_api_url: String,

    /// Letterboxd base URL; the feed lives at `{feed_base_url}/{username}/rss/`
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,

    /// Page size for database queries (Notion caps this at 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for a request that failed transiently
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_notion_api_url() -> String {
    "https://api.notion.com".to_string()
}

fn default_feed_base_url() -> String {
    "https://letterboxd.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(vars).map_err(|e| match e {
            envy::Error::MissingValue(field) => AppError::Config(format!(
                "{} environment variable is not set",
                field.to_uppercase()
            )),
            other => AppError::Config(format!("Failed to load config: {}", other)),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        let required = [
            ("NOTION_DATABASE_ID", &self.notion_database_id),
            ("NOTION_API_KEY", &self.notion_api_key),
            ("NOTION_VERSION", &self.notion_version),
            ("LETTERBOXD_USERNAME", &self.letterboxd_username),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "{} environment variable is not set",
                    name
                )));
            }
        }

        Ok(())
    }

    /// RSS feed location for the configured account
    pub fn feed_url(&self) -> String {
        format!(
            "{}/{}/rss/",
            self.feed_base_url.trim_end_matches('/'),
            self.letterboxd_username.trim()
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
