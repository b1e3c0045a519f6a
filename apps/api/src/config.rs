use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::analysis::sources::FetchStrategy;

const DEFAULT_READER_PROXY_URL: &str = "https://r.jina.ai/";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub database_url: Option<String>,
    pub save_to_db: bool,
    pub fetch_strategy: FetchStrategy,
    pub reader_proxy_url: String,
    pub reader_api_key: Option<String>,
    pub browser_timeout: Duration,
    pub document_max_wait: Duration,
    pub organizations_file: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let config = Config {
            google_api_key: require("GOOGLE_API_KEY")?,
            s3_bucket: require("S3_BUCKET_NAME")?,
            s3_region: var("S3_REGION").unwrap_or_else(|| "ap-northeast-2".to_string()),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            database_url: var("DATABASE_URL"),
            save_to_db: parse_bool(var("SAVE_TO_DB").as_deref(), "SAVE_TO_DB")?,
            fetch_strategy: var("FETCH_STRATEGY")
                .map(|s| s.parse::<FetchStrategy>())
                .transpose()
                .map_err(anyhow::Error::msg)?
                .unwrap_or_default(),
            reader_proxy_url: var("READER_PROXY_URL")
                .unwrap_or_else(|| DEFAULT_READER_PROXY_URL.to_string()),
            reader_api_key: var("READER_API_KEY"),
            browser_timeout: Duration::from_secs(parse_u64(
                var("BROWSER_TIMEOUT_SECONDS").as_deref(),
                "BROWSER_TIMEOUT_SECONDS",
                30,
            )?),
            document_max_wait: Duration::from_secs(parse_u64(
                var("DOCUMENT_MAX_WAIT_SECONDS").as_deref(),
                "DOCUMENT_MAX_WAIT_SECONDS",
                60,
            )?),
            organizations_file: var("ORGANIZATIONS_FILE").map(PathBuf::from),
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.document_max_wait.is_zero() {
            bail!("DOCUMENT_MAX_WAIT_SECONDS must be greater than zero");
        }
        if self.browser_timeout.is_zero() {
            bail!("BROWSER_TIMEOUT_SECONDS must be greater than zero");
        }
        if self.save_to_db && self.database_url.is_none() {
            bail!("SAVE_TO_DB is enabled but DATABASE_URL is not set");
        }
        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            bail!("AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together");
        }
        if !self.reader_proxy_url.starts_with("http://")
            && !self.reader_proxy_url.starts_with("https://")
        {
            bail!("READER_PROXY_URL must be an http(s) URL");
        }
        Ok(())
    }
}

fn parse_bool(value: Option<&str>, key: &str) -> Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => bail!("{key} must be a boolean, got '{v}'"),
    }
}

fn parse_u64(value: Option<&str>, key: &str, default: u64) -> Result<u64> {
    value
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a non-negative integer"))
        })
        .unwrap_or(Ok(default))
}
