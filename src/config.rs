// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub database_path: PathBuf,
    #[serde(default, skip_serializing)]
    pub jwt_secret: String,
    pub query_timeout_secs: u64,
    pub profile_gap_ttl_hours: i64,
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            database_path: PathBuf::from("data/placement.db"),
            jwt_secret: String::new(),
            query_timeout_secs: 10,
            profile_gap_ttl_hours: 24,
            log_path: Some(PathBuf::from("/tmp/placement-insights.log")),
            llm: LlmSettings::default(),
        }
    }
}

/// Every field optional so a partial `config.yaml` only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    port: Option<u16>,
    database_path: Option<PathBuf>,
    jwt_secret: Option<String>,
    query_timeout_secs: Option<u64>,
    profile_gap_ttl_hours: Option<i64>,
    log_path: Option<PathBuf>,
    #[serde(default)]
    llm: LlmFile,
}

#[derive(Debug, Default, Deserialize)]
struct LlmFile {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Defaults, then `config.yaml` (or `CONFIG_PATH`) when present, then
    /// environment variables.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::default();

        let path = Path::new(&path);
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            config = config.merge_file(path)?;
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.database_path = resolve_path(&config.database_path)?;
        config.validate()?;
        Ok(config)
    }

    fn merge_file(mut self, path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file: ConfigFile =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(db) = file.database_path {
            self.database_path = db;
        }
        if let Some(secret) = file.jwt_secret {
            self.jwt_secret = secret;
        }
        if let Some(secs) = file.query_timeout_secs {
            self.query_timeout_secs = secs;
        }
        if let Some(hours) = file.profile_gap_ttl_hours {
            self.profile_gap_ttl_hours = hours;
        }
        if file.log_path.is_some() {
            self.log_path = file.log_path;
        }
        if let Some(url) = file.llm.base_url {
            self.llm.base_url = url;
        }
        if file.llm.api_key.is_some() {
            self.llm.api_key = file.llm.api_key;
        }
        if let Some(model) = file.llm.model {
            self.llm.model = model;
        }
        if let Some(secs) = file.llm.timeout_secs {
            self.llm.timeout_secs = secs;
        }
        Ok(self)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup("ROCKET_PORT") {
            self.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?;
        }
        if let Some(db) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(db);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(secs) = lookup("QUERY_TIMEOUT_SECS") {
            self.query_timeout_secs = secs.parse().context("QUERY_TIMEOUT_SECS must be a number")?;
        }
        if let Some(hours) = lookup("PROFILE_GAP_TTL_HOURS") {
            self.profile_gap_ttl_hours = hours.parse().context("PROFILE_GAP_TTL_HOURS must be a number")?;
        }
        if let Some(path) = lookup("LOG_PATH") {
            self.log_path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm.base_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.llm.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(secs) = lookup("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = secs.parse().context("LLM_TIMEOUT_SECS must be a number")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET is not set. Server cannot start without a token secret.");
        }
        if self.query_timeout_secs == 0 {
            anyhow::bail!("query_timeout_secs must be greater than zero");
        }
        if self.profile_gap_ttl_hours <= 0 {
            anyhow::bail!("profile_gap_ttl_hours must be greater than zero");
        }
        Ok(())
    }
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(current_dir.join(path))
    }
}
