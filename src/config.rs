use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_ENV_PREFIX: &str = "AGGR";
pub const USERNAME_PLACEHOLDER: &str = "{username}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    // Must serve JSON Feed; RSS and Atom documents are rejected at parse time.
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_url_template() -> String {
    format!("https://aggr.md/@{USERNAME_PLACEHOLDER}.json")
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("aggr-cli/{}", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(env::temp_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Labels {
    #[default]
    Numbers,
    Letters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UIConfig {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub activate_on_move: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    let path = options.config_file.or_else(default_config_path);
    if let Some(path) = path.as_ref() {
        if path.exists() {
            cfg = read_config_file(path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    anyhow::ensure!(
        cfg.feed.url_template.contains(USERNAME_PLACEHOLDER),
        "config: feed.url_template must contain {USERNAME_PLACEHOLDER}"
    );
    let sample = cfg.feed.url_template.replace(USERNAME_PLACEHOLDER, "username");
    let parsed = Url::parse(&sample)
        .with_context(|| format!("config: feed.url_template {sample:?} is not a valid URL"))?;
    anyhow::ensure!(
        matches!(parsed.scheme(), "http" | "https"),
        "config: feed.url_template must be an http or https URL"
    );
    if cfg.feed.user_agent.trim().is_empty() {
        cfg.feed.user_agent = default_user_agent();
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feed.url_template" => cfg.feed.url_template = value,
        "feed.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.timeout = duration;
            }
        }
        "feed.user_agent" => cfg.feed.user_agent = value,
        "cache.dir" => cfg.cache.dir = Some(PathBuf::from(value)),
        "ui.labels" => match value.to_ascii_lowercase().as_str() {
            "letters" => cfg.ui.labels = Labels::Letters,
            "numbers" => cfg.ui.labels = Labels::Numbers,
            _ => {}
        },
        "ui.activate_on_move" => {
            cfg.ui.activate_on_move = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("aggr").join("config.yaml"))
}
