use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::platform;

const DEFAULT_ENV_PREFIX: &str = "COMMENTER_WALL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub wall: WallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
        }
    }
}

fn default_base_url() -> String {
    platform::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!(
        "commenter-wall/{} (+https://github.com/ck-zhang/commenter-wall)",
        crate::VERSION
    )
}

fn default_page_size() -> u32 {
    platform::MAX_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WallConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_avatar_base")]
    pub avatar_base: String,
    #[serde(default = "default_profile_base")]
    pub profile_base: String,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            avatar_base: default_avatar_base(),
            profile_base: default_profile_base(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_avatar_base() -> String {
    platform::DEFAULT_AVATAR_BASE.to_string()
}

fn default_profile_base() -> String {
    platform::DEFAULT_PROFILE_BASE.to_string()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.platform.project_id.is_empty() {
        base.platform.project_id = other.platform.project_id;
    }
    if !other.platform.base_url.is_empty() {
        base.platform.base_url = other.platform.base_url;
    }
    if !other.platform.user_agent.is_empty() {
        base.platform.user_agent = other.platform.user_agent;
    }
    if other.platform.page_size != 0 {
        base.platform.page_size = other.platform.page_size;
    }

    if !other.wall.poll_interval.is_zero() {
        base.wall.poll_interval = other.wall.poll_interval;
    }
    if !other.wall.avatar_base.is_empty() {
        base.wall.avatar_base = other.wall.avatar_base;
    }
    if !other.wall.profile_base.is_empty() {
        base.wall.profile_base = other.wall.profile_base;
    }

    base
}

// Env values patch the merged config key by key; untouched keys keep
// whatever the file layer decided.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            apply_env_value(cfg, &normalized, value);
        }
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "platform.project_id" => cfg.platform.project_id = value,
        "platform.base_url" => cfg.platform.base_url = value,
        "platform.user_agent" => cfg.platform.user_agent = value,
        "platform.page_size" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.platform.page_size = parsed;
            }
        }
        "wall.poll_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.wall.poll_interval = duration;
            }
        }
        "wall.avatar_base" => cfg.wall.avatar_base = value,
        "wall.profile_base" => cfg.wall.profile_base = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("commenter-wall").join("config.yaml"))
}
