use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "VITRINE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bearer token minted by the login surface; empty means anonymous.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            token: String::new(),
            timeout: default_timeout(),
            feed_limit: default_feed_limit(),
        }
    }
}

fn default_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("vitrine/{} (+https://github.com/vitrine-market/vitrine)", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_feed_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_url")]
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            enabled: true,
        }
    }
}

fn default_realtime_url() -> String {
    "wss://api.vitrine.market/ws".to_string()
}

fn default_true() -> bool {
    true
}

/// Swipe tuning. Distance and velocity carry the feed's "quick flick beats
/// slow drag" feel; change them together or not at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GestureConfig {
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
    #[serde(default = "default_velocity_threshold")]
    pub velocity_threshold: f32,
    #[serde(default = "default_points_per_cell")]
    pub points_per_cell: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            velocity_threshold: default_velocity_threshold(),
            points_per_cell: default_points_per_cell(),
        }
    }
}

fn default_distance_threshold() -> f32 {
    50.0
}

fn default_velocity_threshold() -> f32 {
    500.0
}

fn default_points_per_cell() -> f32 {
    18.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_player_command")]
    pub command: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: default_player_command(),
            enabled: true,
        }
    }
}

fn default_player_command() -> Vec<String> {
    vec!["mpv".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

/// Who the session belongs to; resolved by the login surface and mirrored
/// here so the client can evaluate comment capability locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewerConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
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
    if let Some(from_env) = load_env(prefix)? {
        cfg = merge_config(cfg, from_env);
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

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() && other.api.base_url != default_base_url() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.is_empty() && other.api.user_agent != default_user_agent() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.token.is_empty() {
        base.api.token = other.api.token;
    }
    if other.api.timeout != Duration::ZERO {
        base.api.timeout = other.api.timeout;
    }
    if other.api.feed_limit != 0 {
        base.api.feed_limit = other.api.feed_limit;
    }

    if !other.realtime.url.is_empty() && other.realtime.url != default_realtime_url() {
        base.realtime.url = other.realtime.url;
    }
    base.realtime.enabled = other.realtime.enabled;

    if other.gesture.distance_threshold > 0.0 {
        base.gesture.distance_threshold = other.gesture.distance_threshold;
    }
    if other.gesture.velocity_threshold > 0.0 {
        base.gesture.velocity_threshold = other.gesture.velocity_threshold;
    }
    if other.gesture.points_per_cell > 0.0 {
        base.gesture.points_per_cell = other.gesture.points_per_cell;
    }

    if !other.player.command.is_empty() {
        base.player.command = other.player.command;
    }
    base.player.enabled = other.player.enabled;

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }

    if !other.viewer.id.is_empty() {
        base.viewer.id = other.viewer.id;
    }
    if !other.viewer.name.is_empty() {
        base.viewer.name = other.viewer.name;
    }
    if !other.viewer.role.is_empty() {
        base.viewer.role = other.viewer.role;
    }

    base
}

fn load_env(prefix: &str) -> Result<Option<Config>> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(None);
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(Some(cfg))
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.token" => cfg.api.token = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "api.feed_limit" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.api.feed_limit = parsed;
            }
        }
        "realtime.url" => cfg.realtime.url = value,
        "realtime.enabled" => {
            cfg.realtime.enabled = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "gesture.distance_threshold" => {
            if let Ok(parsed) = value.parse::<f32>() {
                cfg.gesture.distance_threshold = parsed;
            }
        }
        "gesture.velocity_threshold" => {
            if let Ok(parsed) = value.parse::<f32>() {
                cfg.gesture.velocity_threshold = parsed;
            }
        }
        "gesture.points_per_cell" => {
            if let Ok(parsed) = value.parse::<f32>() {
                cfg.gesture.points_per_cell = parsed;
            }
        }
        "player.command" => {
            cfg.player.command = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "player.enabled" => {
            cfg.player.enabled = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "ui.theme" => cfg.ui.theme = value,
        "viewer.id" => cfg.viewer.id = value,
        "viewer.name" => cfg.viewer.name = value,
        "viewer.role" => cfg.viewer.role = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vitrine").join("config.yaml"))
}
