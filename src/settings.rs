use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const TOKEN_ENV: &str = "LEDGERSYNC_TOKEN";
pub const BASE_URL_ENV: &str = "LEDGERSYNC_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_rules_path")]
    pub rules_path: String,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

fn default_base_url() -> String {
    "https://api.toshl.com".to_string()
}

fn default_per_page() -> u32 {
    200
}

fn default_lookback_days() -> u32 {
    365
}

fn default_rules_path() -> String {
    config_dir().join("rules.yaml").to_string_lossy().to_string()
}

fn default_state_path() -> String {
    config_dir().join("state.json").to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            per_page: default_per_page(),
            rules_path: default_rules_path(),
            state_path: default_state_path(),
            lookback_days: default_lookback_days(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ledgersync")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Settings file merged with defaults, then environment overrides.
pub fn load_settings() -> Result<Settings> {
    let mut settings = read_settings(&settings_path())?;
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SyncError::Settings(format!("{}: {e}", path.display())))
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(token) = var(TOKEN_ENV).filter(|v| !v.is_empty()) {
        settings.token = token;
    }
    if let Some(url) = var(BASE_URL_ENV).filter(|v| !v.is_empty()) {
        settings.base_url = url;
    }
}

impl Settings {
    pub fn require_token(&self) -> Result<&str> {
        if self.token.is_empty() {
            return Err(SyncError::Settings(format!(
                "no API token: set {TOKEN_ENV} or \"token\" in {}",
                settings_path().display()
            )));
        }
        Ok(&self.token)
    }
}

pub fn shellexpand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}
