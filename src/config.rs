use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::Identity;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const DEFAULT_DATABASE_PATH: &str = "data/chat.db";
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_LIVE_WINDOW: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Messages per history page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Latest messages replayed when a live subscription opens.
    #[serde(default = "default_live_window")]
    pub live_window: usize,
    /// Only mark incoming messages seen once the UI reports them visible.
    #[serde(default = "default_require_visibility")]
    pub require_visibility: bool,
    #[serde(default)]
    pub identity: Option<Identity>,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_live_window() -> usize {
    DEFAULT_LIVE_WINDOW
}

fn default_require_visibility() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            page_size: DEFAULT_PAGE_SIZE,
            live_window: DEFAULT_LIVE_WINDOW,
            require_visibility: true,
            identity: None,
        }
    }
}

impl AppConfig {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            page_size: self.page_size.max(1),
            live_window: self.live_window,
            require_visibility: self.require_visibility,
        }
    }
}

/// Knobs of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub page_size: usize,
    pub live_window: usize,
    pub require_visibility: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        AppConfig::default().sync_config()
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

/// Stores `identity` as the default login in the config file at `path`.
pub fn persist_identity(path: &str, identity: &Identity) {
    let mut config = load_config(path);
    if config.identity.as_ref() == Some(identity) {
        return;
    }
    config.identity = Some(identity.clone());

    if let Err(err) = save_config(path, &config) {
        log::error!("Failed to write config {}: {err}", path);
    } else {
        log::info!("Persisted identity {} to {}", identity.user_id, path);
    }
}
