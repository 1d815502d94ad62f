use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_DISTANCE_BETWEEN_DUPLICATES, DEFAULT_PAGE_SIZE, DEFAULT_STORE_RETRY_ATTEMPTS,
    DEFAULT_STORE_RETRY_PAUSE_MS, MAX_PAGES,
};

/// Engine configuration, loadable from a camelCase JSON file.
/// Every field has a default so partial files are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub timeline: TimelineSettings,
    #[serde(default)]
    pub conversation: ConversationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSettings {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Global default for duplicate collapsing on a timeline seen for the first time
    #[serde(default = "default_true")]
    pub collapse_duplicates: bool,
    /// D: how far apart (in display positions) duplicates may be and still be grouped
    #[serde(default = "default_max_distance")]
    pub max_distance_between_duplicates: usize,
    #[serde(default = "default_retry_attempts")]
    pub store_retry_attempts: u32,
    #[serde(default = "default_retry_pause_ms")]
    pub store_retry_pause_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSettings {
    #[serde(default = "default_true")]
    pub allow_remote_fetch: bool,
    #[serde(default = "default_retry_attempts")]
    pub store_retry_attempts: u32,
    #[serde(default = "default_retry_pause_ms")]
    pub store_retry_pause_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("skein_data")
}

fn default_max_pages() -> usize {
    MAX_PAGES
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_distance() -> usize {
    DEFAULT_MAX_DISTANCE_BETWEEN_DUPLICATES
}

fn default_retry_attempts() -> u32 {
    DEFAULT_STORE_RETRY_ATTEMPTS
}

fn default_retry_pause_ms() -> u64 {
    DEFAULT_STORE_RETRY_PAUSE_MS
}

fn default_true() -> bool {
    true
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            collapse_duplicates: default_true(),
            max_distance_between_duplicates: default_max_distance(),
            store_retry_attempts: default_retry_attempts(),
            store_retry_pause_ms: default_retry_pause_ms(),
        }
    }
}

impl TimelineSettings {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.store_retry_pause_ms)
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            allow_remote_fetch: default_true(),
            store_retry_attempts: default_retry_attempts(),
            store_retry_pause_ms: default_retry_pause_ms(),
        }
    }
}

impl ConversationSettings {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.store_retry_pause_ms)
    }
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            timeline: TimelineSettings::default(),
            conversation: ConversationSettings::default(),
        }
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load config from a JSON file, falling back to defaults rooted at
    /// `data_dir` when the file does not exist.
    pub fn load_or_default(path: &Path, data_dir: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(data_dir));
        }
        Self::load(path)
    }

    pub fn item_db_path(&self) -> PathBuf {
        self.data_dir.join(crate::constants::files::ITEM_DB)
    }

    pub fn view_state_path(&self) -> PathBuf {
        self.data_dir.join(crate::constants::files::VIEW_STATE)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}
