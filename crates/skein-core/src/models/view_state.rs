use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::item::ItemId;
use super::timeline_key::TimelineKey;
use crate::constants::files;

/// Where the user left a timeline, restored on the next session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default)]
    pub visible_item_id: ItemId,
    #[serde(default)]
    pub scroll_offset: i32,
    #[serde(default)]
    pub oldest_visible_date: i64,
    /// `None` means "use the configured default"
    #[serde(default)]
    pub collapse_duplicates: Option<bool>,
    #[serde(default)]
    pub collapse_overrides: BTreeSet<ItemId>,
}

#[derive(Debug, thiserror::Error)]
pub enum ViewStateError {
    #[error("Failed to read view state: {0}")]
    Read(String),
    #[error("Failed to parse view state: {0}")]
    Parse(String),
    #[error("Failed to save view state: {0}")]
    Write(String),
}

/// Per-timeline view state persisted to a JSON file in the data directory
pub struct ViewStateStorage {
    path: PathBuf,
    states: HashMap<String, ViewState>,
    last_error: Option<ViewStateError>,
}

impl ViewStateStorage {
    /// Load from `<data_dir>/view_state.json`. A missing file is not an error;
    /// an unreadable one starts empty and is reported by `last_error()`.
    pub fn new(data_dir: &Path) -> Self {
        let path = data_dir.join(files::VIEW_STATE);
        let (states, last_error) = Self::load_from_file(&path);
        Self {
            path,
            states,
            last_error,
        }
    }

    fn load_from_file(path: &Path) -> (HashMap<String, ViewState>, Option<ViewStateError>) {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(states) => (states, None),
                Err(e) => (HashMap::new(), Some(ViewStateError::Parse(e.to_string()))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (HashMap::new(), None),
            Err(e) => (HashMap::new(), Some(ViewStateError::Read(e.to_string()))),
        }
    }

    fn save_to_file(&mut self) -> Result<(), ViewStateError> {
        let json = serde_json::to_string_pretty(&self.states)
            .map_err(|e| ViewStateError::Write(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ViewStateError::Write(e.to_string()))?;
        }
        fs::write(&self.path, json).map_err(|e| ViewStateError::Write(e.to_string()))?;
        self.last_error = None;
        Ok(())
    }

    pub fn last_error(&self) -> Option<&ViewStateError> {
        self.last_error.as_ref()
    }

    pub fn get(&self, timeline: &TimelineKey) -> Option<&ViewState> {
        self.states.get(&timeline.storage_key())
    }

    pub fn save(&mut self, timeline: &TimelineKey, state: ViewState) -> Result<(), ViewStateError> {
        self.states.insert(timeline.storage_key(), state);
        self.save_to_file()
    }

    pub fn remove(&mut self, timeline: &TimelineKey) -> Result<(), ViewStateError> {
        if self.states.remove(&timeline.storage_key()).is_some() {
            self.save_to_file()?;
        }
        Ok(())
    }
}
