//! Board preferences that survive across runs: the active tab and the
//! view mode. Read once when the page mounts, written on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::datastore::{load_json, save_json_atomic};
use crate::organizer::ViewMode;
use crate::tabs::TaskTab;

pub const ACTIVE_TAB_KEY: &str = "tasksActiveTab";
pub const VIEW_MODE_KEY: &str = "tasksViewMode";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Key/value preferences kept in one JSON object on disk.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePreferenceStore {
    /// A corrupt file is logged and treated as empty; it is replaced on the
    /// next write.
    pub fn open(path: &Path) -> Self {
        let values = match load_json::<BTreeMap<String, String>>(path) {
            Ok(values) => values.unwrap_or_default(),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "ignoring unreadable preferences");
                BTreeMap::new()
            }
        };
        debug!(file = %path.display(), count = values.len(), "loaded preferences");
        Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        }
    }

    pub fn entries(&self) -> BTreeMap<String, String> {
        self.values.lock().clone()
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        save_json_atomic(&self.path, &*values)
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: &[(&str, &str)]) -> Self {
        let store = Self::default();
        store.values.lock().extend(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        store
    }

    /// Every write in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().clone()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        self.writes.lock().push((key.to_string(), value.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    pub tab: TaskTab,
    pub view_mode: ViewMode,
}

impl Preferences {
    /// Unknown tabs fall back to the default; unknown view modes are kept
    /// and shown as a single unsorted column.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let tab = store
            .get(ACTIVE_TAB_KEY)
            .and_then(|raw| {
                let parsed = TaskTab::parse(&raw);
                if parsed.is_none() {
                    warn!(value = %raw, "ignoring unknown saved tab");
                }
                parsed
            })
            .unwrap_or_default();
        let view_mode = store
            .get(VIEW_MODE_KEY)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| ViewMode::parse(&raw))
            .unwrap_or_default();
        Self { tab, view_mode }
    }

    pub fn save_tab(store: &dyn PreferenceStore, tab: TaskTab) -> anyhow::Result<()> {
        store.set(ACTIVE_TAB_KEY, tab.as_str())
    }

    pub fn save_view_mode(store: &dyn PreferenceStore, mode: &ViewMode) -> anyhow::Result<()> {
        store.set(VIEW_MODE_KEY, mode.as_str())
    }
}
