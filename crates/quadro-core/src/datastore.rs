use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Local data directory: the session tokens and the board preferences.
#[derive(Debug, Clone)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
    pub preferences_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let session_path = data_dir.join("session.json");
        let preferences_path = data_dir.join("preferences.json");

        info!(
            data_dir = %data_dir.display(),
            session = %session_path.display(),
            preferences = %preferences_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            session_path,
            preferences_path,
        })
    }
}

/// Reads a JSON document, treating a missing or empty file as absent.
#[tracing::instrument(skip(path))]
pub fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    debug!(file = %path.display(), "loading json");
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed reading {}", path.display()));
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing {}", path.display()))?;
    Ok(Some(value))
}

#[tracing::instrument(skip(path, value))]
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

pub fn remove_file(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed removing {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn json_documents_survive_a_round_trip_and_removal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(&dir.path().join("nested")).expect("open");

        let missing: Option<BTreeMap<String, String>> =
            load_json(&store.preferences_path).expect("load");
        assert!(missing.is_none());

        let mut prefs = BTreeMap::new();
        prefs.insert("tasksViewMode".to_string(), "priority".to_string());
        save_json_atomic(&store.preferences_path, &prefs).expect("save");
        let loaded: Option<BTreeMap<String, String>> =
            load_json(&store.preferences_path).expect("load");
        assert_eq!(loaded, Some(prefs));

        remove_file(&store.preferences_path).expect("remove");
        remove_file(&store.preferences_path).expect("second remove is a no-op");
    }

    #[test]
    fn corrupt_documents_are_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").expect("write");
        let result: anyhow::Result<Option<BTreeMap<String, String>>> = load_json(&path);
        assert!(result.is_err());
    }
}
