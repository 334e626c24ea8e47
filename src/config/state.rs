//! Persisted preview state (`vitae.json`).
//!
//! The file is deserialized into a loose [`RawState`] and validated once into
//! a [`State`]. Every update rewrites the whole file through a temporary file
//! and a rename, so readers never observe a half-written state.
//!
//! ```json
//! {
//!   "visibleDocuments": ["alice", "templates/classic"],
//!   "lastDocument": "alice",
//!   "externalDocuments": ["~/cv/consulting"]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::log;
use crate::utils::path::expand_path;

/// On-disk shape, accepted as loosely as possible.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawState {
    visible_documents: Option<Vec<String>>,
    last_document: Option<String>,
    external_documents: Vec<String>,
}

/// Validated state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// Document keys shown in the document list; `None` shows everything.
    pub visible_documents: Option<Vec<String>>,
    /// Key of the document that was active last.
    pub last_document: Option<String>,
    /// Source trees outside the workspace, absolute.
    pub external_documents: Vec<PathBuf>,
}

impl State {
    /// Trim, drop empty entries and duplicates, resolve external paths.
    fn from_raw(raw: RawState, base: &Path) -> Self {
        let visible_documents = raw.visible_documents.map(|keys| dedup(clean(keys)));

        let last_document = raw
            .last_document
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let mut external_documents: Vec<PathBuf> = Vec::new();
        for raw_path in clean(raw.external_documents) {
            let path = expand_path(&raw_path, base);
            if !external_documents.contains(&path) {
                external_documents.push(path);
            }
        }

        Self {
            visible_documents,
            last_document,
            external_documents,
        }
    }

    fn to_raw(&self) -> RawState {
        RawState {
            visible_documents: self.visible_documents.clone(),
            last_document: self.last_document.clone(),
            external_documents: self
                .external_documents
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }

    /// Whether `key` passes the visibility filter.
    pub fn is_visible(&self, key: &str) -> bool {
        self.visible_documents
            .as_ref()
            .is_none_or(|keys| keys.iter().any(|k| k == key))
    }
}

fn clean(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Owner of `vitae.json`.
pub struct StateStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl StateStore {
    /// Read the state file at `path`.
    ///
    /// A missing file yields the default state. An unreadable or malformed
    /// file is reported and replaced by defaults on the next write.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match Self::read(&path) {
            Ok(state) => state,
            Err(err) => {
                log!("warning"; "{:#}, using defaults", anyhow::Error::from(err));
                State::default()
            }
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn read(path: &Path) -> Result<State, ConfigError> {
        if !path.exists() {
            return Ok(State::default());
        }
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let raw: RawState = serde_json::from_str(&content)
            .map_err(|err| ConfigError::Json(path.to_path_buf(), err))?;
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(State::from_raw(raw, base))
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> State {
        self.state.lock().clone()
    }

    /// Apply `f` and persist the result.
    ///
    /// The in-memory state is only replaced once the file was written.
    pub fn update(&self, f: impl FnOnce(&mut State)) -> Result<(), ConfigError> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        f(&mut next);
        self.write(&next)?;
        *guard = next;
        Ok(())
    }

    fn write(&self, state: &State) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&state.to_raw())
            .map_err(|err| ConfigError::Json(self.path.clone(), err))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content + "\n").map_err(|err| ConfigError::Io(tmp.clone(), err))?;
        fs::rename(&tmp, &self.path).map_err(|err| ConfigError::Io(self.path.clone(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(content: &str) -> (TempDir, StateStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vitae.json");
        fs::write(&path, content).unwrap();
        let store = StateStore::load(&path);
        (dir, store)
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(dir.path().join("vitae.json"));
        assert_eq!(store.snapshot(), State::default());
        assert!(store.snapshot().is_visible("anything"));
    }

    #[test]
    fn test_malformed_file_defaults() {
        let (_dir, store) = store_with("{ not json");
        assert_eq!(store.snapshot(), State::default());
    }

    #[test]
    fn test_validation_trims_and_dedups() {
        let (dir, store) = store_with(
            r#"{
                "visibleDocuments": [" alice ", "", "alice", "templates/classic"],
                "lastDocument": "   ",
                "externalDocuments": ["consulting", " consulting ", ""]
            }"#,
        );
        let state = store.snapshot();
        assert_eq!(
            state.visible_documents,
            Some(vec!["alice".to_string(), "templates/classic".to_string()])
        );
        assert_eq!(state.last_document, None);
        assert_eq!(state.external_documents, vec![dir.path().join("consulting")]);
        assert!(state.is_visible("alice"));
        assert!(!state.is_visible("bob"));
    }

    #[test]
    fn test_null_visible_means_all() {
        let (_dir, store) = store_with(r#"{"visibleDocuments": null, "lastDocument": "bob"}"#);
        let state = store.snapshot();
        assert!(state.visible_documents.is_none());
        assert_eq!(state.last_document.as_deref(), Some("bob"));
        assert!(state.is_visible("whatever"));
    }

    #[test]
    fn test_update_rewrites_file() {
        let (dir, store) = store_with(r#"{"visibleDocuments": ["alice"], "unknown": 1}"#);
        store
            .update(|state| state.last_document = Some("alice".into()))
            .unwrap();

        assert!(!dir.path().join("vitae.json.tmp").exists());
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"lastDocument\": \"alice\""));
        assert!(content.contains("\"visibleDocuments\""));
        assert!(!content.contains("unknown"));

        let reloaded = StateStore::load(store.path());
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_failed_write_names_path_and_cause() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(dir.path().join("missing").join("vitae.json"));

        let err = store
            .update(|state| state.last_document = Some("alice".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
        assert_eq!(store.snapshot().last_document, None);

        let message = format!("{:#}", anyhow::Error::from(err));
        assert!(message.starts_with("IO error on `"));
        assert!(message.contains("vitae.json.tmp"));
        assert!(message.contains("os error"));
    }
}
