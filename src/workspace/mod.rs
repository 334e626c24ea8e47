//! Workspace layout and document discovery.
//!
//! ```text
//! <root>/
//! ├── resumes/<name>/      # local documents
//! ├── templates/<name>/    # template documents
//! ├── vitae.json           # persisted state
//! ├── vitae.toml           # optional configuration
//! └── .vitae-cache/        # runtime cache (browser profile)
//! ```
//!
//! External documents live anywhere on disk and are registered in the
//! state file.

mod context;

pub use context::{AppContext, SwitchError};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::State;
use crate::core::{DocumentId, DocumentRef};

pub const RESUMES_DIR: &str = "resumes";
pub const TEMPLATES_DIR: &str = "templates";
pub const CACHE_DIR: &str = ".vitae-cache";
pub const STATE_FILE: &str = "vitae.json";

/// Directory layout rooted at the workspace root.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resumes_dir(&self) -> PathBuf {
        self.root.join(RESUMES_DIR)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// Every known document: local, then templates, then externals.
    ///
    /// Local and template names are sorted; externals keep state order.
    pub fn documents(&self, state: &State) -> Vec<DocumentRef> {
        let mut documents = Vec::new();

        for (name, path) in subdirectories(&self.resumes_dir()) {
            documents.push(DocumentRef::new(DocumentId::Local { name }, path));
        }
        for (name, path) in subdirectories(&self.templates_dir()) {
            documents.push(DocumentRef::new(DocumentId::Template { name }, path));
        }
        for path in &state.external_documents {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let id = DocumentId::External {
                name,
                path: path.clone(),
            };
            if documents.iter().any(|d| d.id.key() == id.key()) {
                crate::log!("warning"; "duplicate external document `{}` ignored", path.display());
                continue;
            }
            documents.push(DocumentRef::new(id, path.clone()));
        }

        documents
    }

    /// Documents shown in listings.
    pub fn visible_documents(&self, state: &State) -> Vec<DocumentRef> {
        self.documents(state)
            .into_iter()
            .filter(|d| state.is_visible(&d.id.key()))
            .collect()
    }

    /// Look up a document by its boundary key.
    pub fn find(&self, state: &State, key: &str) -> Option<DocumentRef> {
        let key = key.trim();
        self.documents(state).into_iter().find(|d| d.id.key() == key)
    }

    /// Document to activate at startup.
    ///
    /// Order: `preferred` (CLI), the last active document, the first
    /// visible document, the first known document.
    pub fn initial_document(&self, state: &State, preferred: Option<&str>) -> Option<DocumentRef> {
        let documents = self.documents(state);
        let by_key = |key: &str| documents.iter().find(|d| d.id.key() == key.trim()).cloned();

        if let Some(key) = preferred {
            match by_key(key) {
                Some(document) => return Some(document),
                None => crate::log!("warning"; "unknown document `{}`", key),
            }
        }
        if let Some(document) = state.last_document.as_deref().and_then(by_key) {
            return Some(document);
        }

        documents
            .iter()
            .find(|d| state.is_visible(&d.id.key()))
            .or_else(|| documents.first())
            .cloned()
    }
}

/// Non-hidden subdirectories of `dir`, sorted by name.
fn subdirectories(dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            (!name.starts_with('.')).then(|| (name, e.path()))
        })
        .collect();
    found.sort();
    found
}
