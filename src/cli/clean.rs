//! `vitae clean` and `vitae list`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::StateStore;
use crate::workspace::Workspace;
use crate::{debug, log};

/// What a cleanup removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub files: usize,
    pub cache: bool,
}

/// Delete `resume.pdf`/`resume.txt` of every known document and the cache.
///
/// Keeps going past individual failures; the first one is returned after
/// everything else was attempted.
pub fn clean_workspace(workspace: &Workspace) -> Result<CleanReport> {
    let state = StateStore::load(workspace.state_path()).snapshot();
    let mut report = CleanReport::default();
    let mut first_error = None;

    for document in workspace.documents(&state) {
        for path in [document.tree.pdf_path(), document.tree.text_path()] {
            match remove_file(&path) {
                Ok(true) => {
                    debug!("clean"; "removed {}", path.display());
                    report.files += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    log!("clean"; "{:#}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    let cache = workspace.cache_dir();
    if cache.is_dir() {
        match fs::remove_dir_all(&cache) {
            Ok(()) => report.cache = true,
            Err(e) => {
                let e = anyhow::Error::from(e).context(format!("Failed to remove {}", cache.display()));
                log!("clean"; "{:#}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    log!(
        "clean";
        "removed {} generated file(s){}",
        report.files,
        if report.cache { " and the runtime cache" } else { "" }
    );

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// `Ok(false)` when there was nothing to remove.
fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Print every known document, marking the last active and hidden ones.
pub fn list_documents(workspace: &Workspace) -> Result<()> {
    let state = StateStore::load(workspace.state_path()).snapshot();
    let documents = workspace.documents(&state);

    if documents.is_empty() {
        log!(
            "list";
            "no documents in {}",
            workspace.resumes_dir().display()
        );
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for document in documents {
        let key = document.id.key();
        let marker = if state.last_document.as_deref() == Some(key.as_str()) {
            "*"
        } else {
            " "
        };
        let hidden = if state.is_visible(&key) { "" } else { " (hidden)" };
        writeln!(
            out,
            "{marker} {key:<32} {:<8} {}{hidden}",
            document.id.kind().label(),
            document.tree.root().display()
        )
        .context("Failed to write document list")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PDF_FILE, PRIMARY_FILE, TEXT_FILE};
    use tempfile::TempDir;

    fn document(root: &Path, dir: &str) -> std::path::PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(PRIMARY_FILE), "<html></html>").unwrap();
        path
    }

    #[test]
    fn test_clean_removes_artifacts_and_cache() {
        let dir = TempDir::new().unwrap();
        let alice = document(dir.path(), "resumes/alice");
        let classic = document(dir.path(), "templates/classic");
        fs::write(alice.join(PDF_FILE), "%PDF").unwrap();
        fs::write(alice.join(TEXT_FILE), "text").unwrap();
        fs::write(classic.join(PDF_FILE), "%PDF").unwrap();
        fs::create_dir_all(dir.path().join(".vitae-cache/browser")).unwrap();

        let workspace = Workspace::new(dir.path());
        let report = clean_workspace(&workspace).unwrap();

        assert_eq!(report, CleanReport { files: 3, cache: true });
        assert!(!alice.join(PDF_FILE).exists());
        assert!(!alice.join(TEXT_FILE).exists());
        assert!(!classic.join(PDF_FILE).exists());
        assert!(alice.join(PRIMARY_FILE).exists());
        assert!(!workspace.cache_dir().exists());
    }

    #[test]
    fn test_clean_includes_external_documents() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let external = document(outside.path(), "consulting");
        fs::write(external.join(PDF_FILE), "%PDF").unwrap();
        fs::write(
            dir.path().join("vitae.json"),
            format!(r#"{{"externalDocuments": ["{}"]}}"#, external.display()),
        )
        .unwrap();

        let report = clean_workspace(&Workspace::new(dir.path())).unwrap();
        assert_eq!(report.files, 1);
        assert!(!report.cache);
        assert!(!external.join(PDF_FILE).exists());
    }

    #[test]
    fn test_clean_empty_workspace() {
        let dir = TempDir::new().unwrap();
        let report = clean_workspace(&Workspace::new(dir.path())).unwrap();
        assert_eq!(report, CleanReport::default());
    }
}
