//! Mtime-based staleness detection for the PDF and text artifacts.
//!
//! Sources are the primary document and the style sheets directly inside
//! `styles/`. Timestamps are compared at the filesystem's native
//! resolution; equal timestamps count as fresh so a rapid rewrite right
//! after a render does not trigger a second render.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::core::SourceTree;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Check whether the PDF of `tree` must be regenerated.
///
/// The tree root must exist; a missing root is reported as an error
/// because it means the caller resolved the wrong document.
pub fn needs_regeneration(tree: &SourceTree) -> io::Result<bool> {
    if !tree.root().is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source tree `{}` does not exist", tree.root().display()),
        ));
    }

    let Some(artifact_time) = get_mtime(&tree.pdf_path()) else {
        return Ok(true);
    };

    let mut sources = vec![tree.primary()];
    sources.extend(tree.style_sheets());

    Ok(sources
        .iter()
        .filter_map(|source| get_mtime(source))
        .any(|source_time| source_time > artifact_time))
}

/// Check whether the text artifact is still valid for the current PDF.
///
/// The text layer never goes stale on its own: it is valid iff it exists
/// and is not older than the PDF it was extracted from.
pub fn text_is_fresh(tree: &SourceTree) -> bool {
    let (Some(text_time), Some(pdf_time)) =
        (get_mtime(&tree.text_path()), get_mtime(&tree.pdf_path()))
    else {
        return false;
    };
    text_time >= pdf_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn make_tree() -> (TempDir, SourceTree, SystemTime) {
        let dir = TempDir::new().unwrap();
        let tree = SourceTree::new(dir.path());
        fs::create_dir_all(tree.styles_dir()).unwrap();
        fs::write(tree.primary(), "<html><body>cv</body></html>").unwrap();
        fs::write(tree.styles_dir().join("main.css"), "body{}").unwrap();

        let t0 = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&tree.primary(), t0);
        set_mtime(&tree.styles_dir().join("main.css"), t0);
        (dir, tree, t0)
    }

    fn render(tree: &SourceTree, at: SystemTime) {
        fs::write(tree.pdf_path(), b"%PDF-1.7").unwrap();
        set_mtime(&tree.pdf_path(), at);
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let (_dir, tree, _) = make_tree();
        assert!(needs_regeneration(&tree).unwrap());
    }

    #[test]
    fn test_missing_root_is_error() {
        let tree = SourceTree::new("/definitely/not/a/resume/tree");
        assert!(needs_regeneration(&tree).is_err());
    }

    #[test]
    fn test_regeneration_cycle() {
        let (_dir, tree, t0) = make_tree();

        render(&tree, t0 + Duration::from_secs(10));
        assert!(!needs_regeneration(&tree).unwrap());

        // Touch a style sheet
        set_mtime(&tree.styles_dir().join("main.css"), t0 + Duration::from_secs(20));
        assert!(needs_regeneration(&tree).unwrap());

        render(&tree, t0 + Duration::from_secs(30));
        assert!(!needs_regeneration(&tree).unwrap());

        // Touch the primary document
        set_mtime(&tree.primary(), t0 + Duration::from_secs(40));
        assert!(needs_regeneration(&tree).unwrap());

        render(&tree, t0 + Duration::from_secs(50));
        assert!(!needs_regeneration(&tree).unwrap());
    }

    #[test]
    fn test_equal_timestamps_are_fresh() {
        let (_dir, tree, t0) = make_tree();
        render(&tree, t0);
        assert!(!needs_regeneration(&tree).unwrap());
    }

    #[test]
    fn test_nested_styles_ignored() {
        let (_dir, tree, t0) = make_tree();
        render(&tree, t0 + Duration::from_secs(10));

        let nested = tree.styles_dir().join("vendor");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("late.css"), "").unwrap();
        set_mtime(&nested.join("late.css"), t0 + Duration::from_secs(60));

        assert!(!needs_regeneration(&tree).unwrap());
    }

    #[test]
    fn test_text_freshness_follows_pdf() {
        let (_dir, tree, t0) = make_tree();
        assert!(!text_is_fresh(&tree));

        render(&tree, t0 + Duration::from_secs(10));
        fs::write(tree.text_path(), "cv").unwrap();
        set_mtime(&tree.text_path(), t0 + Duration::from_secs(11));
        assert!(text_is_fresh(&tree));

        render(&tree, t0 + Duration::from_secs(12));
        assert!(!text_is_fresh(&tree));
    }
}
