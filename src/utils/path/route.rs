//! URL to file mapping inside a source tree.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a request URL to an existing file inside `root`.
///
/// The query string and fragment are dropped and the path is
/// percent-decoded. Any `..`, root or prefix component rejects the request
/// so nothing outside the tree can be served.
pub fn resolve_in_tree(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    resolved.is_file().then_some(resolved)
}

/// Display `path` relative to `root` with forward slashes.
///
/// Falls back to the file name when `path` lies outside `root`.
pub fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("styles")).unwrap();
        fs::write(dir.path().join("styles/main.css"), "body{}").unwrap();
        fs::write(dir.path().join("my photo.png"), "png").unwrap();
        dir
    }

    #[test]
    fn test_resolve_plain() {
        let dir = make_tree();
        assert_eq!(
            resolve_in_tree(dir.path(), "/styles/main.css?v=3"),
            Some(dir.path().join("styles/main.css"))
        );
    }

    #[test]
    fn test_resolve_percent_encoded() {
        let dir = make_tree();
        assert_eq!(
            resolve_in_tree(dir.path(), "/my%20photo.png"),
            Some(dir.path().join("my photo.png"))
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = make_tree();
        assert_eq!(resolve_in_tree(dir.path(), "/../etc/passwd"), None);
        assert_eq!(resolve_in_tree(dir.path(), "/styles/%2e%2e/%2e%2e/x"), None);
    }

    #[test]
    fn test_directory_not_served() {
        let dir = make_tree();
        assert_eq!(resolve_in_tree(dir.path(), "/styles"), None);
    }

    #[test]
    fn test_relative_display() {
        let root = Path::new("/cv/alice");
        assert_eq!(relative_display(root, Path::new("/cv/alice/styles/main.css")), "styles/main.css");
        assert_eq!(relative_display(root, Path::new("/elsewhere/x.css")), "x.css");
    }
}
