//! Filesystem path normalization.

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Expand a user-supplied path (`~` allowed) against `base`.
///
/// Always returns an absolute path when `base` is absolute.
pub fn expand_path(raw: &str, base: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(raw.trim());
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(
            expand_path("/srv/cv", Path::new("/work")),
            PathBuf::from("/srv/cv")
        );
    }

    #[test]
    fn test_expand_relative_to_base() {
        assert_eq!(
            expand_path(" drafts/cv ", Path::new("/work")),
            PathBuf::from("/work/drafts/cv")
        );
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_path("~/cv", Path::new("/work"));
        assert!(expanded.ends_with("cv"));
        assert!(expanded.is_absolute());
    }
}
