//! Document identity and source tree layout.

use std::fmt;
use std::path::{Path, PathBuf};

/// Primary document file inside a source tree.
pub const PRIMARY_FILE: &str = "index.html";
/// Single-level style sheet directory inside a source tree.
pub const STYLES_DIR: &str = "styles";
/// Binary render artifact.
pub const PDF_FILE: &str = "resume.pdf";
/// Extracted text artifact.
pub const TEXT_FILE: &str = "resume.txt";

/// Key prefix for template documents.
const TEMPLATE_PREFIX: &str = "templates/";
/// Key prefix for external documents.
const EXTERNAL_PREFIX: &str = "external:";

/// Identity of a previewable document.
///
/// The three storage kinds are explicit variants; only the boundary
/// string form (`key`) flattens them into one string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    /// `<root>/resumes/<name>/`
    Local { name: String },
    /// `<root>/templates/<name>/`
    Template { name: String },
    /// Any directory registered in the state file.
    External { name: String, path: PathBuf },
}

/// Storage kind label (for listings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Local,
    Template,
    External,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Template => "template",
            Self::External => "external",
        }
    }
}

impl DocumentId {
    /// Short display name (directory name).
    pub fn name(&self) -> &str {
        match self {
            Self::Local { name } | Self::Template { name } | Self::External { name, .. } => name,
        }
    }

    pub const fn kind(&self) -> DocumentKind {
        match self {
            Self::Local { .. } => DocumentKind::Local,
            Self::Template { .. } => DocumentKind::Template,
            Self::External { .. } => DocumentKind::External,
        }
    }

    /// Boundary string form used by the HTTP API and the state file.
    pub fn key(&self) -> String {
        match self {
            Self::Local { name } => name.clone(),
            Self::Template { name } => format!("{TEMPLATE_PREFIX}{name}"),
            Self::External { name, .. } => format!("{EXTERNAL_PREFIX}{name}"),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Files of one document under a single root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn primary(&self) -> PathBuf {
        self.root.join(PRIMARY_FILE)
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.root.join(STYLES_DIR)
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.root.join(PDF_FILE)
    }

    pub fn text_path(&self) -> PathBuf {
        self.root.join(TEXT_FILE)
    }

    pub fn has_primary(&self) -> bool {
        self.primary().is_file()
    }

    /// Style sheets directly inside `styles/` (not recursive).
    ///
    /// A missing or unreadable directory yields no sheets.
    pub fn style_sheets(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.styles_dir()) else {
            return Vec::new();
        };

        let mut sheets: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "css"))
            .collect();
        sheets.sort();
        sheets
    }

    /// Whether `path` is one of this tree's generated artifacts.
    pub fn is_derived(&self, path: &Path) -> bool {
        path.parent() == Some(self.root.as_path())
            && path
                .file_name()
                .is_some_and(|name| name == PDF_FILE || name == TEXT_FILE)
    }
}

/// A known document together with its resolved tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub tree: SourceTree,
}

impl DocumentRef {
    pub fn new(id: DocumentId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            tree: SourceTree::new(root),
        }
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }
}
