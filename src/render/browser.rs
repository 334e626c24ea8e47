//! Headless browser invocation (`index.html` → `resume.pdf`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use super::RenderError;
use crate::core::SourceTree;
use crate::utils::exec::{Cmd, FilterRule};

/// Browsers searched on `PATH`, in order, when none is configured.
pub const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
];

/// Chromium logs internal diagnostics on stderr even when printing succeeds.
const BROWSER_FILTER: FilterRule = FilterRule::new(&["[", "DevTools listening", "Fontconfig"]);

/// Characters escaped in `file://` URLs.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How to run the browser.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Configured executable; `None` searches [`BROWSER_CANDIDATES`].
    pub browser: Option<String>,
    pub timeout: Duration,
    /// Browser profile directory (inside the runtime cache).
    pub profile_dir: PathBuf,
}

/// Render `tree`'s primary document to `resume.pdf`.
///
/// The previous PDF is deleted first, so success means a zero exit status
/// and a freshly written file.
pub async fn render_pdf(tree: &SourceTree, options: &RenderOptions) -> Result<PathBuf, RenderError> {
    if !tree.has_primary() {
        return Err(RenderError::MissingSource(tree.primary()));
    }
    let browser = locate_browser(options.browser.as_deref())?;

    let pdf = tree.pdf_path();
    match tokio::fs::remove_file(&pdf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let output = Cmd::new(&browser)
        .args(browser_args(tree, &options.profile_dir))
        .cwd(tree.root())
        .timeout(options.timeout)
        .filter(&BROWSER_FILTER)
        .run()
        .await?;

    if !pdf.is_file() {
        return Err(RenderError::MissingOutput {
            path: pdf,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(pdf)
}

/// Resolve the browser executable.
pub fn locate_browser(configured: Option<&str>) -> Result<PathBuf, RenderError> {
    if let Some(browser) = configured {
        return which::which(browser).map_err(|_| RenderError::BrowserNotFound(browser.to_string()));
    }

    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| RenderError::BrowserNotFound(BROWSER_CANDIDATES.join(", ")))
}

/// Command line printing `tree` to its PDF path.
pub fn browser_args(tree: &SourceTree, profile_dir: &Path) -> Vec<OsString> {
    let mut user_data = OsString::from("--user-data-dir=");
    user_data.push(profile_dir);
    let mut print_to = OsString::from("--print-to-pdf=");
    print_to.push(tree.pdf_path());

    vec![
        "--headless".into(),
        "--disable-gpu".into(),
        "--no-pdf-header-footer".into(),
        user_data,
        print_to,
        file_url(&tree.primary()).into(),
    ]
}

/// `file://` URL of an absolute path.
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = utf8_percent_encode(&raw, PATH_SET).to_string();
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}
