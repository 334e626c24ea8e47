//! PDF rendering and ATS text extraction on demand.
//!
//! # Module Structure
//!
//! ```text
//! render/
//! ├── browser    # headless browser → resume.pdf
//! ├── extract    # pdftotext -bbox → resume.txt
//! ├── layout     # positioned words → reading-order text
//! └── error      # RenderError, AtsError
//! ```
//!
//! [`Renderer`] serializes generation per document: concurrent requests for
//! the same document wait for the in-flight work and then find a fresh
//! artifact instead of spawning a second process.

mod browser;
mod error;
mod extract;
mod layout;

pub use browser::{RenderOptions, render_pdf};
pub use error::{AtsError, RenderError};
pub use extract::{ExtractOptions, Extraction, extract_text};
pub use layout::AtsReport;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::PreviewConfig;
use crate::core::{DocumentId, DocumentRef};
use crate::freshness::{needs_regeneration, text_is_fresh};
use crate::logger::{status_error, status_success, status_warning};

/// Single-flight coordinator for render and extraction.
pub struct Renderer {
    locks: DashMap<DocumentId, Arc<Mutex<()>>>,
    render: RenderOptions,
    extract: ExtractOptions,
}

impl Renderer {
    pub fn new(render: RenderOptions, extract: ExtractOptions) -> Self {
        Self {
            locks: DashMap::new(),
            render,
            extract,
        }
    }

    /// Build from configuration; the browser profile lives in `cache_dir`.
    pub fn from_config(config: &PreviewConfig, cache_dir: &Path) -> Self {
        Self::new(
            RenderOptions {
                browser: config.render.browser.clone(),
                timeout: config.render_timeout(),
                profile_dir: cache_dir.join("browser"),
            },
            ExtractOptions {
                command: config.extract.command.clone(),
                timeout: config.extract_timeout(),
            },
        )
    }

    fn lock_for(&self, id: &DocumentId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id.clone()).or_default().value())
    }

    /// Contents of an up-to-date PDF of `document`, rendering when stale.
    ///
    /// The file is read before the document lock is released; a concurrent
    /// render deletes it first.
    pub async fn pdf(&self, document: &DocumentRef) -> Result<Vec<u8>, RenderError> {
        let lock = self.lock_for(&document.id);
        let _guard = lock.lock().await;
        let path = self.ensure_pdf_locked(document).await?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// ATS view of `document`: fresh PDF, then its text layer.
    ///
    /// The text is taken from `resume.txt` when it is not older than the
    /// PDF; otherwise it is extracted again.
    pub async fn ats(&self, document: &DocumentRef) -> Result<AtsReport, AtsError> {
        let lock = self.lock_for(&document.id);
        let _guard = lock.lock().await;

        self.ensure_pdf_locked(document).await?;

        if text_is_fresh(&document.tree) {
            match tokio::fs::read_to_string(document.tree.text_path()).await {
                Ok(text) => {
                    crate::debug!("extract"; "{} text is fresh", document.id);
                    return Ok(self.report(document, text));
                }
                Err(e) => crate::debug!("extract"; "cached text unreadable: {}", e),
            }
        }

        let start = Instant::now();
        match extract_text(&document.tree, &self.extract).await {
            Extraction::Ok(text) => {
                crate::debug!("extract"; "{} extracted in {}ms", document.id, start.elapsed().as_millis());
                Ok(self.report(document, text))
            }
            Extraction::Failed(message) => {
                status_error(&format!("extraction failed: {}", document.id), &message);
                Err(AtsError::Extract(message))
            }
        }
    }

    async fn ensure_pdf_locked(&self, document: &DocumentRef) -> Result<PathBuf, RenderError> {
        let tree = &document.tree;
        if !needs_regeneration(tree)? {
            crate::debug!("render"; "{} is fresh", document.id);
            return Ok(tree.pdf_path());
        }

        let start = Instant::now();
        match render_pdf(tree, &self.render).await {
            Ok(pdf) => {
                status_success(&format!(
                    "rendered {} in {}ms",
                    document.id,
                    start.elapsed().as_millis()
                ));
                Ok(pdf)
            }
            Err(e) => {
                status_error(&format!("render failed: {}", document.id), &e.to_string());
                Err(e)
            }
        }
    }

    fn report(&self, document: &DocumentRef, text: String) -> AtsReport {
        let report = AtsReport::from_text(text);
        if report.private_use_glyphs > 0 {
            status_warning(&format!(
                "{}: {} icon glyphs in the text layer (ATS parsers may mangle them)",
                document.id, report.private_use_glyphs
            ));
        }
        report
    }
}
