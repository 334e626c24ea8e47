//! Text layer extraction (`resume.pdf` → `resume.txt`).
//!
//! Runs `pdftotext -bbox` and rebuilds the reading order with
//! [`layout`](super::layout). Never returns an error: every failure is
//! reported as [`Extraction::Failed`] so the caller can show it.

use std::time::Duration;

use anyhow::{Context, Result, bail};

use super::layout::{compose_document, parse_bbox};
use crate::core::SourceTree;
use crate::utils::exec::{Cmd, SILENT_FILTER};

/// How to run the extractor.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub command: String,
    pub timeout: Duration,
}

/// Outcome of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Ok(String),
    Failed(String),
}

/// Extract the text layer of `tree`'s PDF and write `resume.txt`.
pub async fn extract_text(tree: &SourceTree, options: &ExtractOptions) -> Extraction {
    match try_extract(tree, options).await {
        Ok(text) => Extraction::Ok(text),
        Err(e) => Extraction::Failed(format!("{e:#}")),
    }
}

async fn try_extract(tree: &SourceTree, options: &ExtractOptions) -> Result<String> {
    let pdf = tree.pdf_path();
    if !pdf.is_file() {
        bail!("`{}` not found", pdf.display());
    }

    let output = Cmd::new(&options.command)
        .arg("-bbox")
        .arg(&pdf)
        .arg("-")
        .timeout(options.timeout)
        .filter(&SILENT_FILTER)
        .run()
        .await?;

    let xml = String::from_utf8_lossy(&output.stdout);
    let pages = parse_bbox(&xml)?;
    let text = compose_document(&pages);

    tokio::fs::write(tree.text_path(), &text)
        .await
        .with_context(|| format!("failed to write `{}`", tree.text_path().display()))?;
    Ok(text)
}
