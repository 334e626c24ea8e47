//! Render and extraction error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::exec::ExecError;

/// Failure to produce `resume.pdf`.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The tree has no primary document; nothing was spawned.
    #[error("`{}` not found", .0.display())]
    MissingSource(PathBuf),

    #[error("no headless browser found (tried {0}); set [render] browser in vitae.toml")]
    BrowserNotFound(String),

    #[error("browser failed: {0}")]
    Browser(#[from] ExecError),

    /// Exit status zero, but no PDF was written.
    #[error("browser exited without writing `{}`{}", .path.display(), stderr_suffix(.stderr))]
    MissingOutput { path: PathBuf, stderr: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Failure to produce the ATS view.
#[derive(Debug, Error)]
pub enum AtsError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("text extraction failed: {0}")]
    Extract(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}
