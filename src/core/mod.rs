//! Core types - pure abstractions shared across the codebase.

mod document;
mod shutdown;

pub use document::{DocumentId, DocumentRef, PRIMARY_FILE, SourceTree};
#[cfg(test)]
pub use document::{PDF_FILE, TEXT_FILE};
pub use shutdown::{ExitMode, ShutdownHandle, install_panic_hook, setup_shutdown_handler};
