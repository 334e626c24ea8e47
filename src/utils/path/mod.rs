//! Path and URL utilities.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `expand_path`)
//! - [`route`]: URL to file mapping inside a source tree (`resolve_in_tree`)

pub mod fs;
pub mod route;

pub use fs::{expand_path, normalize_path};
pub use route::{relative_display, resolve_in_tree};
