//! Freshness detection for derived artifacts (mtime based).

pub mod mtime;

pub use mtime::{needs_regeneration, text_is_fresh};
