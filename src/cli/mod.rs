//! Command-line interface module.

mod args;
pub mod clean;
pub mod serve;
pub mod supervise;

pub use args::{Cli, Commands, ServeArgs};
