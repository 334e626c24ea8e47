//! Reload Module
//!
//! Pushes change notifications to preview clients over Server-Sent Events.
//!
//! # Modules
//!
//! - `message` - Change events and their SSE frame encoding
//! - `server` - Event stream listener on its own localhost port

pub mod message;
pub mod server;
