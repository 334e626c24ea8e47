//! Actor System for Live Reload
//!
//! Message-passing concurrency for watch mode:
//!
//! ```text
//! FsActor ----------> SubscriberRegistry --> browsers
//! (watch + debounce)  (broadcast, keepalive, idle shutdown)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `sse` - Event stream subscribers and idle shutdown

pub mod fs;
pub mod messages;
pub mod sse;
