//! Live Reload Event Protocol
//!
//! Defines the Server-Sent Events frames pushed to preview clients.
//!
//! # Event Types
//!
//! - `connected`: sent once to a new subscriber
//! - `reload`: a source file of the active document changed
//! - `switch`: the active document changed
//!
//! Each frame is `event: <name>\ndata: <json>\n\n`. The heartbeat is the
//! comment frame [`KEEPALIVE_FRAME`], which `EventSource` ignores.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Comment frame written periodically to keep idle connections open.
pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";

/// Payload of a change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventKind {
    /// Subscription established
    #[serde(rename_all = "camelCase")]
    Connected {
        message: String,
        document_name: String,
    },

    /// Source file changed (path relative to the document root)
    #[serde(rename_all = "camelCase")]
    Reload { file: String, document_name: String },

    /// Active document switched
    #[serde(rename_all = "camelCase")]
    Switch { document_name: String },
}

impl EventKind {
    /// SSE event name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Reload { .. } => "reload",
            Self::Switch { .. } => "switch",
        }
    }
}

/// Change event; consumed once, broadcast, discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl ChangeEvent {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: now_millis(),
        }
    }

    /// Create a connected event for a new subscriber
    pub fn connected(document_name: impl Into<String>) -> Self {
        Self::new(EventKind::Connected {
            message: "Connected to live reload".to_string(),
            document_name: document_name.into(),
        })
    }

    /// Create a reload event
    pub fn reload(file: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self::new(EventKind::Reload {
            file: file.into(),
            document_name: document_name.into(),
        })
    }

    /// Create a switch event
    pub fn switch(document_name: impl Into<String>) -> Self {
        Self::new(EventKind::Switch {
            document_name: document_name.into(),
        })
    }

    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Serialize the payload to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Encode as one SSE frame
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.to_json())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
