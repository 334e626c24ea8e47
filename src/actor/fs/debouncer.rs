use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use crate::core::SourceTree;

/// Pure debouncer: a single deadline, reset by every accepted event.
///
/// Only the most recently changed file is kept; a burst of changes
/// collapses into one reload for the last file touched.
pub(super) struct Debouncer {
    window: Duration,
    pub(super) last_file: Option<PathBuf>,
    pub(super) deadline: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            last_file: None,
            deadline: None,
        }
    }

    /// Add a notify event for `tree`, ignoring noise:
    /// - access and metadata-only events
    /// - editor temp/backup files
    /// - the tree's own generated artifacts
    ///
    /// Returns whether the deadline was reset.
    pub(super) fn add_event(&mut self, event: &notify::Event, tree: &SourceTree, now: Instant) -> bool {
        use notify::EventKind;

        match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => {}
            // Metadata-only changes would loop on our own mtime checks
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return false,
            EventKind::Modify(_) => {}
            _ => return false,
        }

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        let mut accepted = false;
        for path in &event.paths {
            if is_temp_file(path) || tree.is_derived(path) {
                continue;
            }
            self.last_file = Some(path.clone());
            accepted = true;
        }

        if accepted {
            self.deadline = Some(now + self.window);
        }
        accepted
    }

    /// Take the last changed file once the window elapsed without events.
    pub(super) fn take_if_ready(&mut self, now: Instant) -> Option<PathBuf> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.last_file.take()
    }

    /// Drop anything pending (watch target changed).
    pub(super) fn reset(&mut self) {
        self.last_file = None;
        self.deadline = None;
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp" | "crdownload")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.starts_with('#')
}
