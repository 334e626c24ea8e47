//! Shutdown coordination for serve mode.
//!
//! A single `ShutdownHandle` is shared by everything that can stop the
//! server: Ctrl+C, the idle supervisor, the `/api/shutdown` endpoint and the
//! panic hook. The first request decides the exit code.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tiny_http::Server;

/// Exit directive understood by the supervising process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    /// Clean stop; supervisor runs cleanup.
    Stop,
    /// Failure.
    Error,
    /// Fast stop without cleanup.
    Fast,
    /// Stop and let the supervisor spawn a fresh server.
    Restart,
}

impl ExitMode {
    pub const fn code(self) -> i32 {
        match self {
            Self::Stop => 0,
            Self::Error => 1,
            Self::Fast => 2,
            Self::Restart => 3,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Stop),
            1 => Some(Self::Error),
            2 => Some(Self::Fast),
            3 => Some(Self::Restart),
            _ => None,
        }
    }

    /// Parse the `mode` field of a shutdown request.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "stop" => Some(Self::Stop),
            "fast" => Some(Self::Fast),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }
}

struct Inner {
    mode: Mutex<Option<ExitMode>>,
    /// HTTP server to unblock once shutdown is requested
    server: OnceLock<Arc<Server>>,
}

/// Cloneable handle to request and observe shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<Inner>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                mode: Mutex::new(None),
                server: OnceLock::new(),
            }),
        }
    }

    /// Register the HTTP server so a request can unblock its accept loop.
    pub fn register_server(&self, server: Arc<Server>) {
        let _ = self.inner.server.set(server);
    }

    pub fn has_server(&self) -> bool {
        self.inner.server.get().is_some()
    }

    /// Request shutdown. Only the first request is honored.
    pub fn request(&self, mode: ExitMode) {
        {
            let mut current = self.inner.mode.lock();
            if current.is_some() {
                return;
            }
            *current = Some(mode);
        }

        crate::debug!("serve"; "shutdown requested ({})", mode.code());

        if let Some(server) = self.inner.server.get() {
            server.unblock();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.mode.lock().is_some()
    }

    /// Requested mode, or `Stop` if the server loop ended on its own.
    pub fn mode(&self) -> ExitMode {
        self.inner.mode.lock().unwrap_or(ExitMode::Stop)
    }
}

/// Install the Ctrl+C handler. Call once at program start.
///
/// Before a server is registered there is nothing to drain, so the
/// process exits immediately.
pub fn setup_shutdown_handler(handle: ShutdownHandle) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if handle.has_server() {
            crate::log!("serve"; "shutting down...");
            handle.request(ExitMode::Stop);
        } else {
            std::process::exit(ExitMode::Stop.code());
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Route panics anywhere in the process into a graceful error shutdown.
pub fn install_panic_hook(handle: ShutdownHandle) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        crate::log!("panic"; "{}", info);
        handle.request(ExitMode::Error);
    }));
}
