//! FileSystem Actor
//!
//! Watches the active document's source tree and broadcasts a debounced
//! `reload` event to every subscriber.
//!
//! Architecture:
//! ```text
//! notify → (generation, Event) → Debouncer (pure timing) → ChangeEvent → SubscriberRegistry
//! ```
//!
//! State machine:
//! ```text
//! Uninitialized --Watch(tree)--> Watching(tree) --Watch(new)--> Watching(new)
//!                                      |
//!                                      +--Shutdown--> Uninitialized
//! ```
//!
//! Every watcher is tagged with a generation number. Events still queued
//! from a torn-down watcher carry an old generation and are discarded, so
//! a reload never names a file of the previous document.

use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

use super::messages::WatchMsg;
use super::sse::SubscriberRegistry;
use crate::core::DocumentRef;
use crate::reload::message::ChangeEvent;
use crate::utils::path::relative_display;

// Pure timing and filtering.
mod debouncer;


use debouncer::Debouncer;

type RawEvent = (u64, notify::Event);

/// The watcher currently installed.
struct ActiveWatch {
    generation: u64,
    document: DocumentRef,
    /// Must be kept alive; dropping it stops notifications.
    _watcher: RecommendedWatcher,
}

/// FileSystem Actor - watches one source tree at a time
pub struct FsActor {
    rx: mpsc::Receiver<WatchMsg>,
    raw_tx: mpsc::UnboundedSender<RawEvent>,
    raw_rx: mpsc::UnboundedReceiver<RawEvent>,
    registry: Arc<SubscriberRegistry>,
    debouncer: Debouncer,
    generation: u64,
    active: Option<ActiveWatch>,
}

impl FsActor {
    pub fn new(
        rx: mpsc::Receiver<WatchMsg>,
        registry: Arc<SubscriberRegistry>,
        debounce: Duration,
    ) -> Self {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        Self {
            rx,
            raw_tx,
            raw_rx,
            registry,
            debouncer: Debouncer::new(debounce),
            generation: 0,
            active: None,
        }
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(registry: Arc<SubscriberRegistry>, debounce: Duration) -> WatchHandle {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(Self::new(rx, registry, debounce).run());
        WatchHandle::new(tx)
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        loop {
            let deadline = self.debouncer.deadline;

            tokio::select! {
                biased;
                msg = self.rx.recv() => match msg {
                    Some(WatchMsg::Watch { document, ack }) => {
                        let _ = ack.send(self.start(document));
                    }
                    Some(WatchMsg::Shutdown) | None => {
                        crate::debug!("watch"; "shutting down");
                        break;
                    }
                },
                Some((generation, event)) = self.raw_rx.recv() => {
                    self.on_raw(generation, &event);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush();
                }
            }
        }
        self.stop();
    }

    /// Feed a raw notification to the debouncer.
    ///
    /// Events from a torn-down watcher carry an old generation and are
    /// dropped. Returns whether the event was accepted.
    fn on_raw(&mut self, generation: u64, event: &notify::Event) -> bool {
        match &self.active {
            Some(active) if active.generation == generation => {
                self.debouncer
                    .add_event(event, &active.document.tree, Instant::now())
            }
            _ => false,
        }
    }

    /// Install a watcher for `document`, replacing the current one.
    fn start(&mut self, document: DocumentRef) -> bool {
        self.stop();

        let tree = &document.tree;
        if !tree.root().is_dir() {
            crate::log!("watch"; "{} does not exist, not watching", tree.root().display());
            return false;
        }
        if !tree.has_primary() {
            crate::log!("watch"; "{} has no {}, not watching", document.name(), crate::core::PRIMARY_FILE);
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        let raw_tx = self.raw_tx.clone();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = raw_tx.send((generation, event));
                }
                Err(e) => crate::log!("watch"; "notify error: {}", e),
            }
        });
        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                crate::log!("watch"; "failed to create watcher: {}", e);
                return false;
            }
        };
        if let Err(e) = watcher.watch(tree.root(), RecursiveMode::Recursive) {
            crate::log!("watch"; "failed to watch {}: {}", tree.root().display(), e);
            return false;
        }

        crate::debug!("watch"; "watching {} (generation {})", tree.root().display(), generation);
        self.active = Some(ActiveWatch {
            generation,
            document,
            _watcher: watcher,
        });
        true
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            crate::debug!("watch"; "stopped watching {}", active.document.name());
        }
        self.debouncer.reset();
    }

    /// Broadcast the pending change, if its window elapsed.
    fn flush(&mut self) {
        let Some(file) = self.debouncer.take_if_ready(Instant::now()) else {
            return;
        };
        let Some(active) = &self.active else {
            return;
        };

        let relative = relative_display(active.document.tree.root(), &file);
        crate::log!("watch"; "{} changed", relative);
        self.registry
            .broadcast(&ChangeEvent::reload(relative, active.document.name()));
    }
}

/// Cloneable sender side of the FileSystem Actor.
///
/// A disabled handle (watching turned off) acknowledges nothing and
/// reports every watch request as not started.
#[derive(Clone)]
pub struct WatchHandle {
    tx: Option<mpsc::Sender<WatchMsg>>,
}

impl WatchHandle {
    pub fn new(tx: mpsc::Sender<WatchMsg>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Rebuild the watch set for `document` and wait until it is installed.
    pub async fn watch(&self, document: DocumentRef) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        let (ack, done) = oneshot::channel();
        if tx.send(WatchMsg::Watch { document, ack }).await.is_err() {
            return false;
        }
        done.await.unwrap_or(false)
    }

    pub async fn shutdown(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(WatchMsg::Shutdown).await;
        }
    }
}
