//! Event Stream Subscribers
//!
//! The registry owns every open event stream connection:
//! - Sending `connected` to each new subscriber
//! - Broadcasting change events to all subscribers
//! - Per-subscriber keepalive comments
//! - Arming the idle shutdown when the last subscriber leaves
//!
//! # Architecture
//!
//! ```text
//! FsActor / switch --[ChangeEvent]--> SubscriberRegistry --[frame]--> EventSink
//!                                            |
//!                                            +--[count == 0]--> IdleShutdown
//! ```
//!
//! Delivery is best-effort: a sink that fails is removed and never blocks
//! delivery to the others.

mod idle;
mod sink;

#[cfg(test)]
mod tests;

pub use idle::IdleShutdown;
pub use sink::{ChannelSink, EventSink, SinkClosed};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use crate::reload::message::{ChangeEvent, KEEPALIVE_FRAME};

/// Identifier handed out by [`SubscriberRegistry::subscribe`].
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    sink: Arc<dyn EventSink>,
    keepalive: JoinHandle<()>,
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.keepalive.abort();
    }
}

/// Set of open event stream subscriptions.
pub struct SubscriberRegistry {
    this: Weak<Self>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    keepalive: Duration,
    idle: Option<IdleShutdown>,
    runtime: Handle,
}

impl SubscriberRegistry {
    /// Create a registry. Must be called from within the tokio runtime.
    ///
    /// Without `idle`, an empty registry never stops the server.
    pub fn new(keepalive: Duration, idle: Option<IdleShutdown>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            keepalive,
            idle,
            runtime: Handle::current(),
        })
    }

    /// Register a subscriber and greet it with `connected`.
    ///
    /// Cancels a pending idle shutdown. Fails if the greeting cannot be
    /// written, in which case nothing is registered.
    pub fn subscribe(
        &self,
        sink: impl EventSink,
        active_name: &str,
    ) -> Result<SubscriberId, SinkClosed> {
        if let Some(idle) = &self.idle {
            idle.cancel();
        }

        let sink: Arc<dyn EventSink> = Arc::new(sink);
        if let Err(err) = sink.send(&ChangeEvent::connected(active_name).to_frame()) {
            crate::debug!("events"; "subscriber left before greeting");
            if self.is_empty() {
                self.arm_idle();
            }
            return Err(err);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let keepalive = self.spawn_keepalive(id, Arc::clone(&sink));

        let mut subscribers = self.subscribers.lock();
        subscribers.push(Subscriber {
            id,
            sink,
            keepalive,
        });
        crate::debug!("events"; "subscriber {} connected (total: {})", id, subscribers.len());
        Ok(id)
    }

    /// Remove a subscriber; arms the idle shutdown when none are left.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, empty) = {
            let mut subscribers = self.subscribers.lock();
            let before = subscribers.len();
            subscribers.retain(|s| s.id != id);
            (subscribers.len() != before, subscribers.is_empty())
        };

        if removed {
            crate::debug!("events"; "subscriber {} disconnected", id);
            if empty {
                self.arm_idle();
            }
        }
        removed
    }

    /// Send `event` to every subscriber, pruning the ones that fail.
    ///
    /// Returns the number of successful deliveries.
    pub fn broadcast(&self, event: &ChangeEvent) -> usize {
        let frame = event.to_frame();
        let mut delivered = 0;

        let (pruned, empty) = {
            let mut subscribers = self.subscribers.lock();
            let before = subscribers.len();
            subscribers.retain_mut(|subscriber| match subscriber.sink.send(&frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    crate::debug!("events"; "subscriber {} dropped: {}", subscriber.id, e);
                    false
                }
            });
            (before - subscribers.len(), subscribers.is_empty())
        };

        crate::debug!("events"; "{} delivered to {} subscribers", event.name(), delivered);
        if pruned > 0 && empty {
            self.arm_idle();
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Drop every subscriber and any pending idle countdown.
    pub fn close_all(&self) {
        if let Some(idle) = &self.idle {
            idle.cancel();
        }
        self.subscribers.lock().clear();
    }

    fn spawn_keepalive(&self, id: SubscriberId, sink: Arc<dyn EventSink>) -> JoinHandle<()> {
        let registry = self.this.clone();
        let period = self.keepalive;

        self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if sink.send(KEEPALIVE_FRAME).is_err() {
                    if let Some(registry) = registry.upgrade() {
                        registry.unsubscribe(id);
                    }
                    break;
                }
            }
        })
    }

    fn arm_idle(&self) {
        let Some(idle) = &self.idle else {
            return;
        };
        let registry = self.this.clone();
        idle.arm(move || registry.upgrade().is_some_and(|r| r.is_empty()));
    }
}
