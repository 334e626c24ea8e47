use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::reload::message::ChangeEvent;

const KEEPALIVE: Duration = Duration::from_secs(30);
const GRACE: Duration = Duration::from_secs(5);

/// Sink recording every frame; can be switched to failing.
#[derive(Clone, Default)]
struct RecordingSink {
    frames: Arc<Mutex<Vec<String>>>,
    broken: Arc<AtomicBool>,
}

impl RecordingSink {
    fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    fn events(&self, name: &str) -> usize {
        let prefix = format!("event: {name}\n");
        self.frames().iter().filter(|f| f.starts_with(&prefix)).count()
    }

    fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl EventSink for RecordingSink {
    fn send(&self, frame: &str) -> Result<(), SinkClosed> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(SinkClosed);
        }
        self.frames.lock().push(frame.to_string());
        Ok(())
    }
}

fn idle_counter() -> (IdleShutdown, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let idle = IdleShutdown::new(GRACE, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (idle, fired)
}

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_connected_only_to_new_subscriber() {
    let registry = SubscriberRegistry::new(KEEPALIVE, None);
    let first = RecordingSink::default();
    let second = RecordingSink::default();

    registry.subscribe(first.clone(), "alice").unwrap();
    registry.subscribe(second.clone(), "alice").unwrap();

    assert_eq!(first.events("connected"), 1);
    assert_eq!(second.events("connected"), 1);
    assert!(second.frames()[0].contains(r#""documentName":"alice""#));
    assert_eq!(registry.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_prunes_failing_sink() {
    let registry = SubscriberRegistry::new(KEEPALIVE, None);
    let sinks: Vec<RecordingSink> = (0..3).map(|_| RecordingSink::default()).collect();
    for sink in &sinks {
        registry.subscribe(sink.clone(), "alice").unwrap();
    }
    sinks[1].break_connection();

    let delivered = registry.broadcast(&ChangeEvent::reload("index.html", "alice"));

    assert_eq!(delivered, 2);
    assert_eq!(registry.len(), 2);
    assert_eq!(sinks[0].events("reload"), 1);
    assert_eq!(sinks[1].events("reload"), 0);
    assert_eq!(sinks[2].events("reload"), 1);

    // Pruned sink stays gone
    assert_eq!(registry.broadcast(&ChangeEvent::switch("bob")), 2);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_without_subscribers() {
    let registry = SubscriberRegistry::new(KEEPALIVE, None);
    assert_eq!(registry.broadcast(&ChangeEvent::switch("alice")), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_written_periodically() {
    let registry = SubscriberRegistry::new(KEEPALIVE, None);
    let sink = RecordingSink::default();
    registry.subscribe(sink.clone(), "alice").unwrap();

    tokio::time::sleep(KEEPALIVE - Duration::from_millis(10)).await;
    settle().await;
    assert!(!sink.frames().iter().any(|f| f == KEEPALIVE_FRAME));

    tokio::time::sleep(Duration::from_millis(20)).await;
    settle().await;
    assert_eq!(
        sink.frames().iter().filter(|f| *f == KEEPALIVE_FRAME).count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_failure_prunes() {
    let registry = SubscriberRegistry::new(KEEPALIVE, None);
    let sink = RecordingSink::default();
    registry.subscribe(sink.clone(), "alice").unwrap();
    sink.break_connection();

    tokio::time::sleep(KEEPALIVE + Duration::from_millis(10)).await;
    settle().await;
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_greeting_not_registered() {
    let registry = SubscriberRegistry::new(KEEPALIVE, None);
    let sink = RecordingSink::default();
    sink.break_connection();
    assert!(registry.subscribe(sink, "alice").is_err());
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_idle_fires_after_grace_not_before() {
    let (idle, fired) = idle_counter();
    let registry = SubscriberRegistry::new(KEEPALIVE, Some(idle));
    let id = registry.subscribe(RecordingSink::default(), "alice").unwrap();

    assert!(registry.unsubscribe(id));
    assert!(!registry.unsubscribe(id));

    tokio::time::sleep(GRACE - Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_within_grace_cancels_idle() {
    let (idle, fired) = idle_counter();
    let registry = SubscriberRegistry::new(KEEPALIVE, Some(idle));
    let id = registry.subscribe(RecordingSink::default(), "alice").unwrap();
    registry.unsubscribe(id);

    tokio::time::sleep(GRACE - Duration::from_millis(1)).await;
    registry.subscribe(RecordingSink::default(), "alice").unwrap();

    tokio::time::sleep(GRACE * 2).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_pruning_last_arms_idle() {
    let (idle, fired) = idle_counter();
    let registry = SubscriberRegistry::new(KEEPALIVE, Some(idle));
    let sink = RecordingSink::default();
    registry.subscribe(sink.clone(), "alice").unwrap();
    sink.break_connection();

    assert_eq!(registry.broadcast(&ChangeEvent::switch("bob")), 0);
    tokio::time::sleep(GRACE + Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_never_double_fires() {
    let (idle, fired) = idle_counter();

    idle.arm(|| true);
    tokio::time::sleep(GRACE / 2).await;
    idle.arm(|| true);
    assert!(idle.is_armed());

    tokio::time::sleep(GRACE * 3).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!idle.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_idle_skipped_when_busy_again() {
    let (idle, fired) = idle_counter();
    idle.arm(|| false);

    tokio::time::sleep(GRACE * 2).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_countdown() {
    let (idle, fired) = idle_counter();
    idle.arm(|| true);
    idle.cancel();
    assert!(!idle.is_armed());

    tokio::time::sleep(GRACE * 2).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_channel_sink_closed_after_receiver_drop() {
    let (sink, rx) = ChannelSink::new();
    assert!(sink.send("event: x\n\n").is_ok());
    drop(rx);
    assert!(sink.send("event: y\n\n").is_err());
}
