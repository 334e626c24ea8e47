use std::fs;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::*;
use crate::actor::fs::WatchHandle;
use crate::actor::sse::IdleShutdown;
use crate::config::StateStore;
use crate::reload::message::ChangeEvent;
use crate::render::{ExtractOptions, RenderOptions, Renderer};
use crate::workspace::Workspace;

const WAIT: Duration = Duration::from_secs(5);
const GRACE: Duration = Duration::from_millis(50);

const STREAM_REQUEST: &str =
    "GET /events HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:5277\r\n\r\n";

struct EventServer {
    _dir: TempDir,
    addr: SocketAddr,
    ctx: Arc<AppContext>,
    idle_fired: Arc<AtomicBool>,
}

/// Event server for a workspace with `alice` (active) and `bob`.
fn start_events() -> EventServer {
    let dir = TempDir::new().unwrap();
    for name in ["alice", "bob"] {
        let root = dir.path().join("resumes").join(name);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
    }

    let workspace = Workspace::new(dir.path());
    let state = StateStore::load(workspace.state_path());
    let active = workspace
        .initial_document(&state.snapshot(), Some("alice"))
        .unwrap();

    let idle_fired = Arc::new(AtomicBool::new(false));
    let fired = Arc::clone(&idle_fired);
    let idle = IdleShutdown::new(GRACE, move || fired.store(true, Ordering::SeqCst));
    let registry = SubscriberRegistry::new(Duration::from_secs(30), Some(idle));

    let renderer = Renderer::new(
        RenderOptions {
            browser: None,
            timeout: Duration::from_secs(1),
            profile_dir: workspace.cache_dir().join("browser"),
        },
        ExtractOptions {
            command: "pdftotext".into(),
            timeout: Duration::from_secs(1),
        },
    );
    let ctx = Arc::new(AppContext::new(
        workspace,
        state,
        active,
        WatchHandle::disabled(),
        registry,
        renderer,
    ));

    let (listener, port) = try_bind_port(0, 1).unwrap();
    listener.set_nonblocking(true).unwrap();
    tokio::spawn(serve_events(listener, Arc::clone(&ctx)));

    EventServer {
        _dir: dir,
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        ctx,
        idle_fired,
    }
}

async fn open(addr: SocketAddr, request: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Read into `seen` until it contains `needle`.
async fn read_until(stream: &mut TcpStream, seen: &mut String, needle: &str) {
    let result = tokio::time::timeout(WAIT, async {
        let mut buf = [0u8; 1024];
        while !seen.contains(needle) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed before {needle:?}: {seen}");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {needle:?}: {seen}");
}

/// Full response of a request that closes the connection.
async fn exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = open(addr, request).await;
    let mut response = String::new();
    tokio::time::timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

async fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}

#[tokio::test]
async fn test_stream_headers_and_greeting() {
    let server = start_events();
    let mut stream = open(server.addr, STREAM_REQUEST).await;

    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "event: connected\n").await;
    read_until(&mut stream, &mut seen, "\n\n").await;

    let lower = seen.to_ascii_lowercase();
    assert!(lower.starts_with("http/1.1 200"));
    assert!(lower.contains("content-type: text/event-stream"));
    assert!(lower.contains("cache-control: no-cache"));
    assert!(lower.contains("access-control-allow-origin: *"));
    assert!(seen.contains(r#""documentName":"alice""#));
    assert_eq!(server.ctx.registry().len(), 1);
}

#[tokio::test]
async fn test_broadcasts_reach_every_socket() {
    let server = start_events();

    let mut first = open(server.addr, STREAM_REQUEST).await;
    let mut first_seen = String::new();
    read_until(&mut first, &mut first_seen, "event: connected\n").await;

    let mut second = open(server.addr, STREAM_REQUEST).await;
    let mut second_seen = String::new();
    read_until(&mut second, &mut second_seen, "event: connected\n").await;
    assert_eq!(server.ctx.registry().len(), 2);

    let delivered = server
        .ctx
        .registry()
        .broadcast(&ChangeEvent::reload("styles/main.css", "alice"));
    assert_eq!(delivered, 2);
    read_until(&mut first, &mut first_seen, r#""file":"styles/main.css""#).await;
    read_until(&mut second, &mut second_seen, r#""file":"styles/main.css""#).await;

    // The second greeting went to the second socket only
    assert_eq!(first_seen.matches("event: connected\n").count(), 1);

    server.ctx.switch("bob").await.unwrap();
    read_until(&mut first, &mut first_seen, "event: switch\n").await;
    read_until(&mut first, &mut first_seen, r#""documentName":"bob""#).await;
}

#[tokio::test]
async fn test_disconnect_unsubscribes_and_arms_idle() {
    let server = start_events();

    let mut stream = open(server.addr, STREAM_REQUEST).await;
    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "event: connected\n").await;
    assert_eq!(server.ctx.registry().len(), 1);

    tokio::time::sleep(GRACE * 2).await;
    assert!(!server.idle_fired.load(Ordering::SeqCst));

    drop(stream);
    let registry = Arc::clone(server.ctx.registry());
    assert!(wait_for(|| registry.is_empty()).await);
    assert!(wait_for(|| server.idle_fired.load(Ordering::SeqCst)).await);
}

#[tokio::test]
async fn test_preflight_allowed() {
    let server = start_events();
    let response = exchange(
        server.addr,
        "OPTIONS /events HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:5277\r\n\
         Access-Control-Request-Method: GET\r\nConnection: close\r\n\r\n",
    )
    .await
    .to_ascii_lowercase();

    assert!(response.starts_with("http/1.1 200"));
    assert!(response.contains("access-control-allow-origin: *"));
    assert!(server.ctx.registry().is_empty());
}

#[tokio::test]
async fn test_other_paths_not_found() {
    let server = start_events();
    let response = exchange(
        server.addr,
        "GET /pdf HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(server.ctx.registry().is_empty());
}

#[test]
fn test_bind_retries_next_port() {
    let (first, port) = try_bind_port(0, 1).unwrap();
    assert_ne!(port, 0);

    let (_second, next) = try_bind_port(port, 3).unwrap();
    assert_ne!(next, port);
    drop(first);
}
