//! Event Stream Server for Live Reload
//!
//! Serves `GET /events` as `text/event-stream` on its own localhost port.
//! Each connection registers a [`ChannelSink`] with the subscriber registry;
//! the response body streams the queued frames until either side goes away.
//! Dropping the body (client disconnect or shutdown) unsubscribes it.

use std::convert::Infallible;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tower_http::cors::CorsLayer;

use crate::actor::sse::{ChannelSink, SubscriberId, SubscriberRegistry};
use crate::workspace::AppContext;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Path of the event stream endpoint
pub const EVENTS_PATH: &str = "/events";

// =============================================================================
// Listener
// =============================================================================

/// Bind the event stream port, retrying the next ports when in use.
///
/// Binding happens synchronously so the caller knows the final port before
/// the preview script is served.
pub fn bind_events(base_port: u16) -> Result<(StdTcpListener, u16)> {
    let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;
    if port != base_port {
        crate::log!("events"; "port {} in use, using {} instead", base_port, port);
    }
    Ok((listener, port))
}

/// Serve event stream connections until the runtime shuts down.
pub async fn serve_events(listener: StdTcpListener, ctx: Arc<AppContext>) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            crate::log!("events"; "failed to start listener: {}", e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, build_router(ctx)).await {
        crate::log!("events"; "server error: {}", e);
    }
}

/// Preview pages live on another port, so every response allows any origin.
fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(events_handler))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

// =============================================================================
// Stream
// =============================================================================

/// Registered subscriber feeding one response body.
struct Subscription {
    registry: Arc<SubscriberRegistry>,
    id: SubscriberId,
    frames: UnboundedReceiver<String>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.id);
    }
}

async fn events_handler(State(ctx): State<Arc<AppContext>>) -> Response {
    let (sink, frames) = ChannelSink::new();
    let registry = Arc::clone(ctx.registry());
    let Ok(id) = registry.subscribe(sink, ctx.active().name()) else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let subscription = Subscription {
        registry,
        id,
        frames,
    };
    // Ends once the registry drops the sink (shutdown)
    let frames = stream::unfold(subscription, |mut subscription| async move {
        let frame = subscription.frames.recv().await?;
        Some((Ok::<_, Infallible>(frame), subscription))
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

// =============================================================================
// Helpers
// =============================================================================

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(StdTcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match StdTcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind event stream server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests;
