//! Preview server: HTTP routes on tiny_http, live reload on the event port.

mod content;
mod lifecycle;
mod response;

use crate::{
    actor::{
        fs::{FsActor, WatchHandle},
        sse::{IdleShutdown, SubscriberRegistry},
    },
    cli::ServeArgs,
    config::{PreviewConfig, StateStore},
    core::{DocumentRef, ExitMode, ShutdownHandle},
    debug,
    embed::serve::PREVIEW_JS_PATH,
    log,
    reload::server::{EVENTS_PATH, bind_events, serve_events},
    render::Renderer,
    utils::{mime::types::PDF, path::resolve_in_tree},
    workspace::{AppContext, SwitchError, Workspace},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    io::Read,
    net::TcpListener as StdTcpListener,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use tiny_http::{Method, Request, Server};
use tokio::runtime::Handle;

/// Raw artifacts framed by the view pages.
const PDF_VIEW_SRC: &str = "/pdf?raw=1";
const ATS_VIEW_SRC: &str = "/ats?raw=1";

/// Upper bound for JSON request bodies.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Request handler threads; a slow render must not block other routes.
const REQUEST_THREADS: usize = 4;

/// Shared state of the request handlers.
struct App {
    ctx: Arc<AppContext>,
    runtime: Handle,
    shutdown: ShutdownHandle,
    events_port: u16,
}

/// Run the preview server until shutdown is requested.
///
/// Returns the exit directive for the supervising process.
pub fn serve(config: &PreviewConfig, args: &ServeArgs, shutdown: &ShutdownHandle) -> Result<ExitMode> {
    let workspace = Workspace::new(config.root.clone());
    let state = StateStore::load(workspace.state_path());
    let active = workspace
        .initial_document(&state.snapshot(), args.document.as_deref())
        .with_context(|| {
            format!(
                "No documents found in {} or {}",
                workspace.resumes_dir().display(),
                workspace.templates_dir().display()
            )
        })?;

    let runtime = lifecycle::build_runtime()?;

    let (server, addr) = lifecycle::bind_with_retry(config.serve.port)?;
    let server = Arc::new(server);
    shutdown.register_server(Arc::clone(&server));

    let (events, events_port) = bind_events(config.serve.events_port)?;

    let ctx = runtime.block_on(start_services(
        config,
        workspace,
        state,
        active,
        shutdown.clone(),
        events,
    ));

    log!("serve"; "http://{}", addr);
    log!("serve"; "previewing {}", ctx.active().id);
    debug!("events"; "http://localhost:{}{}", events_port, EVENTS_PATH);

    let app = App {
        ctx: Arc::clone(&ctx),
        runtime: runtime.handle().clone(),
        shutdown: shutdown.clone(),
        events_port,
    };
    run_request_loop(&server, &app);

    runtime.block_on(async {
        debug!("events"; "closing {} subscribers", ctx.registry().len());
        ctx.registry().close_all();
        ctx.watcher().shutdown().await;
    });
    runtime.shutdown_timeout(Duration::from_secs(2));

    let mode = shutdown.mode();
    debug!("serve"; "stopped with exit code {}", mode.code());
    Ok(mode)
}

/// Build the registry, watcher and context, then start the event stream.
///
/// Must run inside the runtime: timers and tasks are spawned on it.
async fn start_services(
    config: &PreviewConfig,
    workspace: Workspace,
    state: StateStore,
    active: DocumentRef,
    shutdown: ShutdownHandle,
    events: StdTcpListener,
) -> Arc<AppContext> {
    let lifecycle = &config.lifecycle;

    let idle = IdleShutdown::new(lifecycle.idle_grace(), move || {
        shutdown.request(ExitMode::Stop);
    });
    let registry = SubscriberRegistry::new(lifecycle.keepalive(), Some(idle));

    let watcher = if config.serve.watch {
        FsActor::spawn(Arc::clone(&registry), lifecycle.debounce())
    } else {
        debug!("watch"; "disabled");
        WatchHandle::disabled()
    };
    if watcher.is_enabled() && !watcher.watch(active.clone()).await {
        log!("watch"; "live reload paused for {}", active.id);
    }

    let renderer = Renderer::from_config(config, &workspace.cache_dir());
    let ctx = Arc::new(AppContext::new(
        workspace, state, active, watcher, registry, renderer,
    ));

    tokio::spawn(serve_events(events, Arc::clone(&ctx)));
    ctx
}

fn run_request_loop(server: &Server, app: &App) {
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("vitae-http-{i}"))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            log!("serve"; "failed to create thread pool: {}", e);
            app.shutdown.request(ExitMode::Error);
            return;
        }
    };

    // The scope returns once the server is unblocked and in-flight requests
    // have been answered, so the runtime is still alive for all of them.
    pool.in_place_scope(|scope| {
        for request in server.incoming_requests() {
            scope.spawn(move |_| {
                // The panic hook has already requested an error shutdown.
                match panic::catch_unwind(AssertUnwindSafe(|| handle_request(request, app))) {
                    Ok(Err(e)) => log!("serve"; "request error: {e:#}"),
                    Ok(Ok(())) | Err(_) => {}
                }
            });
        }
    });
}

// ============================================================================
// Routing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    PreviewJs,
    Index,
    Pdf,
    Ats,
    AtsJson,
    Documents,
    Switch,
    Shutdown,
    File,
    MethodNotAllowed,
}

fn route(method: &Method, url: &str) -> Route {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let read = matches!(method, Method::Get | Method::Head);
    let post = *method == Method::Post;

    match path {
        PREVIEW_JS_PATH if read => Route::PreviewJs,
        "/" | "/index.html" if read => Route::Index,
        "/pdf" if read => Route::Pdf,
        "/ats" if read => Route::Ats,
        "/api/ats" if read => Route::AtsJson,
        "/api/documents" if read => Route::Documents,
        "/api/switch" if post => Route::Switch,
        "/api/shutdown" if post => Route::Shutdown,
        _ if read => Route::File,
        _ => Route::MethodNotAllowed,
    }
}

/// Handle a single HTTP request
fn handle_request(mut request: Request, app: &App) -> Result<()> {
    // Early exit if shutdown requested
    if app.shutdown.is_shutdown() {
        return response::respond_unavailable(request);
    }

    let url = request.url().to_string();
    debug!("serve"; "{} {}", request.method(), url);

    let ctx = &app.ctx;
    let active = ctx.active();

    match route(request.method(), &url) {
        Route::PreviewJs => response::respond_preview_js(request, app.events_port),
        Route::Index => {
            if active.tree.has_primary() {
                response::respond_file(request, &active.tree.primary())
            } else {
                let message = format!("{} has no index.html", active.id);
                response::respond_error(request, 404, &message)
            }
        }
        Route::Pdf if wants_view(&request, &url) => {
            response::respond_view(request, format!("{} - PDF", active.name()), PDF_VIEW_SRC)
        }
        Route::Ats if wants_view(&request, &url) => {
            response::respond_view(request, format!("{} - ATS", active.name()), ATS_VIEW_SRC)
        }
        Route::Pdf => match app.runtime.block_on(ctx.renderer().pdf(&active)) {
            Ok(pdf) => response::respond_artifact(request, PDF, pdf),
            Err(e) => response::respond_render_error(request, &e.to_string()),
        },
        Route::Ats => match app.runtime.block_on(ctx.renderer().ats(&active)) {
            Ok(report) => response::respond_text(request, report.text),
            Err(e) => response::respond_error(request, 500, &e.to_string()),
        },
        Route::AtsJson => match app.runtime.block_on(ctx.renderer().ats(&active)) {
            Ok(report) => response::respond_json(request, 200, &report),
            Err(e) => response::respond_json_error(request, 500, &e.to_string()),
        },
        Route::Documents => response::respond_json(request, 200, &list_documents(ctx)),
        Route::Switch => {
            let body = read_body(&mut request)?;
            let Ok(SwitchRequest { name }) = serde_json::from_str(&body) else {
                return response::respond_json_error(request, 400, "expected {\"name\": \"<document>\"}");
            };
            match app.runtime.block_on(ctx.switch(&name)) {
                Ok(document) => response::respond_json(
                    request,
                    200,
                    &SwitchResponse {
                        current: document.id.key(),
                    },
                ),
                Err(e @ SwitchError::NotFound(_)) => {
                    response::respond_json_error(request, 404, &e.to_string())
                }
            }
        }
        Route::Shutdown => {
            let body = read_body(&mut request)?;
            let Some(mode) = parse_shutdown_mode(&body) else {
                return response::respond_json_error(
                    request,
                    400,
                    "mode must be one of \"stop\", \"fast\", \"restart\"",
                );
            };
            response::respond_json(request, 202, &serde_json::json!({ "exitCode": mode.code() }))?;
            log!("serve"; "shutdown requested by client");
            app.shutdown.request(mode);
            Ok(())
        }
        Route::File => match resolve_in_tree(active.tree.root(), &url) {
            Some(path) => response::respond_file(request, &path),
            None => response::respond_not_found(request),
        },
        Route::MethodNotAllowed => response::respond_method_not_allowed(request),
    }
}

/// Browser navigations to `/pdf` and `/ats` get the view page; `?raw` and
/// non-browser clients get the artifact itself.
fn wants_view(request: &Request, url: &str) -> bool {
    let raw = url
        .split_once('?')
        .is_some_and(|(_, query)| query.split('&').any(|p| p == "raw" || p.starts_with("raw=")));
    !raw && response::find_header(request, "accept").is_some_and(|accept| accept.contains("text/html"))
}

// ============================================================================
// JSON API
// ============================================================================

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct SwitchResponse {
    current: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShutdownRequest {
    mode: Option<String>,
}

#[derive(Debug, Serialize)]
struct DocumentEntry {
    key: String,
    name: String,
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct DocumentList {
    current: String,
    documents: Vec<DocumentEntry>,
}

fn list_documents(ctx: &AppContext) -> DocumentList {
    let documents = ctx
        .visible_documents()
        .into_iter()
        .map(|document| DocumentEntry {
            key: document.id.key(),
            name: document.name().to_string(),
            kind: document.id.kind().label(),
        })
        .collect();

    DocumentList {
        current: ctx.active().id.key(),
        documents,
    }
}

/// An empty body or a missing `mode` means a clean stop.
fn parse_shutdown_mode(body: &str) -> Option<ExitMode> {
    if body.trim().is_empty() {
        return Some(ExitMode::Stop);
    }
    let request: ShutdownRequest = serde_json::from_str(body).ok()?;
    match request.mode {
        Some(label) => ExitMode::from_label(label.trim()),
        None => Some(ExitMode::Stop),
    }
}

fn read_body(request: &mut Request) -> Result<String> {
    let mut body = String::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .context("Failed to read request body")?;
    Ok(body)
}
