//! HTTP response handlers.

use super::content::maybe_inject_preview;
use crate::utils::mime::types::{JAVASCRIPT, JSON, PLAIN};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::Path};
use tiny_http::{Header, Method, Request, Response, StatusCode};

/// Respond with a file of the active tree, injecting the preview script into HTML.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    // PDF viewers fetch in ranges
    if let Some(range) = find_header(&request, "range") {
        return respond_range(request, content_type, body, &range);
    }

    let body = maybe_inject_preview(body, content_type);
    send_body(request, 200, content_type, body)
}

/// Respond with a freshly generated artifact; never cached by the browser.
pub fn respond_artifact(request: Request, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }
    if let Some(range) = find_header(&request, "range") {
        return respond_range(request, content_type, body, &range);
    }

    let response = Response::from_data(body)
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-store"))
        .with_header(make_header("Accept-Ranges", "bytes"));
    request.respond(response)?;
    Ok(())
}

/// Respond with the page framing a derived artifact.
///
/// The page loads the preview script, so the tab stays subscribed and the
/// frame is refetched on every reload.
pub fn respond_view(request: Request, title: String, src: &'static str) -> Result<()> {
    use crate::embed::serve::{VIEW_HTML, ViewVars};
    use crate::utils::mime::types::HTML;

    if is_head_request(&request) {
        return send_head(request, 200, HTML);
    }
    let page = VIEW_HTML.render(&ViewVars { title, src });
    let body = maybe_inject_preview(page.into_bytes(), HTML);
    send_body(request, 200, HTML, body)
}

/// Handle a Range request.
fn respond_range(
    request: Request,
    content_type: &'static str,
    body: Vec<u8>,
    range: &str,
) -> Result<()> {
    let file_size = body.len() as u64;
    if file_size == 0 {
        return send_body(request, 200, content_type, body);
    }

    // Parse "bytes=start-end" format
    let range = range.strip_prefix("bytes=").unwrap_or(range);
    let Some((start, end)) = parse_range(range, file_size) else {
        let response = Response::empty(StatusCode(416)).with_header(dynamic_header(
            "Content-Range",
            &format!("bytes */{file_size}"),
        )?);
        request.respond(response)?;
        return Ok(());
    };

    let slice = body[start as usize..=end as usize].to_vec();
    let content_range = format!("bytes {}-{}/{}", start, end, file_size);
    let response = Response::from_data(slice)
        .with_status_code(StatusCode(206))
        .with_header(make_header("Content-Type", content_type))
        .with_header(dynamic_header("Content-Range", &content_range)?)
        .with_header(make_header("Accept-Ranges", "bytes"))
        .with_header(make_header("Cache-Control", "no-store"));

    request.respond(response)?;
    Ok(())
}

/// Parse a Range value "start-end" into inclusive byte bounds.
///
/// `file_size` must be non-zero. Returns `None` when unsatisfiable.
fn parse_range(range: &str, file_size: u64) -> Option<(u64, u64)> {
    let last = file_size - 1;
    let (s, e) = range.trim().split_once('-')?;
    let (s, e) = (s.trim(), e.trim());

    let (start, end) = match (s.is_empty(), e.is_empty()) {
        // "0-499"
        (false, false) => (s.parse().ok()?, e.parse::<u64>().ok()?.min(last)),
        // "500-"
        (false, true) => (s.parse().ok()?, last),
        // "-500": last 500 bytes
        (true, false) => {
            let suffix: u64 = e.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            (file_size.saturating_sub(suffix), last)
        }
        (true, true) => return None,
    };

    (start <= end).then_some((start, end))
}

/// Value of the first header called `name` (case-insensitive).
pub fn find_header(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.to_string())
}

/// Respond with plain-text 404.
pub fn respond_not_found(request: Request) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 404, PLAIN);
    }
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 405 for routes that exist under another method.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, PLAIN, b"405 Method Not Allowed".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

/// Respond with a readable error message as plain text.
pub fn respond_error(request: Request, status: u16, message: &str) -> Result<()> {
    send_body(request, status, PLAIN, message.as_bytes().to_vec())
}

/// Respond with a render failure page (500).
///
/// The page carries the preview script, so it is replaced as soon as the
/// next change reloads the view.
pub fn respond_render_error(request: Request, message: &str) -> Result<()> {
    use crate::utils::mime::types::HTML;

    let msg = crate::utils::html::escape(message);
    let body = format!("<html><body><h1>PDF generation failed</h1><pre>{msg}</pre></body></html>");
    let body = maybe_inject_preview(body.into_bytes(), HTML);
    send_body(request, 500, HTML, body)
}

/// Respond with plain text.
pub fn respond_text(request: Request, body: String) -> Result<()> {
    let response = Response::from_string(body)
        .with_header(make_header("Content-Type", PLAIN))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

/// Respond with a JSON document.
pub fn respond_json<T: Serialize>(request: Request, status: u16, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value).context("Failed to encode response")?;
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", JSON))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

/// Respond with `{"error": message}`.
pub fn respond_json_error(request: Request, status: u16, message: &str) -> Result<()> {
    respond_json(request, status, &serde_json::json!({ "error": message }))
}

/// Respond with preview.js from memory.
pub fn respond_preview_js(request: Request, events_port: u16) -> Result<()> {
    use crate::embed::serve::{PREVIEW_JS, PreviewVars};

    if is_head_request(&request) {
        return send_head(request, 200, JAVASCRIPT);
    }
    let body = PREVIEW_JS.render(&PreviewVars { events_port });
    send_body(request, 200, JAVASCRIPT, body.into_bytes())
}

pub fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

/// Build a header from static ASCII parts.
fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid ASCII")
}

fn dynamic_header(key: &'static str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value.as_bytes())
        .map_err(|()| anyhow::anyhow!("invalid `{key}` header value: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range("0-499", 1000), Some((0, 499)));
        assert_eq!(parse_range("500-", 1000), Some((500, 999)));
        assert_eq!(parse_range("-200", 1000), Some((800, 999)));
        assert_eq!(parse_range("900-5000", 1000), Some((900, 999)));
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(parse_range("1000-", 1000), None);
        assert_eq!(parse_range("600-500", 1000), None);
        assert_eq!(parse_range("-0", 1000), None);
        assert_eq!(parse_range("-", 1000), None);
        assert_eq!(parse_range("abc", 1000), None);
    }

    #[test]
    fn test_suffix_larger_than_file() {
        assert_eq!(parse_range("-5000", 1000), Some((0, 999)));
    }
}
