//! Served document processing.

use crate::embed::serve::script_tag;

/// Inject the preview script into HTML bodies.
pub fn maybe_inject_preview(body: Vec<u8>, content_type: &str) -> Vec<u8> {
    if content_type.starts_with("text/html") {
        inject_preview_script(&body)
    } else {
        body
    }
}

/// Inject the preview script before `</body>`
fn inject_preview_script(content: &[u8]) -> Vec<u8> {
    let script = script_tag();
    let script_bytes = script.as_bytes();

    const PATTERN: &[u8] = b"</body>";

    // Reverse search for </body> using byte windows
    if let Some(pos) = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        let mut result = Vec::with_capacity(content.len() + script_bytes.len());
        result.extend_from_slice(&content[..pos]);
        result.extend_from_slice(script_bytes);
        result.extend_from_slice(&content[pos..]);
        return result;
    }

    // No </body> found, append to end (browsers handle this gracefully)
    let mut result = Vec::with_capacity(content.len() + script_bytes.len());
    result.extend_from_slice(content);
    result.extend_from_slice(script_bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::mime::types::{CSS, HTML};

    #[test]
    fn test_injects_before_last_body() {
        let html = b"<html><body><p>cv</p><!-- </BODY> --></BODY></html>".to_vec();
        let out = String::from_utf8(maybe_inject_preview(html, HTML)).unwrap();
        let script = script_tag();
        assert!(out.ends_with(&format!("{script}</BODY></html>")));
        assert_eq!(out.matches(&script).count(), 1);
    }

    #[test]
    fn test_appends_without_body() {
        let out = maybe_inject_preview(b"<p>fragment</p>".to_vec(), HTML);
        assert!(String::from_utf8(out).unwrap().ends_with(&script_tag()));
    }

    #[test]
    fn test_non_html_untouched() {
        let css = b"body { color: red }".to_vec();
        assert_eq!(maybe_inject_preview(css.clone(), CSS), css);
    }
}
