//! Text layout reconstruction from positioned words.
//!
//! `pdftotext -bbox` reports every word with its bounding box in a
//! top-left coordinate space. Words are converted to PDF space (origin
//! bottom-left), grouped into lines and joined into plain text the way an
//! ATS parser reads the page.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

/// Vertical distance (pt) within which fragments share a line.
pub const LINE_TOLERANCE: f64 = 3.0;
/// Vertical gap (pt) between lines that starts a new paragraph.
pub const PARAGRAPH_GAP: f64 = 18.0;
/// Horizontal gap (pt) between fragments that counts as a space.
pub const WORD_GAP: f64 = 0.5;
/// Separator between pages.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// One word as reported by the extractor (top-left origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub width: f64,
    pub height: f64,
    pub words: Vec<Word>,
}

/// A word placed in PDF space.
#[derive(Debug, Clone)]
struct Fragment<'a> {
    x: f64,
    x_end: f64,
    y: f64,
    text: &'a str,
}

/// Summary of the extracted text layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsReport {
    pub text: String,
    pub pages: usize,
    /// Private-use code points, typically icon-font glyphs.
    pub private_use_glyphs: usize,
}

impl AtsReport {
    pub fn from_text(text: String) -> Self {
        let pages = text.matches(PAGE_BREAK).count() + 1;
        let private_use_glyphs = count_private_use(&text);
        Self {
            text,
            pages,
            private_use_glyphs,
        }
    }
}

pub fn count_private_use(text: &str) -> usize {
    text.chars()
        .filter(|c| {
            matches!(*c as u32, 0xE000..=0xF8FF | 0xF_0000..=0xF_FFFD | 0x10_0000..=0x10_FFFD)
        })
        .count()
}

// ============================================================================
// Composition
// ============================================================================

/// Join all pages with [`PAGE_BREAK`].
pub fn compose_document(pages: &[Page]) -> String {
    pages
        .iter()
        .map(compose_page)
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}

/// Reading-order text of a single page.
pub fn compose_page(page: &Page) -> String {
    let mut fragments: Vec<Fragment<'_>> = page
        .words
        .iter()
        .filter(|w| !w.text.trim().is_empty())
        .map(|w| Fragment {
            x: w.x_min,
            x_end: w.x_max,
            y: page.height - w.y_max,
            text: w.text.trim(),
        })
        .collect();

    // Top to bottom, then left to right
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let lines = group_lines(fragments);

    let mut out = String::new();
    let mut previous_y: Option<f64> = None;
    for (y, line) in &lines {
        if let Some(prev) = previous_y {
            out.push('\n');
            if prev - y > PARAGRAPH_GAP {
                out.push('\n');
            }
        }
        compose_line(line, &mut out);
        previous_y = Some(*y);
    }
    out
}

/// Sweep the sorted fragments into lines anchored at their first fragment.
fn group_lines(fragments: Vec<Fragment<'_>>) -> Vec<(f64, Vec<Fragment<'_>>)> {
    let mut lines: Vec<(f64, Vec<Fragment<'_>>)> = Vec::new();

    for fragment in fragments {
        match lines.last_mut() {
            Some((anchor, line)) if (*anchor - fragment.y).abs() <= LINE_TOLERANCE => {
                line.push(fragment);
            }
            _ => lines.push((fragment.y, vec![fragment])),
        }
    }

    for (_, line) in &mut lines {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

fn compose_line(line: &[Fragment<'_>], out: &mut String) {
    let mut previous_end: Option<f64> = None;
    for fragment in line {
        if let Some(end) = previous_end
            && fragment.x - end > WORD_GAP
        {
            out.push(' ');
        }
        out.push_str(fragment.text);
        previous_end = Some(fragment.x_end);
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse the XHTML produced by `pdftotext -bbox`.
pub fn parse_bbox(xml: &str) -> Result<Vec<Page>> {
    let mut reader = Reader::from_str(xml);
    let mut pages: Vec<Page> = Vec::new();
    let mut current_word: Option<Word> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => match elem.name().as_ref() {
                b"page" => pages.push(parse_page(&elem)?),
                b"word" => current_word = Some(parse_word(&elem)?),
                _ => {}
            },
            Ok(Event::Empty(elem)) if elem.name().as_ref() == b"page" => {
                pages.push(parse_page(&elem)?);
            }
            Ok(Event::Text(text)) => {
                if let Some(word) = current_word.as_mut() {
                    word.text.push_str(&text.decode()?);
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                if let Some(word) = current_word.as_mut() {
                    if let Some(ch) = reference.resolve_char_ref()? {
                        word.text.push(ch);
                    } else {
                        let name = reference.decode()?;
                        let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                            .ok_or_else(|| anyhow!("unknown entity `&{name};`"))?;
                        word.text.push_str(resolved);
                    }
                }
            }
            Ok(Event::End(elem)) if elem.name().as_ref() == b"word" => {
                let word = current_word.take().context("unbalanced </word>")?;
                let page = pages.last_mut().context("<word> outside of <page>")?;
                page.words.push(word);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => bail!(
                "extractor output parse error at position {}: {:?}",
                reader.error_position(),
                e
            ),
        }
    }

    if pages.is_empty() {
        bail!("extractor output contains no pages");
    }
    Ok(pages)
}

fn parse_page(elem: &BytesStart<'_>) -> Result<Page> {
    Ok(Page {
        width: number_attr(elem, b"width")?,
        height: number_attr(elem, b"height")?,
        words: Vec::new(),
    })
}

fn parse_word(elem: &BytesStart<'_>) -> Result<Word> {
    Ok(Word {
        x_min: number_attr(elem, b"xMin")?,
        y_min: number_attr(elem, b"yMin")?,
        x_max: number_attr(elem, b"xMax")?,
        y_max: number_attr(elem, b"yMax")?,
        text: String::new(),
    })
}

fn number_attr(elem: &BytesStart<'_>, key: &[u8]) -> Result<f64> {
    let name = String::from_utf8_lossy(key);
    for attr in elem.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            let value = std::str::from_utf8(&attr.value)?;
            return value
                .trim()
                .parse()
                .with_context(|| format!("invalid `{name}` value `{value}`"));
        }
    }
    bail!("missing `{name}` attribute")
}
