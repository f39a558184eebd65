//! Markdown rendering for post bodies
//!
//! Supports a deliberately small subset: `#`..`###` headings, `**strong**`,
//! `*emphasis*`, `[links](url)`, paragraphs and line breaks, `- ` lists and
//! `|pipe|tables|`. Code blocks, blockquotes, nested lists and escaping of
//! literal markdown characters are not supported.
//!
//! Post bodies are untrusted. Raw HTML in the source is escaped before the
//! passes run, and the assembled fragment goes through an allow-list
//! sanitizer before it is returned.

use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

lazy_static::lazy_static! {
    static ref HEADING_RE: Regex = Regex::new(r"(?m)^(#{1,3}) (.*)$").unwrap();
    static ref HEADING_LINE_RE: Regex = Regex::new(r"^<h[1-3]>.*</h[1-3]>$").unwrap();
    static ref TRIPLE_STAR_RE: Regex = Regex::new(r"\*\*\*(.*?)\*\*\*").unwrap();
    static ref STRONG_STAR_RE: Regex = Regex::new(r"\*\*(.*?)\*\*").unwrap();
    static ref STRONG_UNDERSCORE_RE: Regex = Regex::new(r"__(.*?)__").unwrap();
    static ref EM_STAR_RE: Regex = Regex::new(r"\*(.*?)\*").unwrap();
    static ref EM_UNDERSCORE_RE: Regex = Regex::new(r"_(.*?)_").unwrap();
    static ref LINK_RE: Regex = Regex::new(r"\[([^\]\n]+)\]\(([^)\n]+)\)").unwrap();
    static ref LINK_SLOT_RE: Regex = Regex::new("\u{E000}(\\d+)\u{E000}").unwrap();
    static ref BLANK_LINE_RE: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
}

/// Marks a link slot while the emphasis passes run, so URLs stay opaque
const LINK_SLOT: char = '\u{E000}';

/// Tags the renderer can produce; everything else is stripped
const ALLOWED_TAGS: [&str; 13] = [
    "h1", "h2", "h3", "p", "br", "strong", "em", "a", "ul", "li", "table", "tr", "td",
];

/// Markdown renderer for the restricted post-body dialect
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self
    }

    /// Render markdown to sanitized HTML. Empty input renders to `""`.
    pub fn render(&self, markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }

        let source = markdown.replace("\r\n", "\n").replace(LINK_SLOT, "");
        let html = assemble(&source);

        match sanitize(&html) {
            Some(clean) => clean,
            None => {
                tracing::warn!("Sanitizer returned empty output, rendering post as plain text");
                plain_text(&source)
            }
        }
    }

    /// Render without the sanitizer pass. Only for inspecting the pipeline.
    pub fn render_unsanitized(&self, markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }
        assemble(&markdown.replace("\r\n", "\n").replace(LINK_SLOT, ""))
    }
}

/// Run every markdown pass in order and return the unsanitized fragment
fn assemble(source: &str) -> String {
    let escaped = html_escape(source.trim_matches('\n'));

    let with_headings = HEADING_RE.replace_all(&escaped, |caps: &Captures| {
        let level = caps[1].len();
        format!("<h{level}>{}</h{level}>", caps[2].trim_end())
    });

    let inline = render_inline(&with_headings);

    render_blocks(&inline)
}

/// Strong, emphasis and link passes
fn render_inline(text: &str) -> String {
    let mut links: Vec<(String, String)> = Vec::new();
    let slotted = LINK_RE.replace_all(text, |caps: &Captures| {
        links.push((caps[1].to_string(), caps[2].trim().to_string()));
        format!("{LINK_SLOT}{}{LINK_SLOT}", links.len() - 1)
    });

    let emphasized = emphasize(&slotted);

    LINK_SLOT_RE
        .replace_all(&emphasized, |caps: &Captures| {
            let link = caps[1].parse::<usize>().ok().and_then(|i| links.get(i));
            match link {
                Some((label, url)) => format!(
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                    url,
                    emphasize(label)
                ),
                None => String::new(),
            }
        })
        .into_owned()
}

/// Strong before emphasis, so `***x***` nests as emphasis around strong
fn emphasize(text: &str) -> String {
    let text = TRIPLE_STAR_RE.replace_all(text, "<em><strong>$1</strong></em>");
    let text = STRONG_STAR_RE.replace_all(&text, "<strong>$1</strong>");
    let text = STRONG_UNDERSCORE_RE.replace_all(&text, "<strong>$1</strong>");
    let text = EM_STAR_RE.replace_all(&text, "<em>$1</em>");
    let text = EM_UNDERSCORE_RE.replace_all(&text, "<em>$1</em>");
    text.into_owned()
}

/// One line of an already inline-rendered block
enum Line<'a> {
    Heading(&'a str),
    Item(&'a str),
    Row(&'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if HEADING_LINE_RE.is_match(trimmed) {
        Line::Heading(trimmed)
    } else if let Some(item) = line.strip_prefix("- ") {
        Line::Item(item)
    } else if trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|') {
        Line::Row(trimmed)
    } else {
        Line::Text(line)
    }
}

/// Paragraphs, line breaks, lists and tables.
///
/// Blank lines separate blocks. Inside a block, consecutive `- ` lines form
/// one list, consecutive `|..|` lines one table, and remaining lines are
/// joined with `<br>` into a paragraph.
fn render_blocks(text: &str) -> String {
    let mut out = String::new();

    for block in BLANK_LINE_RE.split(text) {
        if block.trim().is_empty() {
            continue;
        }

        let mut paragraph: Vec<&str> = Vec::new();
        let mut items: Vec<&str> = Vec::new();
        let mut rows: Vec<&str> = Vec::new();

        for line in block.lines() {
            match classify(line) {
                Line::Item(item) => {
                    flush_paragraph(&mut out, &mut paragraph);
                    flush_table(&mut out, &mut rows);
                    items.push(item);
                }
                Line::Row(row) => {
                    flush_paragraph(&mut out, &mut paragraph);
                    flush_list(&mut out, &mut items);
                    rows.push(row);
                }
                Line::Heading(heading) => {
                    flush_paragraph(&mut out, &mut paragraph);
                    flush_list(&mut out, &mut items);
                    flush_table(&mut out, &mut rows);
                    out.push_str(heading);
                }
                Line::Text(text) => {
                    flush_list(&mut out, &mut items);
                    flush_table(&mut out, &mut rows);
                    paragraph.push(text);
                }
            }
        }

        flush_paragraph(&mut out, &mut paragraph);
        flush_list(&mut out, &mut items);
        flush_table(&mut out, &mut rows);
    }

    out
}

fn flush_paragraph(out: &mut String, lines: &mut Vec<&str>) {
    if lines.iter().all(|l| l.trim().is_empty()) {
        lines.clear();
        return;
    }
    out.push_str("<p>");
    out.push_str(&lines.join("<br>"));
    out.push_str("</p>");
    lines.clear();
}

fn flush_list(out: &mut String, items: &mut Vec<&str>) {
    if items.is_empty() {
        return;
    }
    out.push_str("<ul>");
    for item in items.iter() {
        out.push_str("<li>");
        out.push_str(item.trim());
        out.push_str("</li>");
    }
    out.push_str("</ul>");
    items.clear();
}

fn flush_table(out: &mut String, rows: &mut Vec<&str>) {
    if rows.is_empty() {
        return;
    }
    out.push_str("<table>");
    for row in rows.iter() {
        let inner = &row[1..row.len() - 1];
        // header separator rows (|---|:--:|) carry no content
        if inner.contains('-')
            && inner
                .chars()
                .all(|c| matches!(c, '-' | ':' | '|' | ' ' | '\t'))
        {
            continue;
        }
        out.push_str("<tr>");
        for cell in inner.split('|') {
            out.push_str("<td>");
            out.push_str(cell.trim());
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    rows.clear();
}

/// Allow-list sanitizer for rendered fragments.
///
/// Links keep `href` (http, https, mailto and relative URLs only) and
/// `target`; ammonia adds `rel="noopener noreferrer"` itself.
fn sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .tag_attributes(HashMap::from([("a", HashSet::from(["href", "target"]))]))
        .generic_attributes(HashSet::new())
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .link_rel(Some("noopener noreferrer"));
    builder
}

/// Sanitize a fragment; `None` when nothing survives
fn sanitize(html: &str) -> Option<String> {
    let clean = sanitizer().clean(html).to_string();
    if clean.trim().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Escaped plain-text rendering used when sanitization yields nothing
fn plain_text(source: &str) -> String {
    format!("<p>{}</p>", html_escape(source.trim()).replace('\n', "<br>"))
}

/// Simple HTML escaping
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
