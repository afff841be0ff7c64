//! Plain-text extraction from note HTML
//!
//! Note bodies are rich-text HTML. Titles and list snippets are derived
//! from their text: block elements become line breaks, runs of whitespace
//! collapse to one space, and `script`/`style` contents are dropped.

use scraper::{ElementRef, Html, Node};

/// Longest derived title, in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// Longest derived snippet, in characters (before the ellipsis)
pub const MAX_SNIPPET_CHARS: usize = 200;

/// Title used when a note has no text
pub const UNTITLED: &str = "Untitled note";

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "template"];

/// Convert an HTML fragment to plain text, one line per block
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::new();
    walk(fragment.root_element(), &mut raw);

    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Title from the first non-empty line of the note
pub fn derive_title(html: &str) -> String {
    let text = html_to_text(html);
    match text.lines().next() {
        Some(line) => truncate_chars(line, MAX_TITLE_CHARS).0.trim_end().to_string(),
        None => UNTITLED.to_string(),
    }
}

/// Single-line preview of the note text
pub fn derive_snippet(html: &str) -> String {
    let text = collapse_whitespace(&html_to_text(html));
    let (head, truncated) = truncate_chars(&text, MAX_SNIPPET_CHARS);
    if truncated {
        format!("{}…", head.trim_end())
    } else {
        head.to_string()
    }
}
