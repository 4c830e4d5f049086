//! Text Extractor
//!
//! Converts a markup content document into normalized plain text:
//!
//! - every block-level element (paragraph, heading, list item, line break, ...)
//!   ends its line with exactly one line break
//! - inline markup is dropped and only its text kept
//! - whitespace runs collapse to a single space and lines are trimmed
//! - blank lines never appear, so the output has no leading or trailing
//!   blank lines either
//!
//! Parsing is lenient (see [XmlReader::parse_html]): unclosed or misnested
//! tags, bogus comments and unknown entities are recovered from, never
//! reported, and never cut the document short. Input without any tag is
//! taken as plain text and keeps its line breaks, so feeding the output back
//! in returns it unchanged.

use crate::utils::{XmlElement, XmlNode, XmlReader};

/// Elements whose content is never part of the readable text
const SKIPPED_ELEMENTS: [&str; 6] = ["head", "script", "style", "template", "noscript", "title"];

const BLOCK_ELEMENTS: [&str; 35] = [
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "html",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

/// Table cells are separated by a space rather than a line break
const CELL_ELEMENTS: [&str; 2] = ["td", "th"];

const HEADING_ELEMENTS: [&str; 4] = ["h1", "h2", "h3", "title"];

/// Plain text of a content document together with its first heading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,

    /// The text of the first `h1`, else `h2`, else `h3`, else `<title>`
    pub heading: Option<String>,
}

/// Extracts the normalized plain text of a markup document
///
/// Extraction is idempotent on its own output as long as that output does
/// not itself look like markup. Text that was escaped markup in the source
/// (`&lt;b&gt;bold&lt;/b&gt;` extracts to `<b>bold</b>`) is parsed as tags
/// when extracted again and loses them. Escaped entities are not affected:
/// output without tags is plain text and is returned as is.
pub fn extract_text(markup: &str) -> String {
    extract(markup).text
}

/// Extracts the normalized plain text and the first heading of a markup document
pub fn extract(markup: &str) -> ExtractedText {
    if !looks_like_markup(markup) {
        return ExtractedText {
            text: Lines::default().push_raw_lines(markup).finish(),
            heading: None,
        };
    }

    let root = XmlReader::parse_html(markup);
    ExtractedText {
        text: reduce_element(Lines::default(), &root).finish(),
        heading: find_heading(&root),
    }
}

/// Whether any `<` in the content starts a tag, a comment or a declaration
fn looks_like_markup(content: &str) -> bool {
    content.match_indices('<').any(|(index, _)| {
        content[index + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
    })
}

fn find_heading(root: &XmlElement) -> Option<String> {
    HEADING_ELEMENTS.iter().find_map(|name| {
        root.find_elements_by_name(name)
            .map(XmlElement::text)
            .find(|text| !text.is_empty())
    })
}

fn reduce_node(lines: Lines, node: &XmlNode) -> Lines {
    match node {
        XmlNode::Text(text) => lines.push_text(text),
        XmlNode::Element(element) => reduce_element(lines, element),
    }
}

fn reduce_element(lines: Lines, element: &XmlElement) -> Lines {
    let name = element.name.to_ascii_lowercase();
    let name = name.as_str();

    if SKIPPED_ELEMENTS.contains(&name) {
        lines
    } else if name == "br" {
        lines.break_line()
    } else if BLOCK_ELEMENTS.contains(&name) {
        element
            .children
            .iter()
            .fold(lines.break_line(), reduce_node)
            .break_line()
    } else if CELL_ELEMENTS.contains(&name) {
        element
            .children
            .iter()
            .fold(lines.space(), reduce_node)
            .space()
    } else {
        element.children.iter().fold(lines, reduce_node)
    }
}

/// Accumulator of finished lines and the line being built
#[derive(Debug, Default)]
struct Lines {
    finished: Vec<String>,
    current: String,
    pending_space: bool,
}

impl Lines {
    /// Appends a text run, collapsing whitespace
    fn push_text(mut self, text: &str) -> Self {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = !self.current.is_empty();
            } else {
                if self.pending_space {
                    self.current.push(' ');
                    self.pending_space = false;
                }
                self.current.push(c);
            }
        }
        self
    }

    /// Appends plain text, keeping its line breaks
    fn push_raw_lines(self, text: &str) -> Self {
        text.split('\n')
            .enumerate()
            .fold(self, |lines, (index, segment)| {
                let lines = if index > 0 { lines.break_line() } else { lines };
                lines.push_text(segment)
            })
    }

    /// Requests a separating space before the next character of this line
    fn space(mut self) -> Self {
        self.pending_space = !self.current.is_empty();
        self
    }

    /// Ends the current line; an empty line is never emitted
    fn break_line(mut self) -> Self {
        if !self.current.is_empty() {
            self.finished.push(std::mem::take(&mut self.current));
        }
        self.pending_space = false;
        self
    }

    fn finish(self) -> String {
        self.break_line().finished.join("\n")
    }
}
