use std::{convert::Infallible, str::FromStr};

use crate::utils::count_words;

/// Media types whose content is extracted as markup
pub(crate) const MARKUP_MEDIA_TYPES: [&str; 5] = [
    "application/xhtml+xml",
    "text/html",
    "application/x-dtbook+xml",
    "text/x-oeb1-document",
    "image/svg+xml",
];

/// Publication metadata read from the package document
///
/// Every field is optional: a package without a given Dublin Core element
/// simply leaves the field empty, it is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// The first `dc:title` of the publication
    pub title: Option<String>,

    /// All `dc:creator` values, in package order
    pub authors: Vec<String>,

    /// The first `dc:language` code
    pub language: Option<String>,

    /// The identifier referenced by the package `unique-identifier`,
    /// or the first `dc:identifier` when no such reference exists
    pub identifier: Option<String>,

    pub publisher: Option<String>,

    /// The first `dc:date`, kept verbatim
    pub date: Option<String>,

    pub description: Option<String>,

    /// All `dc:subject` values, in package order
    pub subjects: Vec<String>,

    /// The `dcterms:modified` timestamp (EPUB 3)
    pub modified: Option<String>,
}

/// One entry of the reading order
///
/// A spine entry always produces exactly one chapter, whatever its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineEntry {
    /// The manifest id referenced by the `itemref`
    pub id: String,

    /// The container path of the referenced resource
    ///
    /// `None` when the manifest has no item with this id, or when its href
    /// cannot be resolved inside the container.
    pub path: Option<String>,

    /// The declared media type, empty when the manifest omits it
    pub media_type: String,

    /// Whether the entry belongs to the linear reading order
    ///
    /// Non-linear entries are still turned into chapters.
    pub linear: bool,
}

impl SpineEntry {
    /// Whether the declared media type is a recognized text/markup type
    pub fn is_markup(&self) -> bool {
        MARKUP_MEDIA_TYPES.contains(&self.media_type.as_str())
    }
}

/// Location of the navigation document declared by the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavReference {
    /// An EPUB 3 XHTML navigation document
    Navigation(String),

    /// A legacy EPUB 2 NCX table of contents
    Ncx(String),
}

impl NavReference {
    /// The container path of the navigation document
    pub fn path(&self) -> &str {
        match self {
            NavReference::Navigation(path) | NavReference::Ncx(path) => path,
        }
    }
}

/// Represents a navigation point in the table of contents
///
/// Navigation points form a tree: a chapter link may have sub-section
/// links as children.
#[derive(Debug, Clone, Eq)]
pub struct NavPoint {
    /// The display label/title of this navigation point
    pub label: String,

    /// The container path this navigation point references, fragment removed
    ///
    /// Can be `None` for navigation points without a link, or whose link
    /// cannot be resolved inside the container.
    pub content: Option<String>,

    /// Child navigation points (sub-sections)
    pub children: Vec<NavPoint>,

    /// The `playOrder` of an NCX navigation point
    pub play_order: Option<usize>,
}

impl Ord for NavPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.play_order.cmp(&other.play_order)
    }
}

impl PartialOrd for NavPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NavPoint {
    fn eq(&self, other: &Self) -> bool {
        self.play_order == other.play_order
    }
}

/// One spine entry's plain text together with its title and position
///
/// Chapters are immutable once built. The word count is computed from the
/// text at construction time and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    index: usize,
    title: String,
    source_id: String,
    path: Option<String>,
    media_type: String,
    text: String,
    word_count: usize,
}

impl Chapter {
    pub(crate) fn new(index: usize, title: String, entry: &SpineEntry, text: String) -> Self {
        Self {
            index,
            title,
            source_id: entry.id.clone(),
            path: entry.path.clone(),
            media_type: entry.media_type.clone(),
            word_count: count_words(&text),
            text,
        }
    }

    /// 1-based position in the reading order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The manifest id this chapter was built from
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The container path of the content document
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Normalized plain text of the chapter, possibly empty
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// The listing row of this chapter
    pub fn summary(&self) -> ChapterSummary {
        ChapterSummary {
            index: self.index,
            title: self.title.clone(),
            word_count: self.word_count,
        }
    }
}

/// A chapter listing row: position, title and word count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    pub index: usize,
    pub title: String,
    pub word_count: usize,
}

/// Selects a chapter by position or by title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterSelector {
    /// 1-based position in the reading order
    Index(usize),

    /// Case-insensitive exact title; the first match in reading order wins
    Title(String),
}

impl From<usize> for ChapterSelector {
    fn from(value: usize) -> Self {
        ChapterSelector::Index(value)
    }
}

impl From<&str> for ChapterSelector {
    fn from(value: &str) -> Self {
        ChapterSelector::Title(value.to_string())
    }
}

impl From<String> for ChapterSelector {
    fn from(value: String) -> Self {
        ChapterSelector::Title(value)
    }
}

/// Parses user input: all-digit input selects by index, anything else by title
impl FromStr for ChapterSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = trimmed.parse::<usize>() {
                return Ok(ChapterSelector::Index(index));
            }
        }

        Ok(ChapterSelector::Title(s.to_string()))
    }
}

/// How a chapter is titled when the navigation document has no entry for it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TitleFallback {
    /// "Chapter N", where N is the chapter index
    #[default]
    Synthetic,

    /// The first `h1`, `h2` or `h3` of the content document, then its
    /// `<title>`, then "Chapter N"
    Heading,
}

/// Options for building a [crate::document::Document]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOptions {
    pub title_fallback: TitleFallback,
}

/// Options for [crate::query::EpubQuery::search]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Match case exactly; off by default
    pub case_sensitive: bool,

    /// Treat the pattern as a regular expression instead of a literal
    pub use_regex: bool,

    /// Number of lines around each hit collected into [SearchHit::context]
    pub context_lines: usize,
}

/// One matching line within one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub chapter_index: usize,
    pub chapter_title: String,

    /// 1-based line number within the chapter text
    pub line_number: usize,

    /// The matching line
    pub line: String,

    /// The matching line with up to `context_lines` lines on each side,
    /// joined by `\n`
    pub context: String,
}

/// Word count statistics of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordStats {
    /// Sum of all per-chapter counts
    pub total_word_count: usize,
    pub per_chapter: Vec<ChapterSummary>,
}
