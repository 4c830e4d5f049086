//! Query Engine
//!
//! Read-only operations over a built [Document]. Nothing here touches the
//! archive again; every result is computed from the in-memory chapter list.

use log::debug;
use regex::{Regex, RegexBuilder};

use crate::{
    document::Document,
    error::EpubError,
    types::{
        Chapter, ChapterSelector, ChapterSummary, Metadata, SearchHit, SearchOptions, WordStats,
    },
};

/// The query surface of a [Document]
///
/// ## Usage
///
/// ```rust, ignore
/// let document = Document::open("book.epub", &DocumentOptions::default())?;
/// let query = document.query();
///
/// for summary in query.list_chapters() {
///     println!("{:>3}  {}  ({} words)", summary.index, summary.title, summary.word_count);
/// }
///
/// let hits = query.search("whale", &SearchOptions::default())?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EpubQuery<'a> {
    document: &'a Document,
}

impl<'a> EpubQuery<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn metadata(&self) -> &'a Metadata {
        self.document.metadata()
    }

    /// Index, title and word count of every chapter, in reading order
    pub fn list_chapters(&self) -> Vec<ChapterSummary> {
        self.document
            .chapters()
            .iter()
            .map(Chapter::summary)
            .collect()
    }

    /// Looks up one chapter
    ///
    /// Accepts a 1-based index, a title, or anything converting into a
    /// [ChapterSelector]. Titles match case-insensitively and exactly; when
    /// several chapters share a title the first one in reading order wins.
    ///
    /// # Return
    /// - `Err(EpubError::ChapterIndexOutOfRange)`: the index is not in `[1, N]`
    /// - `Err(EpubError::ChapterNotFound)`: no chapter has the requested title
    pub fn get_chapter(&self, selector: impl Into<ChapterSelector>) -> Result<&'a Chapter, EpubError> {
        let chapters = self.document.chapters();

        match selector.into() {
            ChapterSelector::Index(index) => index
                .checked_sub(1)
                .and_then(|position| chapters.get(position))
                .ok_or(EpubError::ChapterIndexOutOfRange {
                    index,
                    count: chapters.len(),
                }),

            ChapterSelector::Title(title) => {
                let wanted = title.to_lowercase();
                chapters
                    .iter()
                    .find(|chapter| chapter.title().to_lowercase() == wanted)
                    .ok_or(EpubError::ChapterNotFound { title })
            }
        }
    }

    /// Finds the lines matching `pattern`, chapter by chapter in reading order
    ///
    /// A literal pattern is matched as a substring and is never invalid; an
    /// empty literal matches every line. With `use_regex` the pattern is
    /// compiled first, and a compile failure is the only possible error.
    pub fn search(&self, pattern: &str, options: &SearchOptions) -> Result<Vec<SearchHit>, EpubError> {
        let matcher = Matcher::new(pattern, options)?;

        let mut hits = Vec::new();
        for chapter in self.document.chapters() {
            let lines = chapter.text().lines().collect::<Vec<_>>();

            for (position, line) in lines.iter().enumerate() {
                if !matcher.is_match(line) {
                    continue;
                }

                let start = position.saturating_sub(options.context_lines);
                let end = (position + options.context_lines + 1).min(lines.len());

                hits.push(SearchHit {
                    chapter_index: chapter.index(),
                    chapter_title: chapter.title().to_string(),
                    line_number: position + 1,
                    line: line.to_string(),
                    context: lines[start..end].join("\n"),
                });
            }
        }

        debug!("Search for \"{}\" found {} hits.", pattern, hits.len());
        Ok(hits)
    }

    /// Total and per-chapter word counts
    ///
    /// The total is the sum of the counts cached on each chapter.
    pub fn word_stats(&self) -> WordStats {
        let per_chapter = self.list_chapters();
        let total_word_count = per_chapter.iter().map(|summary| summary.word_count).sum();

        WordStats {
            total_word_count,
            per_chapter,
        }
    }

    /// The text of the whole book in reading order
    ///
    /// Chapters are separated by exactly one blank line; chapters without
    /// text are skipped so that separators never pile up. This differs from
    /// a plain `"\n\n"` join over every chapter, which would emit a run of
    /// blank lines for each empty chapter, so the output cannot be split
    /// back into chapters by position. Use [EpubQuery::extract_chapter_text]
    /// when the chapter boundaries matter.
    pub fn extract_full_text(&self) -> String {
        self.document
            .chapters()
            .iter()
            .map(Chapter::text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The text of a single chapter, selected like [EpubQuery::get_chapter]
    pub fn extract_chapter_text(&self, selector: impl Into<ChapterSelector>) -> Result<String, EpubError> {
        self.get_chapter(selector)
            .map(|chapter| chapter.text().to_string())
    }
}

/// A compiled search pattern
enum Matcher {
    Literal { needle: String, case_sensitive: bool },
    Pattern(Regex),
}

impl Matcher {
    fn new(pattern: &str, options: &SearchOptions) -> Result<Self, EpubError> {
        if options.use_regex {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(!options.case_sensitive)
                .build()?;
            return Ok(Matcher::Pattern(regex));
        }

        let needle = if options.case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };

        Ok(Matcher::Literal {
            needle,
            case_sensitive: options.case_sensitive,
        })
    }

    fn is_match(&self, line: &str) -> bool {
        match self {
            Matcher::Literal {
                needle,
                case_sensitive: true,
            } => line.contains(needle.as_str()),
            Matcher::Literal { needle, .. } => line.to_lowercase().contains(needle.as_str()),
            Matcher::Pattern(regex) => regex.is_match(line),
        }
    }
}
