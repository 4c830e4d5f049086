//! Epub query library
//!
//! A Rust library for read-only querying of EPUB eBook files.
//!
//! This library parses the package structure of an EPUB 2 or EPUB 3
//! archive (container, manifest, spine and navigation) into an ordered list
//! of chapters with clean plain text. Everything else is a read operation
//! over that model: listing chapters, searching their text by literal or
//! regular-expression pattern, computing word statistics and exporting the
//! text of the whole book or a single chapter.
//!
//! ## Features
//!
//! - Reading order and chapter titles from the spine and the navigation
//!   document (XHTML `nav` or NCX), with "Chapter N" fallbacks.
//! - Lenient markup extraction that recovers from broken content documents.
//! - A bad chapter never fails the whole book: it is kept with empty text.
//! - Literal and regex search with optional context lines.
//!
//! ## Quick Start
//!
//! ```rust, ignore
//! # use epub_query::{Document, DocumentOptions, SearchOptions};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = Document::open("path/to/epub/file.epub", &DocumentOptions::default())?;
//! let query = document.query();
//!
//! println!("Title: {:?}", query.metadata().title);
//! for chapter in query.list_chapters() {
//!     println!("{}. {} ({} words)", chapter.index, chapter.title, chapter.word_count);
//! }
//!
//! for hit in query.search("ch.pter", &SearchOptions { use_regex: true, ..Default::default() })? {
//!     println!("[{}:{}] {}", hit.chapter_index, hit.line_number, hit.line);
//! }
//!
//! let intro = query.extract_chapter_text("Introduction")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The library reports recovered problems (missing chapter files, unusable
//! navigation documents, dangling spine references) through the `log`
//! facade at `warn` level, and stage boundaries at `debug` level. Install
//! any `log` compatible logger to see them.

pub(crate) mod utils;

pub mod archive;
pub mod document;
pub mod error;
pub mod navigation;
pub mod package;
pub mod query;
pub mod text;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use document::Document;
pub use error::EpubError;
pub use query::EpubQuery;
pub use types::{
    Chapter, ChapterSelector, ChapterSummary, DocumentOptions, Metadata, SearchHit, SearchOptions,
    TitleFallback, WordStats,
};
pub use utils::DecodeBytes;
