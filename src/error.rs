//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while opening,
//! parsing and querying an EPUB file. All errors are uniformly wrapped in the
//! `EpubError` enumeration for convenient error handling by the caller.
//!
//! ## Error Classes
//!
//! - Fatal input errors: [EpubError::NotAnArchive], [EpubError::CorruptArchive],
//!   [EpubError::MalformedPackage]. These abort the document build.
//! - Per-chapter errors: [EpubError::EntryNotFound], [EpubError::UnparsableMarkup].
//!   The document build recovers from these by degrading the chapter text to empty.
//! - Query errors: [EpubError::ChapterIndexOutOfRange], [EpubError::ChapterNotFound],
//!   [EpubError::InvalidPattern]. These are caused by bad caller input.

use thiserror::Error;

/// Types of errors that can occur during EPUB processing
#[derive(Debug, Error)]
pub enum EpubError {
    /// The byte stream is not a zip-format container
    #[error("Not an archive: {source}")]
    NotAnArchive { source: zip::result::ZipError },

    /// Corrupt archive error
    ///
    /// An entry of the container could not be decompressed or failed
    /// its integrity check.
    #[error("Corrupt archive: The \"{entry}\" entry is damaged ({reason}).")]
    CorruptArchive { entry: String, reason: String },

    /// Malformed package error
    ///
    /// The container pointer file, the package document, its manifest or
    /// its spine is missing or cannot be parsed.
    #[error("Malformed package: {reason}")]
    MalformedPackage { reason: String },

    /// The requested entry does not exist in the container
    #[error("Entry not found: Unable to find \"{entry}\" in the archive.")]
    EntryNotFound { entry: String },

    /// Markup decoding error
    ///
    /// The bytes of the entry cannot be decoded as text in any supported encoding.
    #[error("Unparsable markup: The \"{entry}\" entry cannot be decoded as text.")]
    UnparsableMarkup { entry: String },

    #[error("Chapter index out of range: {index} is not in [1, {count}].")]
    ChapterIndexOutOfRange { index: usize, count: usize },

    #[error("Chapter not found: No chapter is titled \"{title}\".")]
    ChapterNotFound { title: String },

    /// The search pattern is not a valid regular expression
    #[error("Invalid pattern: {source}")]
    InvalidPattern { source: regex::Error },

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<regex::Error> for EpubError {
    fn from(value: regex::Error) -> Self {
        EpubError::InvalidPattern { source: value }
    }
}

impl EpubError {
    /// Whether this error aborts the document build
    ///
    /// Archive and package errors mean the input is not a usable EPUB.
    /// Everything else is either recovered per chapter or caused by a query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EpubError::NotAnArchive { .. }
                | EpubError::CorruptArchive { .. }
                | EpubError::MalformedPackage { .. }
                | EpubError::IOError { .. }
        )
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::EntryNotFound { entry: l_entry }, Self::EntryNotFound { entry: r_entry }) => {
                l_entry == r_entry
            }
            (
                Self::UnparsableMarkup { entry: l_entry },
                Self::UnparsableMarkup { entry: r_entry },
            ) => l_entry == r_entry,
            (
                Self::ChapterIndexOutOfRange {
                    index: l_index,
                    count: l_count,
                },
                Self::ChapterIndexOutOfRange {
                    index: r_index,
                    count: r_count,
                },
            ) => l_index == r_index && l_count == r_count,
            (Self::ChapterNotFound { title: l_title }, Self::ChapterNotFound { title: r_title }) => {
                l_title == r_title
            }
            (
                Self::InvalidPattern { source: l_source },
                Self::InvalidPattern { source: r_source },
            ) => l_source == r_source,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
