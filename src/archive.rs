//! Archive Reader
//!
//! An EPUB is a zip container. [EpubArchive] wraps the container and exposes
//! lookups of named entries as bytes or decoded text. The whole container is
//! checked when it is opened, so a damaged entry is reported up front as
//! [EpubError::CorruptArchive] instead of surfacing halfway through a query.

use std::{
    fs,
    io::{self, Cursor, Read, Seek},
    path::Path,
};

use log::debug;
use zip::{ZipArchive, result::ZipError};

use crate::{error::EpubError, utils::DecodeBytes};

/// A verified, readable EPUB container
pub struct EpubArchive<R: Read + Seek = Cursor<Vec<u8>>> {
    archive: ZipArchive<R>,
}

impl EpubArchive<Cursor<Vec<u8>>> {
    /// Opens the EPUB at `path`
    ///
    /// The file is read into memory in one go; the file descriptor is
    /// released before this function returns.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Opens an EPUB held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EpubError> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Opens an EPUB from any seekable reader
    ///
    /// # Return
    /// - `Ok(EpubArchive)`: The container is a valid zip and every entry
    ///   decompresses and passes its CRC check
    /// - `Err(EpubError::NotAnArchive)`: The data is not a zip container
    /// - `Err(EpubError::CorruptArchive)`: An entry is damaged or uses an
    ///   unsupported compression method
    pub fn from_reader(reader: R) -> Result<Self, EpubError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|source| EpubError::NotAnArchive { source })?;

        verify_entries(&mut archive)?;
        debug!("Opened archive with {} entries.", archive.len());

        Ok(Self { archive })
    }

    /// Number of entries in the container
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Names of all entries, in central directory order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.archive.file_names()
    }

    /// Whether an entry with this exact name exists
    pub fn contains(&self, entry: &str) -> bool {
        self.archive.index_for_name(entry).is_some()
    }

    /// Reads the raw bytes of an entry
    ///
    /// # Return
    /// - `Err(EpubError::EntryNotFound)`: No entry has this name
    /// - `Err(EpubError::CorruptArchive)`: The entry cannot be decompressed
    pub fn read_bytes(&mut self, entry: &str) -> Result<Vec<u8>, EpubError> {
        let mut file = match self.archive.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(EpubError::EntryNotFound {
                    entry: entry.to_string(),
                });
            }
            Err(err) => return Err(corrupt(entry, err)),
        };

        let mut buffer = Vec::<u8>::new();
        file.read_to_end(&mut buffer)
            .map_err(|err| corrupt(entry, err))?;

        Ok(buffer)
    }

    /// Reads an entry and decodes it as text
    ///
    /// `encoding_hint` names the encoding declared by the entry itself (for
    /// example by an XML declaration); a Byte Order Mark takes precedence.
    ///
    /// # Return
    /// - `Err(EpubError::EntryNotFound)`: No entry has this name
    /// - `Err(EpubError::UnparsableMarkup)`: The bytes cannot be decoded as text
    pub fn read_text(
        &mut self,
        entry: &str,
        encoding_hint: Option<&str>,
    ) -> Result<String, EpubError> {
        self.read_bytes(entry)?
            .decode(encoding_hint)
            .ok_or_else(|| EpubError::UnparsableMarkup {
                entry: entry.to_string(),
            })
    }
}

/// Decompresses every entry to a sink, which runs the CRC check of each one
///
/// Entries using a compression method other than Stored or Deflated cannot
/// be read and are reported as corrupt, like damaged data.
fn verify_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<(), EpubError> {
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|err| corrupt(&format!("#{}", index), err))?;

        let name = file.name().to_string();
        io::copy(&mut file, &mut io::sink()).map_err(|err| corrupt(&name, err))?;
    }

    Ok(())
}

#[inline]
fn corrupt(entry: &str, reason: impl ToString) -> EpubError {
    EpubError::CorruptArchive {
        entry: entry.to_string(),
        reason: reason.to_string(),
    }
}
