//! Document Model
//!
//! A [Document] is the publication metadata plus its chapters in reading
//! order. It is built once from an archive and is read-only afterwards; all
//! queries go through [EpubQuery].

use std::{
    collections::HashMap,
    io::{Read, Seek},
    path::Path,
};

use log::{debug, warn};

use crate::{
    archive::EpubArchive,
    error::EpubError,
    navigation::resolve_titles,
    package::parse_package,
    query::EpubQuery,
    text::{ExtractedText, extract},
    types::{Chapter, DocumentOptions, Metadata, SpineEntry, TitleFallback},
    utils::{DecodeBytes, sniff_xml_encoding},
};

/// A parsed EPUB publication
///
/// # Invariants
/// - chapter indices are `1..=N` in order, where N is the spine length
/// - every spine entry produced exactly one chapter, empty ones included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    metadata: Metadata,
    chapters: Vec<Chapter>,
}

impl Document {
    /// Opens and parses the EPUB at `path`
    ///
    /// The archive is only held while the document is being built.
    pub fn open<P: AsRef<Path>>(path: P, options: &DocumentOptions) -> Result<Self, EpubError> {
        let mut archive = EpubArchive::open(path)?;
        build_document(&mut archive, options)
    }

    /// Parses an EPUB held in memory
    pub fn from_bytes(bytes: Vec<u8>, options: &DocumentOptions) -> Result<Self, EpubError> {
        let mut archive = EpubArchive::from_bytes(bytes)?;
        build_document(&mut archive, options)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Chapters in reading order
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Number of chapters, equal to the number of spine entries
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// The query surface over this document
    pub fn query(&self) -> EpubQuery<'_> {
        EpubQuery::new(self)
    }
}

/// Builds a [Document] from an opened archive
///
/// Package errors abort the build. A chapter whose content document is
/// missing or cannot be decoded gets empty text, so one bad entry never
/// prevents querying the rest of the book.
pub fn build_document<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    options: &DocumentOptions,
) -> Result<Document, EpubError> {
    let package = parse_package(archive)?;

    let titles = match &package.navigation {
        Some(nav_reference) => resolve_titles(archive, nav_reference),
        None => HashMap::new(),
    };

    let mut chapters = Vec::with_capacity(package.spine.len());
    for (position, entry) in package.spine.iter().enumerate() {
        let index = position + 1;
        let extracted = read_chapter(archive, entry)?;

        let title = entry
            .path
            .as_ref()
            .and_then(|path| titles.get(path).cloned())
            .or_else(|| match options.title_fallback {
                TitleFallback::Heading => extracted.heading.clone(),
                TitleFallback::Synthetic => None,
            })
            .unwrap_or_else(|| format!("Chapter {}", index));

        chapters.push(Chapter::new(index, title, entry, extracted.text));
    }

    debug!(
        "Built document \"{}\" with {} chapters.",
        package.metadata.title.as_deref().unwrap_or_default(),
        chapters.len()
    );

    Ok(Document {
        metadata: package.metadata,
        chapters,
    })
}

/// Reads and extracts the content of one spine entry
///
/// Recoverable errors are logged and turn into empty content; only fatal
/// archive errors are returned.
fn read_chapter<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    entry: &SpineEntry,
) -> Result<ExtractedText, EpubError> {
    let Some(path) = entry.path.as_deref() else {
        warn!(
            "Spine entry \"{}\" has no content document, its chapter is empty.",
            entry.id
        );
        return Ok(ExtractedText::default());
    };

    if !entry.is_markup() {
        debug!(
            "Spine entry \"{}\" has media type \"{}\", extracting it on a best-effort basis.",
            entry.id, entry.media_type
        );
    }

    let result = archive.read_bytes(path).and_then(|bytes| {
        bytes
            .decode(sniff_xml_encoding(&bytes).as_deref())
            .ok_or_else(|| EpubError::UnparsableMarkup {
                entry: path.to_string(),
            })
    });

    match result {
        Ok(markup) => Ok(extract(&markup)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!("Chapter \"{}\" is left empty: {}", entry.id, err);
            Ok(ExtractedText::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        document::Document,
        error::EpubError,
        fixtures::{
            CONTAINER_XML, SAMPLE_METADATA, build_archive, ncx_epub, package_opf, sample_epub,
            xhtml,
        },
        types::{DocumentOptions, TitleFallback},
    };

    fn titles(document: &Document) -> Vec<&str> {
        document
            .chapters()
            .iter()
            .map(|chapter| chapter.title())
            .collect()
    }

    #[test]
    fn test_build_three_chapter_document() {
        let document = Document::from_bytes(sample_epub(), &DocumentOptions::default()).unwrap();

        assert_eq!(document.len(), 3);
        assert!(!document.is_empty());
        assert_eq!(titles(&document), vec!["Introduction", "Chapter 2", "Chapter 3"]);

        let indices = document
            .chapters()
            .iter()
            .map(|chapter| chapter.index())
            .collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 2, 3]);

        let first = &document.chapters()[0];
        assert_eq!(first.source_id(), "intro");
        assert_eq!(first.path(), Some("OEBPS/text/intro.xhtml"));
        assert_eq!(first.text(), "Welcome\nHello World, this is the introduction.");
        assert_eq!(first.word_count(), 7);

        assert_eq!(
            document.metadata().title.as_deref(),
            Some("The Sample Book")
        );
    }

    #[test]
    fn test_heading_title_fallback() {
        let options = DocumentOptions {
            title_fallback: TitleFallback::Heading,
        };
        let document = Document::from_bytes(sample_epub(), &options).unwrap();

        // the navigation title still wins over the heading
        assert_eq!(titles(&document), vec!["Introduction", "The Middle", "End"]);
    }

    #[test]
    fn test_build_ncx_document() {
        let document = Document::from_bytes(ncx_epub(), &DocumentOptions::default()).unwrap();

        assert_eq!(titles(&document), vec!["The First", "The Second", "Chapter 3"]);
        assert_eq!(document.chapters()[2].text(), "A note.");
    }

    #[test]
    fn test_missing_navigation_falls_back_to_synthetic_titles() {
        let opf = package_opf(
            SAMPLE_METADATA,
            r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
            <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
            <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="a"/><itemref idref="b"/>"#,
        );
        let a = xhtml("A", "<p>alpha</p>");
        let b = xhtml("B", "<p>beta</p>");
        let bytes = build_archive(&[
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
            ("OEBPS/a.xhtml", a.as_bytes()),
            ("OEBPS/b.xhtml", b.as_bytes()),
        ]);

        let document = Document::from_bytes(bytes, &DocumentOptions::default()).unwrap();
        assert_eq!(titles(&document), vec!["Chapter 1", "Chapter 2"]);
        assert_eq!(document.chapters()[1].text(), "beta");
    }

    #[test]
    fn test_bad_entries_degrade_to_empty_chapters() {
        let opf = package_opf(
            SAMPLE_METADATA,
            r#"<item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
            <item id="missing" href="missing.xhtml" media-type="application/xhtml+xml"/>
            <item id="img" href="cover.png" media-type="image/png"/>
            <item id="plain" href="notes.txt" media-type="text/plain"/>
            <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="a"/>
            <itemref idref="missing"/>
            <itemref idref="img"/>
            <itemref idref="ghost"/>
            <itemref idref="plain"/>
            <itemref idref="b"/>"#,
        );
        let a = xhtml("A", "<p>alpha</p>");
        let b = xhtml("B", "<p>beta <b>gamma</p>");
        let bytes = build_archive(&[
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
            ("OEBPS/a.xhtml", a.as_bytes()),
            ("OEBPS/cover.png", &[0x89, b'P', b'N', b'G', 0x00, 0x00, 0x00, 0x0D][..]),
            ("OEBPS/notes.txt", b"first note\nsecond note"),
            ("OEBPS/b.xhtml", b.as_bytes()),
        ]);

        let document = Document::from_bytes(bytes, &DocumentOptions::default()).unwrap();
        assert_eq!(document.len(), 6);

        let texts = document
            .chapters()
            .iter()
            .map(|chapter| chapter.text())
            .collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["alpha", "", "", "", "first note\nsecond note", "beta gamma"]
        );
        assert_eq!(document.chapters()[1].word_count(), 0);
        assert_eq!(document.chapters()[3].source_id(), "ghost");
        assert_eq!(document.chapters()[5].index(), 6);
    }

    #[test]
    fn test_missing_package_pointer_is_fatal() {
        let bytes = build_archive(&[
            ("mimetype", b"application/epub+zip"),
            ("OEBPS/content.opf", b"<package/>"),
        ]);

        let result = Document::from_bytes(bytes, &DocumentOptions::default());
        assert!(matches!(result, Err(EpubError::MalformedPackage { .. })));
    }

    #[test]
    fn test_not_an_archive_is_fatal() {
        let result = Document::from_bytes(b"PK but not really".to_vec(), &DocumentOptions::default());
        assert!(matches!(result, Err(EpubError::NotAnArchive { .. })));
    }

    #[test]
    fn test_encoding_declared_by_content_document() {
        let opf = package_opf(
            SAMPLE_METADATA,
            r#"<item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="a"/>"#,
        );
        let mut latin = br#"<?xml version="1.0" encoding="ISO-8859-1"?><html><body><p>d"#.to_vec();
        latin.extend_from_slice(&[0xE9, b'j', 0xE0, b' ', b'v', b'u']);
        latin.extend_from_slice(b"</p></body></html>");
        let bytes = build_archive(&[
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
            ("OEBPS/a.xhtml", &latin),
        ]);

        let document = Document::from_bytes(bytes, &DocumentOptions::default()).unwrap();
        assert_eq!(document.chapters()[0].text(), "d\u{e9}j\u{e0} vu");
    }
}
