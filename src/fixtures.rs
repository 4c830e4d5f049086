//! In-memory EPUB archives for unit tests

use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::FileOptions};

pub(crate) const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

pub(crate) fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build_archive_with(entries, CompressionMethod::Stored)
}

pub(crate) fn build_archive_with(
    entries: &[(&str, &[u8])],
    compression: CompressionMethod,
) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(compression);

    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Wraps a body fragment into an XHTML content document
pub(crate) fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title></head>
<body>
{body}
</body>
</html>"#
    )
}

/// Builds an EPUB 3 package document with the given metadata, manifest
/// items and spine itemrefs
pub(crate) fn package_opf(metadata: &str, manifest: &str, spine: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="pub-id">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        {metadata}
    </metadata>
    <manifest>
        {manifest}
    </manifest>
    <spine>
        {spine}
    </spine>
</package>"#
    )
}

pub(crate) const SAMPLE_METADATA: &str = r#"
        <dc:identifier id="pub-id">urn:uuid:0b7f8c1e-sample</dc:identifier>
        <dc:title>The Sample Book</dc:title>
        <dc:creator>Ada Writer</dc:creator>
        <dc:creator>Bob Editor</dc:creator>
        <dc:language>en</dc:language>
        <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>"#;

/// A three chapter EPUB 3 book whose navigation document only titles the
/// first chapter
pub(crate) fn sample_epub() -> Vec<u8> {
    let opf = package_opf(
        SAMPLE_METADATA,
        r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
        <item id="intro" href="text/intro.xhtml" media-type="application/xhtml+xml"/>
        <item id="body" href="text/body.xhtml" media-type="application/xhtml+xml"/>
        <item id="end" href="text/end.xhtml" media-type="application/xhtml+xml"/>"#,
        r#"<itemref idref="intro"/>
        <itemref idref="body"/>
        <itemref idref="end"/>"#,
    );
    let nav = xhtml(
        "Contents",
        r#"<nav epub:type="toc"><h1>Contents</h1>
            <ol><li><a href="text/intro.xhtml">Introduction</a></li></ol>
        </nav>"#,
    );
    let intro = xhtml(
        "Intro",
        "<h1>Welcome</h1>\n<p>Hello World, this is the introduction.</p>",
    );
    let body = xhtml(
        "Body",
        "<h2>The Middle</h2>\n<p>The main chapter text.</p>\n<p>Another chapter line.</p>",
    );
    let end = xhtml("End", "<p>The end.</p>");

    build_archive(&[
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/nav.xhtml", nav.as_bytes()),
        ("OEBPS/text/intro.xhtml", intro.as_bytes()),
        ("OEBPS/text/body.xhtml", body.as_bytes()),
        ("OEBPS/text/end.xhtml", end.as_bytes()),
    ])
}

/// An EPUB 2 book with an NCX table of contents
pub(crate) fn ncx_epub() -> Vec<u8> {
    let opf = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>Old   Style
            Book</dc:title>
        <dc:creator opf:role="aut">Carol Author</dc:creator>
        <dc:identifier id="isbn">978-0-00-000000-0</dc:identifier>
        <dc:identifier id="BookId">urn:uuid:legacy-book</dc:identifier>
        <dc:publisher>Old Press</dc:publisher>
        <dc:date>1999-12-31</dc:date>
        <dc:subject>Fiction</dc:subject>
        <dc:subject>Classics</dc:subject>
        <dc:description>A book in the old format.</dc:description>
    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="ch1" href="chapter%201.html" media-type="application/xhtml+xml"/>
        <item id="ch2" href="chapter2.html" media-type="application/xhtml+xml"/>
        <item id="notes" href="notes.html" media-type="application/xhtml+xml"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="ch1"/>
        <itemref idref="ch2"/>
        <itemref idref="notes" linear="no"/>
    </spine>
</package>"#;
    let ncx = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <docTitle><text>Old Style Book</text></docTitle>
    <navMap>
        <navPoint id="np2" playOrder="2">
            <navLabel><text>The Second</text></navLabel>
            <content src="chapter2.html"/>
        </navPoint>
        <navPoint id="np1" playOrder="1">
            <navLabel><text>The First</text></navLabel>
            <content src="chapter%201.html"/>
            <navPoint id="np1a" playOrder="3">
                <navLabel><text>First, Part A</text></navLabel>
                <content src="chapter%201.html#part-a"/>
            </navPoint>
        </navPoint>
    </navMap>
</ncx>"#;
    let ch1 = xhtml("One", "<p>First chapter.</p>");
    let ch2 = xhtml("Two", "<p>Second chapter here.</p>");
    let notes = xhtml("Notes", "<p>A note.</p>");

    build_archive(&[
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/toc.ncx", ncx.as_bytes()),
        ("OEBPS/chapter 1.html", ch1.as_bytes()),
        ("OEBPS/chapter2.html", ch2.as_bytes()),
        ("OEBPS/notes.html", notes.as_bytes()),
    ])
}
