//! Navigation Resolver
//!
//! Reads the table of contents of a publication, either an EPUB 3 XHTML
//! navigation document or a legacy EPUB 2 NCX file, and maps the content
//! documents it links to onto human-readable titles.
//!
//! Navigation is best-effort: a missing or broken navigation document never
//! fails a document build, it only leaves chapters without a resolved title.

use std::{
    collections::HashMap,
    io::{Read, Seek},
};

use log::{debug, warn};

use crate::{
    archive::EpubArchive,
    error::EpubError,
    types::{NavPoint, NavReference},
    utils::{XmlElement, XmlReader, parent_dir, resolve_href, sniff_xml_encoding},
};

/// Maps content document paths to chapter titles
///
/// Sub-section links (`chapter.xhtml#section`) collapse onto their
/// containing file; the first title seen for a path in table-of-contents
/// order wins. Any failure results in an empty mapping.
pub fn resolve_titles<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    nav_reference: &NavReference,
) -> HashMap<String, String> {
    match read_nav_points(archive, nav_reference) {
        Ok(nav_points) => {
            let titles = flatten_titles(&nav_points);
            debug!(
                "Resolved {} chapter titles from \"{}\".",
                titles.len(),
                nav_reference.path()
            );
            titles
        }
        Err(err) => {
            warn!(
                "Navigation document \"{}\" is unusable, falling back to synthetic titles: {}",
                nav_reference.path(),
                err
            );
            HashMap::new()
        }
    }
}

/// Reads the navigation document into a tree of navigation points
///
/// # Return
/// - `Ok(Vec<NavPoint>)`: The top-level navigation points, possibly empty
///   when the document has no recognizable table of contents
/// - `Err(EpubError::EntryNotFound)`: The navigation document is missing
/// - `Err(EpubError::UnparsableMarkup)`: The navigation document cannot be decoded
/// - `Err(EpubError::MalformedPackage)`: The NCX file is not well-formed XML
pub fn read_nav_points<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    nav_reference: &NavReference,
) -> Result<Vec<NavPoint>, EpubError> {
    let path = nav_reference.path();
    let bytes = archive.read_bytes(path)?;
    let content = archive.read_text(path, sniff_xml_encoding(&bytes).as_deref())?;

    let base_path = parent_dir(path);

    // NCX is plain XML, the navigation document is XHTML and parsed as HTML
    let nav_points = match nav_reference {
        NavReference::Navigation(_) => {
            parse_navigation_document(&XmlReader::parse_html(&content), base_path)
        }
        NavReference::Ncx(_) => parse_ncx(&XmlReader::parse(&content)?, base_path),
    };

    Ok(nav_points)
}

/// Flattens a navigation tree into path → title pairs, in pre-order
pub fn flatten_titles(nav_points: &[NavPoint]) -> HashMap<String, String> {
    fn visit(nav_points: &[NavPoint], titles: &mut HashMap<String, String>) {
        for nav_point in nav_points {
            if let Some(path) = &nav_point.content {
                if !nav_point.label.is_empty() && !titles.contains_key(path) {
                    titles.insert(path.clone(), nav_point.label.clone());
                }
            }
            visit(&nav_point.children, titles);
        }
    }

    let mut titles = HashMap::new();
    visit(nav_points, &mut titles);
    titles
}

/// Parses the `navMap` of an NCX document
fn parse_ncx(root: &XmlElement, base_path: &str) -> Vec<NavPoint> {
    match root.find_elements_by_name("navMap").next() {
        Some(nav_map) => parse_nav_points(nav_map, base_path),
        None => {
            warn!("Expecting a navMap element in the ncx file, but it's missing.");
            vec![]
        }
    }
}

/// Recursively parse NCX navigation points from navMap or nested navPoint elements
///
/// Siblings are ordered by their `playOrder` attribute.
fn parse_nav_points(parent_element: &XmlElement, base_path: &str) -> Vec<NavPoint> {
    let mut nav_points = Vec::new();
    for nav_point in parent_element.find_children_by_name("navPoint") {
        let label = match nav_point.find_children_by_name("navLabel").next() {
            Some(element) => element.text(),
            None => String::new(),
        };

        let content = nav_point
            .find_children_by_name("content")
            .next()
            .and_then(|element| element.get_attr("src"))
            .and_then(|src| resolve_href(base_path, &src));

        let play_order = nav_point
            .get_attr("playOrder")
            .and_then(|order| order.trim().parse::<usize>().ok());

        nav_points.push(NavPoint {
            label,
            content,
            play_order,
            children: parse_nav_points(nav_point, base_path),
        });
    }

    nav_points.sort();
    nav_points
}

/// Parses the table of contents of an EPUB 3 navigation document
///
/// The `nav` element typed `toc` is preferred, then the first `nav`
/// element, then the first ordered list of the document.
fn parse_navigation_document(root: &XmlElement, base_path: &str) -> Vec<NavPoint> {
    let nav = root
        .find_elements_by_name("nav")
        .find(|element| {
            element
                .get_attr("epub:type")
                .is_some_and(|types| types.split_whitespace().any(|t| t == "toc"))
        })
        .or_else(|| root.find_elements_by_name("nav").next());

    let list = match nav {
        Some(nav) => nav.find_elements_by_name("ol").next(),
        None => root.find_elements_by_name("ol").next(),
    };

    match list {
        Some(list) => parse_catalog_list(list, base_path),
        None => {
            warn!("Expecting a table of contents list in the navigation document, but it's missing.");
            vec![]
        }
    }
}

/// Recursively parses directory list structures
///
/// Each `<li>` holds a link (`<a>`) or a heading-like `<span>`, and
/// optionally a nested `<ol>` of sub-entries. Other children are ignored.
fn parse_catalog_list(element: &XmlElement, base_path: &str) -> Vec<NavPoint> {
    let mut catalog = Vec::new();
    for item in element.find_children_by_name("li") {
        let title_element = item.find_children_by_names(&["a", "span"]).next();

        let label = title_element.map(XmlElement::text).unwrap_or_default();
        let content = title_element
            .and_then(|title| title.get_attr("href"))
            .and_then(|href| resolve_href(base_path, &href));
        let children = match item.find_children_by_name("ol").next() {
            Some(list) => parse_catalog_list(list, base_path),
            None => vec![],
        };

        catalog.push(NavPoint {
            label,
            content,
            children,
            play_order: None,
        });
    }

    catalog
}
