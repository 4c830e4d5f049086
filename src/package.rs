//! Package Parser
//!
//! Locates the package document through `META-INF/container.xml` and reads
//! its metadata, manifest and spine. The result is the publication
//! [Metadata], the reading order as a list of [SpineEntry], and the location
//! of the navigation document.

use std::io::{Read, Seek};

use indexmap::IndexMap;
use log::{debug, warn};

use crate::{
    archive::EpubArchive,
    error::EpubError,
    types::{Metadata, NavReference, SpineEntry},
    utils::{XmlElement, XmlReader, parent_dir, resolve_href, sniff_xml_encoding},
};

/// The fixed entry point of every EPUB container
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// The parsed package document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// The container path of the package document
    pub package_path: String,

    /// The `version` attribute of the package, if declared
    pub version: Option<String>,

    pub metadata: Metadata,

    /// The reading order, one entry per `itemref`
    pub spine: Vec<SpineEntry>,

    /// The navigation document declared by the package, if any
    pub navigation: Option<NavReference>,
}

/// A resource declared in the manifest
#[derive(Debug, Clone)]
struct ManifestItem {
    path: Option<String>,
    media_type: String,
    properties: Option<String>,
}

impl ManifestItem {
    fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|properties| properties.split_whitespace().any(|p| p == property))
    }
}

/// Parses the package document of the container
///
/// # Return
/// - `Ok(Package)`: Metadata, spine and navigation reference
/// - `Err(EpubError::MalformedPackage)`: The pointer file, the package
///   document, its manifest or its spine is missing or unparsable
/// - `Err(EpubError::CorruptArchive)`: Reading one of these entries failed
pub fn parse_package<R: Read + Seek>(archive: &mut EpubArchive<R>) -> Result<Package, EpubError> {
    let container = archive
        .read_text(CONTAINER_PATH, None)
        .map_err(|err| malformed_on_missing(err, "container pointer file"))?;
    let package_path = parse_container(&container)?;
    debug!("Package document located at \"{}\".", package_path);

    let opf_bytes = archive
        .read_bytes(&package_path)
        .map_err(|err| malformed_on_missing(err, "package document"))?;
    let opf = archive
        .read_text(&package_path, sniff_xml_encoding(&opf_bytes).as_deref())
        .map_err(|err| malformed_on_missing(err, "package document"))?;
    let package = XmlReader::parse(&opf)?;
    if package.name != "package" {
        return Err(EpubError::MalformedPackage {
            reason: format!(
                "expected a \"package\" root element, found \"{}\"",
                package.tag_name()
            ),
        });
    }

    let base_path = parent_dir(&package_path).to_string();

    let metadata = match package.find_children_by_name("metadata").next() {
        Some(metadata_element) => {
            parse_metadata(metadata_element, package.get_attr("unique-identifier"))
        }
        None => {
            warn!("The package document has no metadata element.");
            Metadata::default()
        }
    };

    let manifest_element = package
        .find_children_by_name("manifest")
        .next()
        .ok_or_else(|| EpubError::MalformedPackage {
            reason: "the package document has no manifest".to_string(),
        })?;
    let spine_element = package
        .find_children_by_name("spine")
        .next()
        .ok_or_else(|| EpubError::MalformedPackage {
            reason: "the package document has no spine".to_string(),
        })?;

    let manifest = parse_manifest(manifest_element, &base_path);
    let spine = parse_spine(spine_element, &manifest);
    let navigation = locate_navigation(spine_element, &manifest);
    debug!(
        "Parsed {} manifest items and {} spine entries.",
        manifest.len(),
        spine.len()
    );

    Ok(Package {
        package_path,
        version: package.get_attr("version"),
        metadata,
        spine,
        navigation,
    })
}

/// Maps the absence or undecodability of a required entry to a malformed package
fn malformed_on_missing(err: EpubError, what: &str) -> EpubError {
    match err {
        EpubError::EntryNotFound { entry } => EpubError::MalformedPackage {
            reason: format!("the {} \"{}\" is missing", what, entry),
        },
        EpubError::UnparsableMarkup { entry } => EpubError::MalformedPackage {
            reason: format!("the {} \"{}\" cannot be decoded", what, entry),
        },
        err => err,
    }
}

/// Parse the EPUB container file (META-INF/container.xml)
///
/// When multiple `rootfile` elements exist, the first one declaring the
/// package media type is used, then the first one with a `full-path`.
fn parse_container(data: &str) -> Result<String, EpubError> {
    const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

    let root = XmlReader::parse(data)?;
    let rootfiles = root
        .find_elements_by_name("rootfile")
        .filter(|rootfile| rootfile.get_attr("full-path").is_some())
        .collect::<Vec<&XmlElement>>();

    rootfiles
        .iter()
        .find(|rootfile| rootfile.get_attr("media-type").as_deref() == Some(PACKAGE_MEDIA_TYPE))
        .or_else(|| rootfiles.first())
        .and_then(|rootfile| rootfile.get_attr("full-path"))
        .and_then(|path| resolve_href("", &path))
        .ok_or_else(|| EpubError::MalformedPackage {
            reason: "the container pointer file names no package document".to_string(),
        })
}

/// Parse the `<metadata>` element
///
/// Dublin Core elements are recognized by namespace or by the `dc` prefix.
/// Values are whitespace-normalized and empty values are ignored.
fn parse_metadata(metadata_element: &XmlElement, unique_identifier: Option<String>) -> Metadata {
    let mut metadata = Metadata::default();
    let mut identifiers = Vec::<(Option<String>, String)>::new();

    for element in metadata_element.children() {
        let is_dublin_core = element.namespace.as_deref() == Some(DC_NAMESPACE)
            || element.prefix.as_deref() == Some("dc");
        let value = element.text();
        if value.is_empty() {
            continue;
        }

        if !is_dublin_core {
            if element.name == "meta"
                && element.get_attr("property").as_deref() == Some("dcterms:modified")
            {
                metadata.modified.get_or_insert(value);
            }
            continue;
        }

        match element.name.as_str() {
            "title" => {
                metadata.title.get_or_insert(value);
            }
            "creator" => metadata.authors.push(value),
            "language" => {
                metadata.language.get_or_insert(value);
            }
            "identifier" => identifiers.push((element.get_attr("id"), value)),
            "publisher" => {
                metadata.publisher.get_or_insert(value);
            }
            "date" => {
                metadata.date.get_or_insert(value);
            }
            "description" => {
                metadata.description.get_or_insert(value);
            }
            "subject" => metadata.subjects.push(value),
            _ => {}
        }
    }

    metadata.identifier = unique_identifier
        .and_then(|uid| {
            identifiers
                .iter()
                .find(|(id, _)| id.as_deref() == Some(uid.as_str()))
        })
        .or_else(|| identifiers.first())
        .map(|(_, value)| value.clone());

    metadata
}

/// Parse the `<manifest>` element into an id-keyed map in document order
///
/// Items without an id or href are skipped with a warning; a missing
/// media type is kept as an empty string.
fn parse_manifest(
    manifest_element: &XmlElement,
    base_path: &str,
) -> IndexMap<String, ManifestItem> {
    let mut resources = IndexMap::with_capacity(manifest_element.children().count());

    for element in manifest_element.find_children_by_name("item") {
        let (Some(id), Some(href)) = (element.get_attr("id"), element.get_attr("href")) else {
            warn!("Skipping a manifest item without an id or href attribute.");
            continue;
        };

        let path = resolve_href(base_path, &href);
        if path.is_none() {
            warn!(
                "The href \"{}\" of manifest item \"{}\" does not resolve inside the container.",
                href, id
            );
        }

        resources.insert(
            id,
            ManifestItem {
                path,
                media_type: element.get_attr("media-type").unwrap_or_default(),
                properties: element.get_attr("properties"),
            },
        );
    }

    resources
}

/// Parse the `<spine>` element into the reading order
///
/// Every `itemref` becomes a spine entry, including those whose idref is
/// unknown to the manifest; dropping them would shift chapter numbering.
fn parse_spine(
    spine_element: &XmlElement,
    manifest: &IndexMap<String, ManifestItem>,
) -> Vec<SpineEntry> {
    let mut spine = Vec::new();
    for element in spine_element.find_children_by_name("itemref") {
        let id = element.get_attr("idref").unwrap_or_default();
        let linear = element
            .get_attr("linear")
            .map(|linear| linear != "no")
            .unwrap_or(true);

        let entry = match manifest.get(&id) {
            Some(item) => SpineEntry {
                id,
                path: item.path.clone(),
                media_type: item.media_type.clone(),
                linear,
            },
            None => {
                warn!("Spine itemref \"{}\" has no manifest item.", id);
                SpineEntry {
                    id,
                    path: None,
                    media_type: String::new(),
                    linear,
                }
            }
        };

        spine.push(entry);
    }

    spine
}

/// Finds the navigation document
///
/// In order of preference: the manifest item with the `nav` property
/// (EPUB 3), the item named by the spine `toc` attribute (NCX), then any
/// manifest item with the NCX media type. Ties go to the item declared
/// first in the manifest.
fn locate_navigation(
    spine_element: &XmlElement,
    manifest: &IndexMap<String, ManifestItem>,
) -> Option<NavReference> {
    let nav = manifest
        .values()
        .find(|item| item.has_property("nav"))
        .and_then(|item| item.path.clone())
        .map(NavReference::Navigation);
    if nav.is_some() {
        return nav;
    }

    let ncx = spine_element
        .get_attr("toc")
        .and_then(|toc_id| manifest.get(&toc_id))
        .or_else(|| {
            manifest
                .values()
                .find(|item| item.media_type == NCX_MEDIA_TYPE)
        })
        .and_then(|item| item.path.clone())
        .map(NavReference::Ncx);
    if ncx.is_none() {
        warn!("The package declares no navigation document.");
    }

    ncx
}
