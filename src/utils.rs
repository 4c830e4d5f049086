use std::{borrow::Cow, collections::HashMap};

use encoding_rs::Encoding;
use log::warn;
use percent_encoding::percent_decode_str;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use scraper::{ElementRef, Html};

use crate::error::EpubError;

/// Provides functionality to decode byte data into strings
///
/// Raw entry bytes read from an EPUB are decoded by trying, in order:
/// - a Byte Order Mark (UTF-8, UTF-16 BE, UTF-16 LE)
/// - the encoding named by the hint, if any (any WHATWG label is accepted)
/// - plain UTF-8
/// - UTF-16 BE and LE without BOM, when the length allows it
///
/// ## Return
/// - `Some(String)`: The decoded text; empty data decodes to an empty string
/// - `None`: No candidate encoding decodes the data cleanly, or the result
///   contains NUL characters (binary data)
pub trait DecodeBytes {
    fn decode(&self, encoding_hint: Option<&str>) -> Option<String>;
}

impl DecodeBytes for [u8] {
    fn decode(&self, encoding_hint: Option<&str>) -> Option<String> {
        if self.is_empty() {
            return Some(String::new());
        }

        if let Some((encoding, bom_length)) = Encoding::for_bom(self) {
            return encoding
                .decode_without_bom_handling_and_without_replacement(&self[bom_length..])
                .and_then(reject_binary);
        }

        if let Some(encoding) = encoding_hint.and_then(|hint| Encoding::for_label(hint.as_bytes()))
        {
            match encoding
                .decode_without_bom_handling_and_without_replacement(self)
                .and_then(reject_binary)
            {
                Some(text) => return Some(text),
                None => warn!(
                    "Data does not decode as the declared \"{}\" encoding, trying other encodings.",
                    encoding.name()
                ),
            }
        }

        if let Some(text) = std::str::from_utf8(self).ok().map(Cow::Borrowed) {
            return reject_binary(text);
        }

        if self.len() % 2 == 0 {
            let utf16_be: Vec<u16> = self
                .chunks_exact(2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .collect();
            if let Some(text) = String::from_utf16(&utf16_be).ok().map(Cow::Owned) {
                if let Some(text) = reject_binary(text) {
                    return Some(text);
                }
            }

            let utf16_le: Vec<u16> = self
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect();
            if let Some(text) = String::from_utf16(&utf16_le).ok().map(Cow::Owned) {
                return reject_binary(text);
            }
        }

        None
    }
}

#[inline]
fn reject_binary(text: Cow<'_, str>) -> Option<String> {
    (!text.contains('\0')).then(|| text.into_owned())
}

/// Provides functionality for normalizing whitespace characters
///
/// This trait normalizes various sequences of whitespace characters
/// (including spaces, tabs, newlines, etc.) in a string into a single
/// whitespace character, removing leading and trailing whitespace characters.
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// Counts whitespace-separated, non-empty tokens
#[inline]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Reads the `encoding` pseudo-attribute of an XML declaration, if present
pub fn sniff_xml_encoding(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    let declaration = &head[..head.strip_prefix("<?xml")?.find("?>")? + 5];

    let value = declaration.split_once("encoding")?.1.trim_start();
    let value = value.strip_prefix('=')?.trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &value[1..];
    let end = value.find(quote)?;

    Some(value[..end].trim().to_string()).filter(|encoding| !encoding.is_empty())
}

/// Returns the directory part of a container path, without trailing slash
#[inline]
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolves an href found in a document located in `base_dir` into a
/// container path
///
/// The fragment and query parts are dropped and the href is percent-decoded.
/// Absolute hrefs (starting with `/`) are relative to the container root.
///
/// ## Return
/// - `Some(String)`: The normalized container path
/// - `None`: The href is external, empty, or points outside the container
pub fn resolve_href(base_dir: &str, href: &str) -> Option<String> {
    let href = href.split(['#', '?']).next().unwrap_or_default().trim();
    if href.is_empty() || href.contains("://") || href.starts_with("mailto:") {
        return None;
    }

    let decoded = percent_decode_str(href).decode_utf8().ok()?;
    let (base, relative) = match decoded.strip_prefix('/') {
        Some(relative) => ("", relative),
        None => (base_dir, &decoded[..]),
    };

    let mut segments = base
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<&str>>();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            // failed to navigate up, the link leaks out of the container
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }

    (!segments.is_empty()).then(|| segments.join("/"))
}

/// Resolves a predefined XML entity or a character reference name
/// (without `&` and `;`)
///
/// Only the package-level XML files go through this; HTML named entities in
/// content documents are resolved by the HTML parser.
pub fn resolve_entity(entity: &str) -> Option<Cow<'static, str>> {
    let resolved = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };

            return char::from_u32(code).map(|c| Cow::Owned(c.to_string()));
        }
    };

    Some(Cow::Borrowed(resolved))
}

/// Replaces the entity references of a raw attribute value
fn unescape_attribute(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut remaining = raw;

    while let Some(start) = remaining.find('&') {
        result.push_str(&remaining[..start]);
        let tail = &remaining[start..];
        match tail[1..]
            .find(';')
            .and_then(|end| resolve_entity(&tail[1..end + 1]).map(|value| (end, value)))
        {
            Some((end, value)) => {
                result.push_str(&value);
                remaining = &tail[end + 2..];
            }
            None => {
                result.push('&');
                remaining = &tail[1..];
            }
        }
    }

    result.push_str(remaining);
    result
}

/// A node of a parsed XML or XHTML document
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Represents an element node in an XML document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// The local name of the element(excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The namespace of the element
    pub namespace: Option<String>,

    /// The attributes of the element
    ///
    /// The key is the attribute name, the value is the attribute value
    pub attributes: HashMap<String, String>,

    /// Child elements and text runs, in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create a new element
    pub fn new(name: String) -> Self {
        Self {
            name,
            prefix: None,
            namespace: None,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// Get the full tag name of the element
    ///
    /// If the element has a namespace prefix, return "prefix:name" format;
    /// otherwise, return only the element name.
    pub fn tag_name(&self) -> String {
        if let Some(prefix) = &self.prefix {
            format!("{}:{}", prefix, self.name)
        } else {
            self.name.clone()
        }
    }

    /// Gets the text content of the element and all its descendants
    ///
    /// Text runs are concatenated in document order and whitespace is normalized.
    pub fn text(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.normalize_whitespace()
    }

    fn collect_text(&self, buffer: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => buffer.push_str(text),
                XmlNode::Element(element) => element.collect_text(buffer),
            }
        }
    }

    /// Returns the value of the specified attribute
    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    /// Find all elements with the specified name, the element itself included
    pub fn find_elements_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        SearchElementsByNameIter::new(self, name)
    }

    /// Find all elements with the specified name among the child elements of the current element
    pub fn find_children_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        self.children().filter(move |child| child.name == name)
    }

    /// Find all elements with the specified name list among the child elements of the current element
    pub fn find_children_by_names(&self, names: &[&str]) -> impl Iterator<Item = &XmlElement> {
        self.children()
            .filter(move |child| names.contains(&child.name.as_str()))
    }

    /// Get children elements, skipping text runs
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }
}

struct SearchElementsByNameIter<'a> {
    elements: Vec<&'a XmlElement>,
    current_index: usize,
    target_name: String,
}

impl<'a> SearchElementsByNameIter<'a> {
    fn new(root: &'a XmlElement, name: &str) -> Self {
        let mut elements = Vec::new();
        Self::collect_elements(root, &mut elements);
        Self {
            elements,
            current_index: 0,
            target_name: name.to_string(),
        }
    }

    fn collect_elements(element: &'a XmlElement, collection: &mut Vec<&'a XmlElement>) {
        collection.push(element);
        for child in element.children() {
            Self::collect_elements(child, collection);
        }
    }
}

impl<'a> Iterator for SearchElementsByNameIter<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_index < self.elements.len() {
            let element = self.elements[self.current_index];
            self.current_index += 1;
            if element.name == self.target_name {
                return Some(element);
            }
        }
        None
    }
}

/// XML parser used to parse XML content and build an XML element tree
pub struct XmlReader {}

impl XmlReader {
    /// Parses a well-formed XML document and builds the root element
    ///
    /// This is used for the container pointer file and the package document,
    /// where a structural error means the package cannot be trusted.
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the XML element tree
    /// - `Err(EpubError)`: The document is empty or not well-formed
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.trim().is_empty() {
            return Err(EpubError::MalformedPackage {
                reason: "the document is empty".to_string(),
            });
        }

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(false);

        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;
        let mut namespace_map = HashMap::new();

        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,

                Ok(Event::Start(e)) => {
                    stack.push(Self::build_element(&e, &mut namespace_map));
                }

                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        // If the stack is empty,
                        // the current element is the root element
                        match stack.last_mut() {
                            Some(parent) => parent.push_element(element),
                            None => root = Some(element),
                        }
                    }
                }

                Ok(Event::Empty(e)) => {
                    let element = Self::build_element(&e, &mut namespace_map);
                    match stack.last_mut() {
                        Some(parent) => parent.push_element(element),
                        None => root = Some(element),
                    }
                }

                Ok(Event::Text(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                Ok(Event::CData(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                Ok(Event::GeneralRef(e)) => {
                    if let Some(element) = stack.last_mut() {
                        let name = String::from_utf8_lossy(e.as_ref());
                        match resolve_entity(&name) {
                            Some(value) => element.push_text(&value),
                            None => element.push_text(&format!("&{};", name)),
                        }
                    }
                }

                Err(err) => {
                    return Err(EpubError::MalformedPackage {
                        reason: format!(
                            "XML error at position {}: {}",
                            reader.error_position(),
                            err
                        ),
                    });
                }

                // Ignore the following events (elements):
                // Comment, PI, Declaration, Doctype
                _ => continue,
            }
        }

        if !stack.is_empty() {
            return Err(EpubError::MalformedPackage {
                reason: format!("unclosed element \"{}\"", stack[0].tag_name()),
            });
        }

        let mut root = root.ok_or_else(|| EpubError::MalformedPackage {
            reason: "the document has no root element".to_string(),
        })?;
        Self::assign_namespace(&mut root, &namespace_map);

        Ok(root)
    }

    /// Parses an XHTML/HTML content document on a best-effort basis
    ///
    /// The document goes through an HTML5 tree builder, which never fails:
    /// unclosed or misnested tags, bogus comments and stray `<` or `&` are
    /// recovered from the way a browser would, and all HTML named entities
    /// are resolved. Element and attribute names come out lowercased.
    ///
    /// ## Return
    /// The `html` element of the document, which always exists
    pub fn parse_html(content: &str) -> XmlElement {
        let document = Html::parse_document(content);
        Self::convert_html_element(document.root_element())
    }

    fn convert_html_element(element: ElementRef<'_>) -> XmlElement {
        let value = element.value();
        let mut converted = XmlElement::new(value.name().to_string());
        for (key, attr_value) in value.attrs() {
            converted
                .attributes
                .insert(key.to_string(), attr_value.to_string());
        }

        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                converted.push_element(Self::convert_html_element(child_element));
            } else if let Some(text) = child.value().as_text() {
                converted.push_text(text);
            }
        }

        converted
    }

    /// Builds an element from a start tag, recording namespace declarations
    /// into `namespace_map`
    fn build_element(start: &BytesStart, namespace_map: &mut HashMap<String, String>) -> XmlElement {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        if let Some(prefix) = start.name().prefix() {
            element.prefix = Some(String::from_utf8_lossy(prefix.as_ref()).to_string());
        }

        for attr in start.attributes().flatten() {
            let attr_key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let attr_value = unescape_attribute(&String::from_utf8_lossy(&attr.value));

            // Handle namespace attributes
            if attr_key == "xmlns" || attr_key.starts_with("xmlns:") {
                match attr_key.split_once(':') {
                    Some((_, prefix)) => namespace_map.insert(prefix.to_string(), attr_value),
                    None => namespace_map.insert(attr_key, attr_value),
                };
                continue;
            }

            element.attributes.insert(attr_key, attr_value);
        }

        element
    }

    /// Assign namespace to element recursively
    ///
    /// ## Parameters
    /// - `element`: The element to assign namespace
    /// - `namespace_map`: The prefix-namespace map
    fn assign_namespace(element: &mut XmlElement, namespace_map: &HashMap<String, String>) {
        if let Some(prefix) = &element.prefix {
            if let Some(namespace) = namespace_map.get(prefix) {
                element.namespace = Some(namespace.clone());
            }
        } else if let Some(namespace) = namespace_map.get("xmlns") {
            element.namespace = Some(namespace.clone());
        }

        for node in element.children.iter_mut() {
            if let XmlNode::Element(child) = node {
                Self::assign_namespace(child, namespace_map);
            }
        }
    }
}
