// src/xml_tree.rs

use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

/// A parsed XML element. Attribute and child order follow the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parses a whole document and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(xml);

        // Each open element keeps its raw (still escaped) text alongside it.
        let mut stack: Vec<(XmlElement, String)> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => {
                    stack.push((element_from_start(e)?, String::new()));
                }
                Event::Empty(ref e) => {
                    let element = element_from_start(e)?;
                    match stack.last_mut() {
                        Some((parent, _)) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(ref t) => {
                    if let Some((_, raw)) = stack.last_mut() {
                        raw.push_str(&utf8(t.to_vec(), "text content")?);
                    }
                }
                Event::GeneralRef(ref r) => {
                    if let Some((_, raw)) = stack.last_mut() {
                        raw.push('&');
                        raw.push_str(&utf8(r.to_vec(), "entity reference")?);
                        raw.push(';');
                    }
                }
                Event::CData(ref c) => {
                    if let Some((current, _)) = stack.last_mut() {
                        current.text.push_str(&utf8(c.to_vec(), "CDATA section")?);
                    }
                }
                Event::End(_) => {
                    if let Some((mut element, raw)) = stack.pop() {
                        let text = unescape(&raw)
                            .map_err(|e| Error::FormatError(format!("Invalid escape: {}", e)))?;
                        element.text.insert_str(0, text.trim());
                        match stack.last_mut() {
                            Some((parent, _)) => parent.children.push(element),
                            None => return Ok(element),
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Err(Error::FormatError("No root element found".to_string()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All descendants with the given tag name in document order.
    /// A matching element's own subtree is not searched further.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        collect_descendants(self, name, &mut found);
        found
    }
}

fn collect_descendants<'a>(element: &'a XmlElement, name: &str, found: &mut Vec<&'a XmlElement>) {
    for child in &element.children {
        if child.name == name {
            found.push(child);
        } else {
            collect_descendants(child, name, found);
        }
    }
}

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement> {
    let name = utf8(e.name().as_ref().to_vec(), "tag name")?;
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::FormatError(format!("Invalid attribute: {}", e)))?;
        let key = utf8(attr.key.as_ref().to_vec(), "attribute key")?;
        let raw = utf8(attr.value.to_vec(), "attribute value")?;
        let value = unescape(&raw)
            .map_err(|e| Error::FormatError(format!("Invalid escape in '{}': {}", key, e)))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn utf8(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::FormatError(format!("Invalid UTF-8 in {}", what)))
}
