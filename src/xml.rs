//! Minimal XML element tree for server responses, plus request-body helpers
//!
//! Responses are small, so they are read into a tree of [`XmlElement`]s keyed
//! by local name. Namespace prefixes are ignored.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};

/// One element of a parsed response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name (no namespace prefix)
    pub name: String,
    /// Attributes in document order, by local name
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// Concatenated text content
    pub text: String,
}

impl XmlElement {
    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute that a `kind` record cannot do without
    pub fn required_attr(&self, name: &str, kind: &str) -> Result<&str> {
        match self.attr(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::record(kind, format!("missing '{name}' attribute"))),
        }
    }

    /// First direct child named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children named `name`
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant named `name`, depth first, excluding `self`
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::InvalidResponse(format!("bad attribute: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::InvalidResponse(format!("bad attribute value: {e}")))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }
}

/// Parse a complete document and return its root element
pub fn parse_document(xml: &[u8]) -> Result<XmlElement> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(XmlElement::from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let element = XmlElement::from_start(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Text(te)) => {
                if let Some(top) = stack.last_mut() {
                    let text = te
                        .unescape()
                        .map_err(|e| Error::InvalidResponse(format!("bad text: {e}")))?;
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(cd)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&cd));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::InvalidResponse(format!("malformed XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(Error::InvalidResponse("unterminated XML document".into()));
    }
    root.ok_or_else(|| Error::InvalidResponse("empty XML document".into()))
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// `<name a="v" …/>` with escaped attribute values
pub(crate) fn empty_element(name: &str, attributes: &[(&str, &str)]) -> String {
    format!("<{name}{}/>", render_attributes(attributes))
}

/// `<name a="v" …>inner</name>` with escaped attribute values
pub(crate) fn element(name: &str, attributes: &[(&str, &str)], inner: &str) -> String {
    format!("<{name}{}>{inner}</{name}>", render_attributes(attributes))
}

/// Wrap a request payload in the `tsRequest` envelope
pub(crate) fn ts_request(inner: &str) -> String {
    element("tsRequest", &[], inner)
}

fn render_attributes(attributes: &[(&str, &str)]) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!(" {key}=\"{}\"", quick_xml::escape::escape(*value)))
        .collect()
}
