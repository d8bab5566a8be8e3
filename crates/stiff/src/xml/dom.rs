//! A small owned element tree over quick-xml events.
//!
//! Elements keep the events they were read from, so writing an untouched
//! element reproduces its bytes exactly. Only attributes changed through
//! [`Element::set_attr`] or [`Element::remove_attr`] are re-serialised.

use std::io::{BufRead, Write};

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Result, StiffError};

#[derive(Clone, Debug)]
pub enum Node {
    Element(Element),
    Text(BytesText<'static>),
    /// Comments, CDATA and processing instructions, passed through as is.
    Other(Event<'static>),
}

#[derive(Clone, Debug)]
pub struct Element {
    start: BytesStart<'static>,
    pub children: Vec<Node>,
    /// Written as `<name/>` when it has no children.
    pub empty: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_string()),
            children: Vec::new(),
            empty: true,
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.start.push_attribute((key, value));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.start.name().as_ref()).into_owned()
    }

    pub fn attr(&self, key: &str) -> Result<Option<String>> {
        for attr in self.start.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == key.as_bytes() {
                return Ok(Some(attr.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    pub fn required_attr(&self, key: &str) -> Result<String> {
        self.attr(key)?.ok_or_else(|| {
            StiffError::malformed(format!("<{}> lacks attribute {key:?}", self.name()))
        })
    }

    /// All attributes, unescaped, in document order.
    pub fn attrs(&self) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for attr in self.start.attributes() {
            let attr = attr?;
            out.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ));
        }
        Ok(out)
    }

    /// Replace or append an attribute, keeping the order of the others.
    pub fn set_attr(&mut self, key: &str, value: &str) -> Result<()> {
        let mut attrs = self.attrs()?;
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((key.to_string(), value.to_string())),
        }
        self.rebuild(attrs);
        Ok(())
    }

    pub fn remove_attr(&mut self, key: &str) -> Result<()> {
        let mut attrs = self.attrs()?;
        let before = attrs.len();
        attrs.retain(|(k, _)| k != key);
        if attrs.len() != before {
            self.rebuild(attrs);
        }
        Ok(())
    }

    fn rebuild(&mut self, attrs: Vec<(String, String)>) {
        self.start.clear_attributes();
        for (key, value) in &attrs {
            self.start.push_attribute((key.as_str(), value.as_str()));
        }
    }

    /// Concatenated, unescaped text of the direct children.
    pub fn text(&self) -> Result<String> {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(&text.unescape()?),
                Node::Other(Event::CData(cdata)) => out.push_str(&String::from_utf8_lossy(cdata)),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        self.push_text(text);
    }

    pub fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.children.push(Node::Text(BytesText::new(text).into_owned()));
            self.empty = false;
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
        self.empty = false;
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter_map(|c| match c {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> + '_ {
        self.children.iter_mut().filter_map(|c| match c {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name() == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.name() == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |el| el.name() == name)
    }

    /// Drop child elements for which `keep` returns false, together with
    /// the whitespace text directly preceding each of them.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(usize, &Element) -> bool) {
        let mut out: Vec<Node> = Vec::with_capacity(self.children.len());
        let mut idx = 0;
        for node in self.children.drain(..) {
            match node {
                Node::Element(el) => {
                    let kept = keep(idx, &el);
                    idx += 1;
                    if kept {
                        out.push(Node::Element(el));
                    } else if matches!(out.last(), Some(Node::Text(t)) if is_blank(t)) {
                        out.pop();
                    }
                }
                other => out.push(other),
            }
        }
        self.children = out;
    }

    /// Read the rest of an element whose start tag was just consumed.
    pub fn read_from<R: BufRead>(reader: &mut Reader<R>, start: BytesStart<'static>) -> Result<Self> {
        let mut buf = Vec::new();
        let mut el = Element {
            start,
            children: Vec::new(),
            empty: false,
        };
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let child = Element::read_from(reader, e.into_owned())?;
                    el.children.push(Node::Element(child));
                }
                Event::Empty(e) => el.children.push(Node::Element(Element {
                    start: e.into_owned(),
                    children: Vec::new(),
                    empty: true,
                })),
                Event::Text(t) => el.children.push(Node::Text(t.into_owned())),
                Event::End(_) => return Ok(el),
                Event::Eof => {
                    return Err(StiffError::malformed(format!(
                        "unexpected end of input inside <{}>",
                        el.name()
                    )));
                }
                other => el.children.push(Node::Other(other.into_owned())),
            }
            buf.clear();
        }
    }

    /// Wrap an empty-element tag.
    pub fn from_empty(start: BytesStart<'static>) -> Self {
        Element {
            start,
            children: Vec::new(),
            empty: true,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if self.empty && self.children.is_empty() {
            writer.write_event(Event::Empty(self.start.borrow()))?;
            return Ok(());
        }
        writer.write_event(Event::Start(self.start.borrow()))?;
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_to(writer)?,
                Node::Text(text) => writer.write_event(Event::Text(text.clone()))?,
                Node::Other(event) => writer.write_event(event)?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name())))?;
        Ok(())
    }

    /// Serialise to a string, for tests and diagnostics.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    /// Parse a standalone fragment containing one root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let start = e.into_owned();
                    return Element::read_from(&mut reader, start);
                }
                Event::Empty(e) => return Ok(Element::from_empty(e.into_owned())),
                Event::Eof => return Err(StiffError::malformed("no root element")),
                _ => {}
            }
            buf.clear();
        }
    }
}

pub fn is_blank(text: &BytesText<'_>) -> bool {
    text.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTENCE: &str = "<sentence id=\"3\">\n  <text id=\"fi-tok\" lang=\"fi\">Hyvä &amp; ystäväni</text>\n  <annotations>\n    <annotation id=\"0\" lang=\"fi\">a</annotation>\n    <annotation id=\"1\" lang=\"fi\">b</annotation>\n  </annotations>\n</sentence>";

    #[test]
    fn untouched_tree_round_trips_bytes() {
        let el = Element::parse(SENTENCE).unwrap();
        assert_eq!(el.to_xml().unwrap(), SENTENCE);
        assert_eq!(el.child("text").unwrap().text().unwrap(), "Hyvä & ystäväni");
    }

    #[test]
    fn retain_drops_element_and_its_indent() {
        let mut el = Element::parse(SENTENCE).unwrap();
        el.child_mut("annotations")
            .unwrap()
            .retain_elements(|idx, _| idx != 0);
        let xml = el.to_xml().unwrap();
        assert!(!xml.contains(">a<"));
        assert!(xml.contains("<annotations>\n    <annotation id=\"1\""));
    }

    #[test]
    fn set_attr_keeps_attribute_order() {
        let mut el = Element::new("annotation")
            .with_attr("id", "1")
            .with_attr("lemma", "a&b");
        el.set_attr("id", "2").unwrap();
        el.set_attr("rank", "1").unwrap();
        assert_eq!(
            el.to_xml().unwrap(),
            "<annotation id=\"2\" lemma=\"a&amp;b\" rank=\"1\"/>"
        );
        el.remove_attr("lemma").unwrap();
        assert_eq!(el.attr("lemma").unwrap(), None);
    }
}
