//! XML parser that builds [`Document`]s.
//!
//! Uses quick-xml's streaming API. Adjacent text and CDATA sections become a
//! single text node; the XML declaration, DOCTYPE and anything outside the
//! root element are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fmes::indextree::NodeId;
use fmes::{Document, ElementData, NodeKind};
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::trace;

/// What to keep while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Drop text nodes made only of whitespace (indentation, mostly).
    pub ignore_whitespace: bool,
    pub ignore_comments: bool,
    pub ignore_processing_instructions: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            ignore_whitespace: true,
            ignore_comments: false,
            ignore_processing_instructions: false,
        }
    }
}

/// Parses XML from a string.
pub fn parse_str(xml: &str, options: &ParseOptions) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;
    parse_reader(&mut reader, options)
}

/// Parses XML from a file.
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Document> {
    let file = File::open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;
    parse_reader(&mut reader, options)
}

fn parse_reader<R: BufRead>(reader: &mut Reader<R>, options: &ParseOptions) -> Result<Document> {
    let mut builder = TreeBuilder::new(options);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let element = parse_element(e, reader)?;
                builder.open(element, false)?;
            }
            Ok(Event::Empty(ref e)) => {
                let element = parse_element(e, reader)?;
                builder.open(element, true)?;
            }
            Ok(Event::End(_)) => builder.close(),
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
                let text = unescape(raw).map_err(|e| Error::Parse(e.to_string()))?;
                builder.text(&text);
            }
            Ok(Event::CData(ref e)) => {
                builder.text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::Comment(ref e)) => {
                builder.comment(String::from_utf8_lossy(e.as_ref()).into_owned());
            }
            Ok(Event::PI(ref e)) => {
                let content = String::from_utf8_lossy(e.as_ref());
                let content = content.trim();
                let (target, data) = match content.find(char::is_whitespace) {
                    Some(split) => (&content[..split], content[split..].trim_start()),
                    None => (content, ""),
                };
                builder.processing_instruction(target, data);
            }
            Ok(Event::Eof) => break,
            // XML declaration, DOCTYPE
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Parse(format!(
                    "error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
        buf.clear();
    }

    builder.finish()
}

/// Parses an element's name and attributes.
fn parse_element<R>(e: &BytesStart<'_>, reader: &Reader<R>) -> Result<ElementData> {
    let name = reader
        .decoder()
        .decode(e.name().as_ref())
        .map_err(|e| Error::Parse(e.to_string()))?
        .into_owned();

    let mut element = ElementData::new(name);
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| Error::Parse(format!("attribute error: {e}")))?;
        let key = reader
            .decoder()
            .decode(attr.key.as_ref())
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        element.attrs.insert(key, value);
    }
    Ok(element)
}

/// Appends parsed nodes to a document, tracking the open elements.
struct TreeBuilder<'o> {
    doc: Document,
    open: Vec<NodeId>,
    pending_text: Option<String>,
    options: &'o ParseOptions,
}

impl<'o> TreeBuilder<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        let doc = Document::new();
        let open = vec![doc.root];
        Self {
            doc,
            open,
            pending_text: None,
            options,
        }
    }

    /// The innermost open element, or `None` outside the root element.
    fn parent(&self) -> Option<NodeId> {
        match self.open.as_slice() {
            [_document] => None,
            [.., last] => Some(*last),
            [] => None,
        }
    }

    fn flush_text(&mut self) {
        let Some(text) = self.pending_text.take() else {
            return;
        };
        if self.options.ignore_whitespace && text.trim().is_empty() {
            return;
        }
        if let Some(parent) = self.parent() {
            self.doc.append(parent, NodeKind::Text(text));
        }
    }

    fn open(&mut self, element: ElementData, empty: bool) -> Result<()> {
        self.flush_text();
        let parent = match self.parent() {
            Some(parent) => parent,
            None if self.doc.document_element().is_some() => {
                return Err(Error::Parse(format!("second root element <{}>", element.name)));
            }
            None => self.doc.root,
        };
        trace!(name = %element.name, "open element");
        let id = self.doc.append(parent, NodeKind::Element(element));
        if !empty {
            self.open.push(id);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.flush_text();
        if self.open.len() > 1 {
            self.open.pop();
        }
    }

    fn text(&mut self, text: &str) {
        match &mut self.pending_text {
            Some(existing) => existing.push_str(text),
            None => self.pending_text = Some(text.to_owned()),
        }
    }

    fn comment(&mut self, text: String) {
        self.flush_text();
        if self.options.ignore_comments {
            return;
        }
        if let Some(parent) = self.parent() {
            self.doc.append(parent, NodeKind::Comment(text));
        }
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.flush_text();
        if self.options.ignore_processing_instructions {
            return;
        }
        if let Some(parent) = self.parent() {
            self.doc
                .append(parent, NodeKind::processing_instruction(target, data));
        }
    }

    fn finish(mut self) -> Result<Document> {
        self.flush_text();
        if self.doc.document_element().is_none() {
            return Err(Error::NoRootElement);
        }
        Ok(self.doc)
    }
}
