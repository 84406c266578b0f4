//! XML output for documents and deltas.

use fmes::indextree::NodeId;
use fmes::{Delta, DeltaOp, Document, NodeKind};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};

use crate::error::Result;

/// Serialize a document (everything under its document node) to XML.
///
/// No declaration and no added whitespace, so two structurally equal
/// documents print identically.
pub fn write_document(doc: &Document) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, doc, doc.root)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_node(writer: &mut Writer<Vec<u8>>, doc: &Document, id: NodeId) -> Result<()> {
    match doc.kind(id) {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(writer, doc, child)?;
            }
        }
        NodeKind::Element(elem) => {
            let mut start = BytesStart::new(elem.name.as_str());
            for (name, value) in &elem.attrs {
                start.push_attribute((name.as_str(), value.as_str()));
            }
            if doc.is_leaf(id) {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for child in doc.children(id) {
                    write_node(writer, doc, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(elem.name.as_str())))?;
            }
        }
        NodeKind::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        NodeKind::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
        }
        NodeKind::ProcessingInstruction(pi) => {
            let content = if pi.data.is_empty() {
                pi.target.clone()
            } else {
                format!("{} {}", pi.target, pi.data)
            };
            writer.write_event(Event::PI(BytesPI::new(content)))?;
        }
    }
    Ok(())
}

/// Render a delta as an XML edit script:
///
/// ```xml
/// <delta>
///   <insert parent="/node()[1]" nodetype="1" childno="2" name="b"/>
///   <insert parent="/node()[1]/node()[2]" nodetype="2" name="id">x</insert>
///   <delete node="/node()[1]/node()[3]"/>
///   <move node="/node()[1]/node()[1]" old_charpos="1" new_charpos="1" parent="/node()[1]" childno="3"/>
/// </delta>
/// ```
pub fn write_delta(delta: &Delta) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let header = delta.header();
    let mut root = BytesStart::new("delta");
    if let Some(context) = header.context {
        root.push_attribute(("sib_context", context.sibling.to_string().as_str()));
        root.push_attribute(("par_context", context.parent.to_string().as_str()));
        root.push_attribute((
            "par_sib_context",
            context.parent_sibling.to_string().as_str(),
        ));
    }
    if header.reverse_patch {
        root.push_attribute(("reverse_patch", "true"));
    }
    if !header.resolve_entities {
        root.push_attribute(("resolve_entities", "false"));
    }

    if delta.is_empty() {
        writer.write_event(Event::Empty(root))?;
    } else {
        writer.write_event(Event::Start(root))?;
        for op in delta.ops() {
            write_op(&mut writer, op)?;
        }
        writer.write_event(Event::End(BytesEnd::new("delta")))?;
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_op(writer: &mut Writer<Vec<u8>>, op: &DeltaOp) -> Result<()> {
    let mut attrs: Vec<(&str, String)> = Vec::with_capacity(6);
    let (tag, payload) = match op {
        DeltaOp::Insert {
            parent,
            node_type,
            child_no,
            name,
            char_pos,
            value,
        } => {
            attrs.push(("parent", parent.clone()));
            attrs.push(("nodetype", node_type.code().to_string()));
            if let Some(child_no) = child_no {
                attrs.push(("childno", child_no.to_string()));
            }
            if let Some(name) = name {
                attrs.push(("name", name.clone()));
            }
            if let Some(char_pos) = char_pos {
                attrs.push(("charpos", char_pos.to_string()));
            }
            ("insert", value.as_deref())
        }
        DeltaOp::Delete {
            node,
            char_pos,
            length,
        } => {
            attrs.push(("node", node.clone()));
            if let Some(char_pos) = char_pos {
                attrs.push(("charpos", char_pos.to_string()));
            }
            if let Some(length) = length {
                attrs.push(("length", length.to_string()));
            }
            ("delete", None)
        }
        DeltaOp::Move {
            node,
            old_char_pos,
            parent,
            child_no,
            new_char_pos,
            length,
        } => {
            attrs.push(("node", node.clone()));
            attrs.push(("old_charpos", old_char_pos.to_string()));
            attrs.push(("new_charpos", new_char_pos.to_string()));
            if let Some(length) = length {
                attrs.push(("length", length.to_string()));
            }
            attrs.push(("parent", parent.clone()));
            attrs.push(("childno", child_no.to_string()));
            ("move", None)
        }
    };

    let mut start = BytesStart::new(tag);
    for (name, value) in &attrs {
        start.push_attribute((*name, value.as_str()));
    }
    match payload {
        Some(text) => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        None => writer.write_event(Event::Empty(start))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParseOptions, parse_str};
    use facet_testhelpers::test;

    #[test]
    fn test_write_document_roundtrips() {
        let xml = r#"<a x="1&amp;2"><b/>t &lt; u<!--c--><?pi data?><d><e/></d></a>"#;
        let doc = parse_str(xml, &ParseOptions::default()).unwrap();
        let printed = write_document(&doc).unwrap();
        assert_eq!(printed, xml);
    }

    #[test]
    fn test_empty_delta() {
        let delta = Delta::new(Default::default());
        assert_eq!(write_delta(&delta).unwrap(), "<delta/>");
    }

    #[test]
    fn test_header_attributes() {
        let delta = Delta::new(fmes::DeltaConfig {
            context: Some(fmes::ContextConfig::default()),
            reverse_patch: true,
            resolve_entities: false,
            ..Default::default()
        });
        assert_eq!(
            write_delta(&delta).unwrap(),
            r#"<delta sib_context="2" par_context="1" par_sib_context="0" reverse_patch="true" resolve_entities="false"/>"#
        );
    }
}
