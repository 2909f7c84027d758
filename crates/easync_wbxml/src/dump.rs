//! Human-readable views of a tag stream, for debugging and the CLI.

use crate::decoder::{Decoder, Event};
use crate::error::WbxmlResult;
use crate::tag::Tag;
use serde::Serialize;
use std::fmt::Write as _;

/// One element of a decoded document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Qualified tag name, e.g. `AirSync:SyncKey`.
    pub tag: String,
    /// Text content, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Length of an opaque payload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque_len: Option<usize>,
    /// Child elements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    fn new(tag: Tag) -> Self {
        Self {
            tag: tag.to_string(),
            text: None,
            opaque_len: None,
            children: Vec::new(),
        }
    }
}

/// Decodes a document into a tree. Returns `None` for an empty document.
///
/// # Errors
///
/// Returns an error if the stream is malformed.
pub fn tree(bytes: &[u8]) -> WbxmlResult<Option<Node>> {
    let mut decoder = Decoder::new(bytes);
    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;
    loop {
        match decoder.next_event()? {
            Event::Start(tag) => stack.push(Node::new(tag)),
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::Opaque(data) => {
                if let Some(node) = stack.last_mut() {
                    node.opaque_len = Some(data.len());
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
            }
            Event::EndDocument => return Ok(root),
        }
    }
}

/// Renders a document as indented pseudo-XML.
///
/// # Errors
///
/// Returns an error if the stream is malformed.
pub fn dump(bytes: &[u8]) -> WbxmlResult<String> {
    let mut out = String::new();
    if let Some(root) = tree(bytes)? {
        render(&root, 0, &mut out);
    }
    Ok(out)
}

fn render(node: &Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match (&node.text, node.opaque_len, node.children.is_empty()) {
        (Some(text), _, true) => {
            let _ = writeln!(out, "{indent}<{0}>{text}</{0}>", node.tag);
        }
        (None, Some(len), true) => {
            let _ = writeln!(out, "{indent}<{0}>[{len} bytes]</{0}>", node.tag);
        }
        (None, None, true) => {
            let _ = writeln!(out, "{indent}<{}/>", node.tag);
        }
        _ => {
            let _ = writeln!(out, "{indent}<{}>", node.tag);
            for child in &node.children {
                render(child, depth + 1, out);
            }
            let _ = writeln!(out, "{indent}</{}>", node.tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::{airsync, ping};
    use crate::Serializer;

    #[test]
    fn dump_renders_nesting() {
        let mut s = Serializer::new();
        s.start(ping::PING)
            .data(ping::STATUS, "2")
            .start(ping::FOLDERS)
            .data(ping::FOLDER, "7")
            .end()
            .end();
        let text = dump(&s.done().unwrap()).unwrap();
        assert_eq!(
            text,
            "<Ping:Ping>\n  <Ping:Status>2</Ping:Status>\n  <Ping:Folders>\n    <Ping:Folder>7</Ping:Folder>\n  </Ping:Folders>\n</Ping:Ping>\n"
        );
    }

    #[test]
    fn tree_marks_empty_and_opaque() {
        let mut s = Serializer::new();
        s.start(airsync::SYNC)
            .empty_tag(airsync::MORE_AVAILABLE)
            .opaque(airsync::SYNC_KEY, b"xyz")
            .end();
        let root = tree(&s.done().unwrap()).unwrap().unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].tag, "AirSync:MoreAvailable");
        assert_eq!(root.children[1].opaque_len, Some(3));
    }

    #[test]
    fn empty_document_has_no_tree() {
        assert_eq!(tree(&[0x03, 0x01, 0x6A, 0x00]).unwrap(), None);
    }
}
