//! Tree serialization back to markup text.

use crate::node::{NodeId, NodeKind};
use crate::parse::VOID_ELEMENTS;
use crate::tree::Document;

/// Escapes a string for use in an attribute value.
pub fn escape_attr(value: &str) -> String {
	value
		.replace('&', "&amp;")
		.replace('"', "&quot;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

/// Escapes a string for use as text content.
pub fn escape_text(value: &str) -> String {
	value
		.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

/// Serializes a node and its subtree.
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
	let mut out = String::new();
	write_node(doc, id, &mut out);
	out
}

/// Serializes the children of a node (the node's inner markup).
pub fn serialize_children(doc: &Document, id: NodeId) -> String {
	let mut out = String::new();
	for &child in doc.children(id) {
		write_node(doc, child, &mut out);
	}
	out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
	match doc.node(id).kind() {
		NodeKind::Text(text) => out.push_str(&escape_text(text)),
		NodeKind::Comment(text) => {
			out.push_str("<!--");
			out.push_str(text);
			out.push_str("-->");
		}
		NodeKind::Element { tag, attributes } => {
			out.push('<');
			out.push_str(tag);
			for (name, value) in attributes {
				out.push(' ');
				out.push_str(name);
				out.push_str("=\"");
				out.push_str(&escape_attr(value));
				out.push('"');
			}
			out.push('>');
			if VOID_ELEMENTS.contains(&tag.as_str()) {
				return;
			}
			for &child in doc.children(id) {
				write_node(doc, child, out);
			}
			out.push_str("</");
			out.push_str(tag);
			out.push('>');
		}
	}
}
