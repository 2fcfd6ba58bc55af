//! Node model for the rendered tree.
//!
//! Nodes live in an arena owned by [`Document`](crate::tree::Document) and are
//! addressed by [`NodeId`]. Three node kinds exist: elements, text and
//! comments. Comment nodes double as sentinel carriers for region markers.

use std::fmt;

/// Arena index of a node inside a [`Document`](crate::tree::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	/// Returns the raw arena index.
	pub fn index(self) -> usize {
		self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// The kind of a rendered-tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	/// An element with a tag name and ordered attributes.
	Element {
		/// Lowercased tag name.
		tag: String,
		/// Attributes in definition order.
		attributes: Vec<(String, String)>,
	},
	/// A text node.
	Text(String),
	/// A comment node. Sentinel markers are carried as comments.
	Comment(String),
}

/// A single node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
	pub(crate) kind: NodeKind,
	pub(crate) parent: Option<NodeId>,
	pub(crate) children: Vec<NodeId>,
}

impl Node {
	pub(crate) fn new(kind: NodeKind) -> Self {
		Self {
			kind,
			parent: None,
			children: Vec::new(),
		}
	}

	/// Returns the node kind.
	pub fn kind(&self) -> &NodeKind {
		&self.kind
	}

	/// Returns the element tag name, if this is an element.
	pub fn tag(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	/// Returns an attribute value, if this is an element carrying it.
	pub fn attribute(&self, name: &str) -> Option<&str> {
		match &self.kind {
			NodeKind::Element { attributes, .. } => attributes
				.iter()
				.find(|(k, _)| k == name)
				.map(|(_, v)| v.as_str()),
			_ => None,
		}
	}

	/// Returns true if this is an element with the given attribute present.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attribute(name).is_some()
	}

	/// Returns the comment text, if this is a comment node.
	pub fn comment_text(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Comment(text) => Some(text),
			_ => None,
		}
	}

	/// Returns the text content, if this is a text node.
	pub fn text(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Text(text) => Some(text),
			_ => None,
		}
	}

	/// Returns true for element nodes.
	pub fn is_element(&self) -> bool {
		matches!(self.kind, NodeKind::Element { .. })
	}

	/// Returns true for comment nodes.
	pub fn is_comment(&self) -> bool {
		matches!(self.kind, NodeKind::Comment(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_node_kind_accessors() {
		let node = Node::new(NodeKind::Element {
			tag: "div".to_string(),
			attributes: vec![("class".to_string(), "card".to_string())],
		});
		assert_eq!(node.tag(), Some("div"));
		assert_eq!(node.attribute("class"), Some("card"));
		assert!(node.has_attribute("class"));
		assert!(!node.has_attribute("id"));
		assert!(node.is_element());
		assert!(!node.is_comment());
	}

	#[test]
	fn test_comment_and_text_accessors() {
		let comment = Node::new(NodeKind::Comment(" [one:view] ".to_string()));
		assert_eq!(comment.comment_text(), Some(" [one:view] "));
		assert!(comment.is_comment());

		let text = Node::new(NodeKind::Text("hello".to_string()));
		assert_eq!(text.text(), Some("hello"));
		assert_eq!(text.tag(), None);
	}
}
