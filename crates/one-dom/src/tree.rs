//! The rendered tree.
//!
//! [`Document`] owns an arena of nodes and preserves live sibling order, which
//! is the authoritative document order for every query in the runtime. The
//! engine mutates the tree only through the operations here; removed nodes
//! stay in the arena but are detached, so stale [`NodeId`]s can still be
//! inspected (and recognized as detached) without invalidating other ids.

use std::cell::RefCell;
use std::rc::Rc;

use crate::node::{Node, NodeId, NodeKind};

/// Shared handle to a document, the form every runtime collaborator holds.
pub type SharedDocument = Rc<RefCell<Document>>;

/// The rendered tree: a node arena with a single root element.
#[derive(Debug)]
pub struct Document {
	nodes: Vec<Node>,
	root: NodeId,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	/// Creates a document with an empty `html` root element.
	pub fn new() -> Self {
		let mut nodes = Vec::new();
		nodes.push(Node::new(NodeKind::Element {
			tag: "html".to_string(),
			attributes: Vec::new(),
		}));
		Self {
			nodes,
			root: NodeId(0),
		}
	}

	/// Creates a document and wraps it in the shared handle form.
	pub fn shared() -> SharedDocument {
		Rc::new(RefCell::new(Self::new()))
	}

	/// Returns the root element.
	pub fn root(&self) -> NodeId {
		self.root
	}

	/// Returns a node by id.
	pub fn node(&self, id: NodeId) -> &Node {
		&self.nodes[id.0]
	}

	fn node_mut(&mut self, id: NodeId) -> &mut Node {
		&mut self.nodes[id.0]
	}

	fn push(&mut self, node: Node) -> NodeId {
		self.nodes.push(node);
		NodeId(self.nodes.len() - 1)
	}

	/// Creates a detached element.
	pub fn create_element(&mut self, tag: &str) -> NodeId {
		self.push(Node::new(NodeKind::Element {
			tag: tag.to_ascii_lowercase(),
			attributes: Vec::new(),
		}))
	}

	/// Creates a detached element with initial attributes.
	pub fn create_element_with_attrs(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
		let id = self.create_element(tag);
		for (name, value) in attrs {
			self.set_attribute(id, name, value);
		}
		id
	}

	/// Creates a detached text node.
	pub fn create_text(&mut self, text: &str) -> NodeId {
		self.push(Node::new(NodeKind::Text(text.to_string())))
	}

	/// Creates a detached comment node.
	pub fn create_comment(&mut self, text: &str) -> NodeId {
		self.push(Node::new(NodeKind::Comment(text.to_string())))
	}

	/// Appends `child` as the last child of `parent`, detaching it first if
	/// it already hangs somewhere else.
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
		self.detach(child);
		self.node_mut(child).parent = Some(parent);
		self.node_mut(parent).children.push(child);
	}

	/// Inserts `new` immediately before `reference` under the same parent.
	///
	/// Returns `false` when the reference node is detached; the tree is left
	/// untouched in that case.
	pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> bool {
		let Some(parent) = self.node(reference).parent else {
			return false;
		};
		self.detach(new);
		let position = self
			.node(parent)
			.children
			.iter()
			.position(|&c| c == reference)
			.expect("parent/child links out of sync");
		self.node_mut(new).parent = Some(parent);
		self.node_mut(parent).children.insert(position, new);
		true
	}

	/// Detaches a node from its parent. The subtree stays intact below it.
	pub fn remove_node(&mut self, id: NodeId) {
		self.detach(id);
	}

	fn detach(&mut self, id: NodeId) {
		if let Some(parent) = self.node(id).parent {
			self.node_mut(parent).children.retain(|&c| c != id);
			self.node_mut(id).parent = None;
		}
	}

	/// Detaches every current child of `parent` and attaches `children` in
	/// the given order.
	pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
		let old = std::mem::take(&mut self.node_mut(parent).children);
		for child in old {
			self.node_mut(child).parent = None;
		}
		for child in children {
			self.append_child(parent, child);
		}
	}

	/// Returns the parent of a node.
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.node(id).parent
	}

	/// Returns the children of a node in document order.
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		&self.node(id).children
	}

	/// Returns the next sibling of a node, if any.
	pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
		let parent = self.node(id).parent?;
		let siblings = &self.node(parent).children;
		let position = siblings.iter().position(|&c| c == id)?;
		siblings.get(position + 1).copied()
	}

	/// Returns true if walking parent links from `id` reaches the root.
	pub fn is_attached(&self, id: NodeId) -> bool {
		let mut current = id;
		loop {
			if current == self.root {
				return true;
			}
			match self.node(current).parent {
				Some(parent) => current = parent,
				None => return false,
			}
		}
	}

	/// Returns true if `ancestor` contains `id` (or is `id` itself).
	pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
		let mut current = Some(id);
		while let Some(node) = current {
			if node == ancestor {
				return true;
			}
			current = self.node(node).parent;
		}
		false
	}

	/// Sets (or replaces) an attribute on an element; non-elements no-op.
	pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
		if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
			if let Some(entry) = attributes.iter_mut().find(|(k, _)| k == name) {
				entry.1 = value.to_string();
			} else {
				attributes.push((name.to_string(), value.to_string()));
			}
		}
	}

	/// Reads an attribute from an element.
	pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
		self.node(id).attribute(name)
	}

	/// Removes an attribute from an element.
	pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
		if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
			attributes.retain(|(k, _)| k != name);
		}
	}

	/// Returns the element tag name.
	pub fn tag_name(&self, id: NodeId) -> Option<&str> {
		self.node(id).tag()
	}

	/// Collects the attached subtree below (and including) `from` in
	/// document order.
	pub fn walk(&self, from: NodeId) -> Vec<NodeId> {
		let mut ordered = Vec::new();
		self.walk_into(from, &mut ordered);
		ordered
	}

	fn walk_into(&self, id: NodeId, ordered: &mut Vec<NodeId>) {
		ordered.push(id);
		for &child in &self.node(id).children {
			self.walk_into(child, ordered);
		}
	}

	/// Returns every comment node under the root in document order.
	pub fn comments(&self) -> Vec<NodeId> {
		self.walk(self.root)
			.into_iter()
			.filter(|&id| self.node(id).is_comment())
			.collect()
	}

	/// Finds elements carrying an attribute, optionally with an exact value,
	/// in document order.
	pub fn query_by_attribute(&self, name: &str, value: Option<&str>) -> Vec<NodeId> {
		self.walk(self.root)
			.into_iter()
			.filter(|&id| match self.node(id).attribute(name) {
				Some(found) => value.is_none_or(|expected| found == expected),
				None => false,
			})
			.collect()
	}

	/// Finds elements whose attribute value contains `needle` as a substring,
	/// in document order.
	pub fn query_by_attribute_contains(&self, name: &str, needle: &str) -> Vec<NodeId> {
		self.walk(self.root)
			.into_iter()
			.filter(|&id| {
				self.node(id)
					.attribute(name)
					.is_some_and(|found| found.contains(needle))
			})
			.collect()
	}

	/// Walks up from `id` to the nearest node (inclusive) carrying `name`.
	pub fn closest_with_attribute(&self, id: NodeId, name: &str) -> Option<NodeId> {
		let mut current = Some(id);
		while let Some(node) = current {
			if self.node(node).has_attribute(name) {
				return Some(node);
			}
			current = self.node(node).parent;
		}
		None
	}

	/// Walks up from `id` to the nearest element (inclusive) with the tag.
	pub fn closest_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
		let mut current = Some(id);
		while let Some(node) = current {
			if self.node(node).tag() == Some(tag) {
				return Some(node);
			}
			current = self.node(node).parent;
		}
		None
	}

	/// Concatenated text content below a node.
	pub fn text_content(&self, id: NodeId) -> String {
		self.walk(id)
			.into_iter()
			.filter_map(|n| self.node(n).text().map(str::to_string))
			.collect()
	}
}
