//! Markup-fragment parsing.
//!
//! View templates and following blocks produce markup strings; the runtime
//! splices them into the rendered tree through the helpers here. The parser is
//! deliberately forgiving: malformed input degrades to text or gets dropped,
//! it never fails. Unclosed elements are closed at end of input.

use crate::node::NodeId;
use crate::tree::Document;

pub(crate) const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

/// Parses a markup fragment into detached nodes, returned in document order.
pub fn parse_fragment(doc: &mut Document, markup: &str) -> Vec<NodeId> {
	Parser::new(doc, markup).run()
}

/// Replaces the children of `parent` with the parsed fragment.
pub fn set_inner_markup(doc: &mut Document, parent: NodeId, markup: &str) {
	let nodes = parse_fragment(doc, markup);
	doc.replace_children(parent, nodes);
}

/// Splices the parsed fragment immediately before `reference`.
///
/// Returns the inserted top-level nodes, or an empty list when the reference
/// node is detached.
pub fn insert_markup_before(doc: &mut Document, reference: NodeId, markup: &str) -> Vec<NodeId> {
	let nodes = parse_fragment(doc, markup);
	for &node in &nodes {
		if !doc.insert_before(reference, node) {
			return Vec::new();
		}
	}
	nodes
}

struct Parser<'a> {
	doc: &'a mut Document,
	input: &'a [u8],
	pos: usize,
	// open element stack; roots collect finished top-level nodes
	stack: Vec<NodeId>,
	roots: Vec<NodeId>,
}

impl<'a> Parser<'a> {
	fn new(doc: &'a mut Document, markup: &'a str) -> Self {
		Self {
			doc,
			input: markup.as_bytes(),
			pos: 0,
			stack: Vec::new(),
			roots: Vec::new(),
		}
	}

	fn run(mut self) -> Vec<NodeId> {
		while self.pos < self.input.len() {
			if self.starts_with(b"<!--") {
				self.parse_comment();
			} else if self.starts_with(b"</") {
				self.parse_close_tag();
			} else if self.input[self.pos] == b'<' && self.tag_follows() {
				self.parse_open_tag();
			} else {
				self.parse_text();
			}
		}
		self.roots
	}

	fn starts_with(&self, prefix: &[u8]) -> bool {
		self.input[self.pos..].starts_with(prefix)
	}

	fn tag_follows(&self) -> bool {
		self.input
			.get(self.pos + 1)
			.is_some_and(|b| b.is_ascii_alphabetic())
	}

	fn attach(&mut self, node: NodeId) {
		match self.stack.last() {
			Some(&parent) => self.doc.append_child(parent, node),
			None => self.roots.push(node),
		}
	}

	fn parse_comment(&mut self) {
		self.pos += 4;
		let start = self.pos;
		let end = find_sub(self.input, b"-->", self.pos).unwrap_or(self.input.len());
		let text = String::from_utf8_lossy(&self.input[start..end]).into_owned();
		self.pos = (end + 3).min(self.input.len());
		let comment = self.doc.create_comment(&text);
		self.attach(comment);
	}

	fn parse_close_tag(&mut self) {
		self.pos += 2;
		let start = self.pos;
		while self.pos < self.input.len() && self.input[self.pos] != b'>' {
			self.pos += 1;
		}
		let name = String::from_utf8_lossy(&self.input[start..self.pos])
			.trim()
			.to_ascii_lowercase();
		if self.pos < self.input.len() {
			self.pos += 1;
		}
		// pop to the matching open element; unknown close tags are dropped
		if let Some(depth) = self
			.stack
			.iter()
			.rposition(|&id| self.doc.tag_name(id) == Some(name.as_str()))
		{
			self.stack.truncate(depth);
		}
	}

	fn parse_open_tag(&mut self) {
		self.pos += 1;
		let start = self.pos;
		while self.pos < self.input.len()
			&& (self.input[self.pos].is_ascii_alphanumeric() || self.input[self.pos] == b'-')
		{
			self.pos += 1;
		}
		let tag = String::from_utf8_lossy(&self.input[start..self.pos]).to_ascii_lowercase();
		let element = self.doc.create_element(&tag);

		let mut self_closing = false;
		loop {
			self.skip_whitespace();
			match self.input.get(self.pos) {
				None => break,
				Some(b'>') => {
					self.pos += 1;
					break;
				}
				Some(b'/') => {
					self_closing = true;
					self.pos += 1;
				}
				Some(_) => {
					if let Some((name, value)) = self.parse_attribute() {
						self.doc.set_attribute(element, &name, &value);
					}
				}
			}
		}

		self.attach(element);
		if !self_closing && !VOID_ELEMENTS.contains(&tag.as_str()) {
			self.stack.push(element);
		}
	}

	fn parse_attribute(&mut self) -> Option<(String, String)> {
		let start = self.pos;
		while self.pos < self.input.len()
			&& !matches!(self.input[self.pos], b'=' | b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r')
		{
			self.pos += 1;
		}
		if self.pos == start {
			// stray byte, skip to avoid an infinite loop
			self.pos += 1;
			return None;
		}
		let name = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
		self.skip_whitespace();
		if self.input.get(self.pos) != Some(&b'=') {
			return Some((name, String::new()));
		}
		self.pos += 1;
		self.skip_whitespace();
		let value = match self.input.get(self.pos) {
			Some(&quote @ (b'"' | b'\'')) => {
				self.pos += 1;
				let start = self.pos;
				while self.pos < self.input.len() && self.input[self.pos] != quote {
					self.pos += 1;
				}
				let raw = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
				if self.pos < self.input.len() {
					self.pos += 1;
				}
				raw
			}
			_ => {
				let start = self.pos;
				while self.pos < self.input.len()
					&& !matches!(self.input[self.pos], b'>' | b' ' | b'\t' | b'\n' | b'\r')
				{
					self.pos += 1;
				}
				String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
			}
		};
		Some((name, unescape(&value)))
	}

	fn parse_text(&mut self) {
		let start = self.pos;
		while self.pos < self.input.len() {
			if self.input[self.pos] == b'<'
				&& (self.starts_with(b"<!--") || self.starts_with(b"</") || self.tag_follows())
			{
				break;
			}
			self.pos += 1;
		}
		let raw = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
		if !raw.is_empty() {
			let text = self.doc.create_text(&unescape(&raw));
			self.attach(text);
		}
	}

	fn skip_whitespace(&mut self) {
		while self
			.input
			.get(self.pos)
			.is_some_and(|b| b.is_ascii_whitespace())
		{
			self.pos += 1;
		}
	}
}

fn find_sub(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
	haystack[from..]
		.windows(needle.len())
		.position(|w| w == needle)
		.map(|p| p + from)
}

fn unescape(value: &str) -> String {
	value
		.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&#39;", "'")
		.replace("&amp;", "&")
}
