//! Named-content sections.
//!
//! Views exchange content across the extends/include boundary through a
//! registry of named sections: the extending view defines, the layout yields.
//! The registry is an explicit context object created per runtime and reset
//! once per top-level navigation — never ambient module state.
//!
//! Subscribed tree locations pick up changed sections on
//! [`flush`](SectionRegistry::flush) through four concurrent addressing
//! schemes:
//!
//! 1. `data-yield-attr="attr:name,..."` — set each listed attribute whose
//!    section name matches,
//! 2. a boolean marker attribute `data-yield-<name>` — replace inner content,
//! 3. `data-yield-content="<name>"` — replace inner content,
//! 4. `data-yield-children="<name>"` — replace inner content.

use std::collections::HashMap;

use one_dom::{Document, set_inner_markup};
use tracing::debug;

/// Attribute listing `attr:section` subscription pairs.
pub const YIELD_ATTR: &str = "data-yield-attr";
/// Attribute naming a section whose content replaces the element's children.
pub const YIELD_CONTENT: &str = "data-yield-content";
/// Attribute naming a section whose content replaces the element's children.
pub const YIELD_CHILDREN: &str = "data-yield-children";
/// Prefix of the boolean marker attribute scheme.
pub const YIELD_PREFIX: &str = "data-yield-";

/// How section content is applied to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
	/// Plain text; inserted as a text node.
	Text,
	/// Markup; parsed and spliced in.
	Markup,
}

/// Registry of named sections with change tracking.
#[derive(Debug, Default)]
pub struct SectionRegistry {
	sections: HashMap<String, (String, SectionKind)>,
	changed: Vec<String>,
	stacks: HashMap<String, Vec<String>>,
}

impl SectionRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records section content; marks the name dirty only when the content
	/// actually changed.
	pub fn define(&mut self, name: &str, content: &str, kind: SectionKind) {
		let previous = self.sections.get(name).map(|(c, _)| c.as_str());
		if previous != Some(content) && !self.changed.iter().any(|c| c == name) {
			self.changed.push(name.to_string());
		}
		self.sections
			.insert(name.to_string(), (content.to_string(), kind));
	}

	/// Pure read of a section's content; never marks anything dirty.
	pub fn yield_content(&self, name: &str, fallback: &str) -> String {
		self.sections
			.get(name)
			.map(|(content, _)| content.clone())
			.unwrap_or_else(|| fallback.to_string())
	}

	/// True when the section has been defined.
	pub fn has_section(&self, name: &str) -> bool {
		self.sections.contains_key(name)
	}

	/// Names marked dirty since the last flush.
	pub fn changed(&self) -> &[String] {
		&self.changed
	}

	/// True when the name is dirty.
	pub fn is_changed(&self, name: &str) -> bool {
		self.changed.iter().any(|c| c == name)
	}

	/// Appends to a named stack.
	pub fn push(&mut self, name: &str, content: &str) {
		self.stacks
			.entry(name.to_string())
			.or_default()
			.push(content.to_string());
	}

	/// Concatenated content of a named stack.
	pub fn stack(&self, name: &str) -> String {
		self.stacks
			.get(name)
			.map(|entries| entries.concat())
			.unwrap_or_default()
	}

	/// Drops every section, stack and dirty mark. Called once per top-level
	/// navigation.
	pub fn reset(&mut self) {
		self.sections.clear();
		self.changed.clear();
		self.stacks.clear();
	}

	/// Propagates every dirty section to its subscribed tree locations, then
	/// clears dirtiness. Calling flush again with nothing newly dirty is a
	/// no-op.
	pub fn flush(&mut self, doc: &mut Document) {
		let changed = std::mem::take(&mut self.changed);
		for name in &changed {
			let Some((content, kind)) = self.sections.get(name).cloned() else {
				continue;
			};
			debug!(section = %name, "flushing section");

			// 1. attribute subscription lists
			for element in doc.query_by_attribute_contains(YIELD_ATTR, name) {
				let Some(spec) = doc.get_attribute(element, YIELD_ATTR) else {
					continue;
				};
				let targets: Vec<String> = spec
					.split(',')
					.filter_map(|pair| {
						let (attr, section) = pair.split_once(':')?;
						(section.trim() == name).then(|| attr.trim().to_string())
					})
					.collect();
				for attr in targets {
					doc.set_attribute(element, &attr, &content);
				}
			}

			// 2. boolean marker attribute named after the section
			if !name.contains(':') {
				let marker = format!("{}{}", YIELD_PREFIX, name);
				for element in doc.query_by_attribute(&marker, None) {
					apply_inner(doc, element, &content, kind);
				}
			}

			// 3. direct content target
			for element in doc.query_by_attribute(YIELD_CONTENT, Some(name)) {
				apply_inner(doc, element, &content, kind);
			}

			// 4. direct children target
			for element in doc.query_by_attribute(YIELD_CHILDREN, Some(name)) {
				apply_inner(doc, element, &content, kind);
			}
		}
	}
}

fn apply_inner(doc: &mut Document, element: one_dom::NodeId, content: &str, kind: SectionKind) {
	match kind {
		SectionKind::Markup => set_inner_markup(doc, element, content),
		SectionKind::Text => {
			let text = doc.create_text(content);
			doc.replace_children(element, vec![text]);
		}
	}
}

/// Builds the wrapper attributes subscribing an element's attribute to a
/// section: the attribute itself (with current content) plus the
/// `data-yield-attr` pair list entry.
pub fn subscribe_attr(registry: &SectionRegistry, attr: &str, section: &str, fallback: &str) -> String {
	format!(
		" {}=\"{}\" {}=\"{}:{}\"",
		attr,
		one_dom::escape_attr(&registry.yield_content(section, fallback)),
		YIELD_ATTR,
		attr,
		section
	)
}
