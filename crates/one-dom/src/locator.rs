//! Sentinel-range location.
//!
//! [`Locator::find`] resolves a short sentinel tag plus an attribute filter to
//! the matching [`MarkupRange`]s. An attribute filter matches when every key
//! compares equal on the open sentinel — strict equality, no partial match.
//! No match is never an error: the all-matches form returns an empty
//! collection, the first/last forms return `None`.

use crate::detector::{RegionDetector, RegionPair, nodes_between};
use crate::node::NodeId;
use crate::sentinel::qualified;
use crate::tree::Document;

/// A located contiguous slice of the rendered tree.
///
/// `nodes` always equals the live sibling-walk between the open sentinel
/// (exclusive) and the close sentinel (exclusive); call
/// [`rescan`](Self::rescan) after any external mutation that could have
/// changed the region's contents.
#[derive(Debug, Clone)]
pub struct MarkupRange {
	tag: String,
	full_name: String,
	attributes: Vec<(String, String)>,
	open: NodeId,
	close: NodeId,
	nodes: Vec<NodeId>,
}

impl MarkupRange {
	pub(crate) fn from_pair(pair: RegionPair) -> Self {
		let tag = pair
			.full_name
			.split_once(':')
			.map(|(_, short)| short.to_string())
			.unwrap_or_else(|| pair.full_name.clone());
		Self {
			tag,
			full_name: pair.full_name,
			attributes: pair.attributes,
			open: pair.open,
			close: pair.close,
			nodes: pair.nodes,
		}
	}

	/// Short tag name (`view` for `one:view`).
	pub fn tag(&self) -> &str {
		&self.tag
	}

	/// Full qualified sentinel name.
	pub fn full_name(&self) -> &str {
		&self.full_name
	}

	/// The open sentinel node.
	pub fn open(&self) -> NodeId {
		self.open
	}

	/// The close sentinel node.
	pub fn close(&self) -> NodeId {
		self.close
	}

	/// The contained nodes as of the last scan.
	pub fn nodes(&self) -> &[NodeId] {
		&self.nodes
	}

	/// Reads an attribute recorded on the open sentinel.
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v.as_str())
	}

	/// All recorded attributes.
	pub fn attributes(&self) -> &[(String, String)] {
		&self.attributes
	}

	/// Recomputes the contained nodes from the live tree.
	///
	/// A detached or inverted pair yields an empty node list.
	pub fn rescan(&mut self, doc: &Document) -> &[NodeId] {
		self.nodes = nodes_between(doc, self.open, self.close).unwrap_or_default();
		&self.nodes
	}

	pub(crate) fn matches(&self, filter: &[(&str, &str)]) -> bool {
		filter
			.iter()
			.all(|(key, value)| self.attribute(key) == Some(*value))
	}
}

/// An ordered set of located ranges.
#[derive(Debug, Clone, Default)]
pub struct RangeCollection {
	ranges: Vec<MarkupRange>,
}

impl RangeCollection {
	/// Number of ranges.
	pub fn len(&self) -> usize {
		self.ranges.len()
	}

	/// True when nothing matched.
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	/// First range, if any.
	pub fn first(&self) -> Option<&MarkupRange> {
		self.ranges.first()
	}

	/// Last range, if any.
	pub fn last(&self) -> Option<&MarkupRange> {
		self.ranges.last()
	}

	/// Range at `index`.
	pub fn get(&self, index: usize) -> Option<&MarkupRange> {
		self.ranges.get(index)
	}

	/// Iterates the ranges in document order.
	pub fn iter(&self) -> impl Iterator<Item = &MarkupRange> {
		self.ranges.iter()
	}

	/// Consumes the collection, yielding the first range.
	pub fn into_first(self) -> Option<MarkupRange> {
		self.ranges.into_iter().next()
	}
}

impl IntoIterator for RangeCollection {
	type Item = MarkupRange;
	type IntoIter = std::vec::IntoIter<MarkupRange>;

	fn into_iter(self) -> Self::IntoIter {
		self.ranges.into_iter()
	}
}

/// How many matches [`Locator::find`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
	/// Every match in document order.
	All,
	/// First match only.
	First,
	/// Last match only.
	Last,
}

/// Finds sentinel ranges by tag and attribute signature.
#[derive(Debug, Default)]
pub struct Locator {
	detector: RegionDetector,
}

impl Locator {
	/// Creates a locator with an empty scan cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Drops the cached tree walk. Must be called after external mutation
	/// before ranges are re-derived.
	pub fn rescan(&mut self) {
		self.detector.clear_cache();
	}

	/// Finds ranges whose tag is `tag` and whose attributes match every key
	/// of `filter` exactly.
	pub fn find(
		&mut self,
		doc: &Document,
		tag: &str,
		filter: &[(&str, &str)],
		limit: Limit,
	) -> RangeCollection {
		let pairs = self.detector.scan(doc, &qualified(tag));
		let mut ranges = Vec::new();
		for pair in pairs {
			let range = MarkupRange::from_pair(pair);
			if !range.matches(filter) {
				continue;
			}
			match limit {
				Limit::First => {
					return RangeCollection {
						ranges: vec![range],
					};
				}
				Limit::Last => {
					ranges.clear();
					ranges.push(range);
				}
				Limit::All => ranges.push(range),
			}
		}
		RangeCollection { ranges }
	}

	/// First matching range, or `None`.
	pub fn first(
		&mut self,
		doc: &Document,
		tag: &str,
		filter: &[(&str, &str)],
	) -> Option<MarkupRange> {
		self.find(doc, tag, filter, Limit::First).into_first()
	}

	/// Last matching range, or `None`.
	pub fn last(
		&mut self,
		doc: &Document,
		tag: &str,
		filter: &[(&str, &str)],
	) -> Option<MarkupRange> {
		self.find(doc, tag, filter, Limit::Last).into_first()
	}
}
