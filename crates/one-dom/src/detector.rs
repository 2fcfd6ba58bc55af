//! Sentinel region detection.
//!
//! Walks every comment node in the tree, pairs open/close sentinels with a
//! stack (a close matches the nearest unmatched open of the same full name)
//! and yields the live nodes between each pair. Only pairs sharing a parent
//! form a region; mismatched pairs are skipped with a warning.

use tracing::warn;

use crate::node::NodeId;
use crate::sentinel::Sentinel;
use crate::tree::Document;

/// A matched sentinel pair and the nodes between them.
#[derive(Debug, Clone)]
pub struct RegionPair {
	/// Full qualified sentinel name, e.g. `one:view`.
	pub full_name: String,
	/// The open sentinel comment node.
	pub open: NodeId,
	/// The close sentinel comment node.
	pub close: NodeId,
	/// Attributes recorded on the open sentinel.
	pub attributes: Vec<(String, String)>,
	/// Live siblings between open (exclusive) and close (exclusive).
	pub nodes: Vec<NodeId>,
}

/// Detects sentinel-delimited regions, caching the comment walk.
///
/// The comment-node list is the expensive part of a scan; it is cached until
/// [`clear_cache`](Self::clear_cache) is called. Pairing itself is recomputed
/// on every scan so region node lists are always live.
#[derive(Debug, Default)]
pub struct RegionDetector {
	cached_comments: Option<Vec<NodeId>>,
}

impl RegionDetector {
	/// Creates a detector with an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Drops the cached comment walk; the next scan re-walks the tree.
	pub fn clear_cache(&mut self) {
		self.cached_comments = None;
	}

	/// Finds all regions whose full name matches `pattern` (supports `*`).
	pub fn scan(&mut self, doc: &Document, pattern: &str) -> Vec<RegionPair> {
		let comments = match &self.cached_comments {
			Some(cached) => cached.clone(),
			None => {
				let walked = doc.comments();
				self.cached_comments = Some(walked.clone());
				walked
			}
		};

		let mut pairs = Vec::new();
		let mut stack: Vec<(String, NodeId, Vec<(String, String)>)> = Vec::new();

		for id in comments {
			let Some(text) = doc.node(id).comment_text() else {
				continue;
			};
			let Some(sentinel) = Sentinel::parse(text) else {
				continue;
			};
			if !pattern_matches(sentinel.name(), pattern) {
				continue;
			}
			match sentinel {
				Sentinel::Open { name, attributes } => {
					stack.push((name, id, attributes));
				}
				Sentinel::Close { name } => {
					let Some(position) = stack.iter().rposition(|(n, _, _)| *n == name) else {
						warn!(sentinel = %name, "unmatched close sentinel");
						continue;
					};
					let (full_name, open, attributes) = stack.remove(position);
					let Some(nodes) = nodes_between(doc, open, id) else {
						warn!(sentinel = %full_name, "sentinel pair spans different parents");
						continue;
					};
					pairs.push(RegionPair {
						full_name,
						open,
						close: id,
						attributes,
						nodes,
					});
				}
			}
		}

		pairs
	}
}

/// Live sibling-walk between two nodes, or `None` when they do not share a
/// parent.
pub fn nodes_between(doc: &Document, start: NodeId, end: NodeId) -> Option<Vec<NodeId>> {
	if doc.parent(start)? != doc.parent(end)? {
		return None;
	}
	let mut nodes = Vec::new();
	let mut current = doc.next_sibling(start);
	while let Some(node) = current {
		if node == end {
			return Some(nodes);
		}
		nodes.push(node);
		current = doc.next_sibling(node);
	}
	// close precedes open in sibling order
	None
}

fn pattern_matches(name: &str, pattern: &str) -> bool {
	if pattern == "*" || pattern == "*:*" {
		return true;
	}
	wildcard_match(name, pattern)
}

fn wildcard_match(name: &str, pattern: &str) -> bool {
	match pattern.split_once('*') {
		None => name == pattern,
		Some((prefix, rest)) => match name.strip_prefix(prefix) {
			None => false,
			Some(mut remaining) => {
				if rest.is_empty() {
					return true;
				}
				loop {
					if wildcard_match(remaining, rest) {
						return true;
					}
					match remaining.char_indices().nth(1) {
						Some((offset, _)) => remaining = &remaining[offset..],
						None => return remaining.is_empty() && wildcard_match("", rest),
					}
				}
			}
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parse::set_inner_markup;

	fn fixture() -> (Document, NodeId) {
		let mut doc = Document::new();
		let body = doc.create_element("body");
		let root = doc.root();
		doc.append_child(root, body);
		(doc, body)
	}

	#[test]
	fn test_scan_pairs_regions() {
		let (mut doc, body) = fixture();
		set_inner_markup(
			&mut doc,
			body,
			"<!-- [one:view name=\"a\" id=\"v-1\"] --><p>x</p><!-- [/one:view] -->",
		);
		let mut detector = RegionDetector::new();
		let pairs = detector.scan(&doc, "one:view");
		assert_eq!(pairs.len(), 1);
		assert_eq!(pairs[0].full_name, "one:view");
		assert_eq!(pairs[0].nodes.len(), 1);
		assert_eq!(
			pairs[0].attributes,
			vec![
				("name".to_string(), "a".to_string()),
				("id".to_string(), "v-1".to_string()),
			]
		);
	}

	#[test]
	fn test_scan_nested_same_name() {
		let (mut doc, body) = fixture();
		set_inner_markup(
			&mut doc,
			body,
			"<!-- [one:block id=\"outer\"] --><!-- [one:block id=\"inner\"] -->\
			 <i>x</i><!-- [/one:block] --><!-- [/one:block] -->",
		);
		let mut detector = RegionDetector::new();
		let pairs = detector.scan(&doc, "one:block");
		assert_eq!(pairs.len(), 2);
		// innermost close pairs with the nearest open
		assert_eq!(pairs[0].attributes[0].1, "inner");
		assert_eq!(pairs[1].attributes[0].1, "outer");
		// outer region contains the inner sentinels plus its contents
		assert_eq!(pairs[1].nodes.len(), 3);
	}

	#[test]
	fn test_scan_wildcard_pattern() {
		let (mut doc, body) = fixture();
		set_inner_markup(
			&mut doc,
			body,
			"<!-- [one:view id=\"v\"] --><!-- [/one:view] -->\
			 <!-- [one:follow id=\"f\"] --><!-- [/one:follow] -->",
		);
		let mut detector = RegionDetector::new();
		assert_eq!(detector.scan(&doc, "one:*").len(), 2);
		assert_eq!(detector.scan(&doc, "one:follow").len(), 1);
		assert_eq!(detector.scan(&doc, "*").len(), 2);
	}

	#[test]
	fn test_scan_ignores_unmatched_close() {
		let (mut doc, body) = fixture();
		set_inner_markup(&mut doc, body, "<!-- [/one:view] --><p>x</p>");
		let mut detector = RegionDetector::new();
		assert!(detector.scan(&doc, "one:view").is_empty());
	}

	#[test]
	fn test_cache_and_clear() {
		let (mut doc, body) = fixture();
		set_inner_markup(
			&mut doc,
			body,
			"<!-- [one:view id=\"v\"] --><!-- [/one:view] -->",
		);
		let mut detector = RegionDetector::new();
		assert_eq!(detector.scan(&doc, "one:view").len(), 1);

		// new sentinels are invisible until the cache is cleared
		let appended = crate::parse::parse_fragment(
			&mut doc,
			"<!-- [one:view id=\"w\"] --><!-- [/one:view] -->",
		);
		for node in appended {
			doc.append_child(body, node);
		}
		assert_eq!(detector.scan(&doc, "one:view").len(), 1);
		detector.clear_cache();
		assert_eq!(detector.scan(&doc, "one:view").len(), 2);
	}
}
