//! Sentinel marker grammar.
//!
//! Logical regions of the rendered tree are delimited by paired non-rendering
//! comment nodes: an open sentinel `[one:<tag> <attr>="<val>" ...]` and a
//! matching close sentinel `[/one:<tag>]`. Attributes on the open sentinel are
//! the matching key space for range lookup.

use std::fmt::Write;

/// The sentinel namespace prefix.
pub const NAMESPACE: &str = "one";

/// Qualifies a short tag with the sentinel namespace (`view` → `one:view`).
pub fn qualified(tag: &str) -> String {
	format!("{}:{}", NAMESPACE, tag)
}

/// A parsed sentinel carried by a comment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sentinel {
	/// An opening sentinel with its attribute set.
	Open {
		/// Full qualified name, e.g. `one:view`.
		name: String,
		/// Attributes in written order.
		attributes: Vec<(String, String)>,
	},
	/// A closing sentinel.
	Close {
		/// Full qualified name, e.g. `one:view`.
		name: String,
	},
}

impl Sentinel {
	/// Parses a comment body. Returns `None` for ordinary comments.
	pub fn parse(text: &str) -> Option<Self> {
		let text = text.trim();
		if !(text.starts_with('[') && text.ends_with(']')) {
			return None;
		}
		let inner = &text[1..text.len() - 1];
		if let Some(name) = inner.strip_prefix('/') {
			let name = name.trim();
			if name.is_empty() || name.contains(']') {
				return None;
			}
			return Some(Self::Close {
				name: name.to_string(),
			});
		}
		let mut rest = inner.trim_start();
		let name_end = rest
			.find(char::is_whitespace)
			.unwrap_or(rest.len());
		let name = &rest[..name_end];
		if name.is_empty() {
			return None;
		}
		rest = rest[name_end..].trim_start();
		let mut attributes = Vec::new();
		while !rest.is_empty() {
			let Some(eq) = rest.find('=') else { break };
			let key = rest[..eq].trim().to_string();
			rest = &rest[eq + 1..];
			if !rest.starts_with('"') {
				break;
			}
			rest = &rest[1..];
			let Some(quote) = rest.find('"') else { break };
			attributes.push((key, rest[..quote].to_string()));
			rest = rest[quote + 1..].trim_start();
		}
		Some(Self::Open {
			name: name.to_string(),
			attributes,
		})
	}

	/// Full qualified name of the sentinel.
	pub fn name(&self) -> &str {
		match self {
			Self::Open { name, .. } | Self::Close { name } => name,
		}
	}
}

/// Formats an open sentinel as comment markup.
pub fn open_marker(tag: &str, attrs: &[(&str, &str)]) -> String {
	let mut out = format!("<!-- [{}", qualified(tag));
	for (key, value) in attrs {
		let _ = write!(out, " {}=\"{}\"", key, value);
	}
	out.push_str("] -->");
	out
}

/// Formats a close sentinel as comment markup.
pub fn close_marker(tag: &str) -> String {
	format!("<!-- [/{}] -->", qualified(tag))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_open() {
		let parsed = Sentinel::parse(" [one:view name=\"web.home\" id=\"v-1\"] ").unwrap();
		match parsed {
			Sentinel::Open { name, attributes } => {
				assert_eq!(name, "one:view");
				assert_eq!(
					attributes,
					vec![
						("name".to_string(), "web.home".to_string()),
						("id".to_string(), "v-1".to_string()),
					]
				);
			}
			_ => panic!("expected open sentinel"),
		}
	}

	#[test]
	fn test_parse_open_without_attributes() {
		let parsed = Sentinel::parse("[one:placeholder]").unwrap();
		assert_eq!(parsed.name(), "one:placeholder");
	}

	#[test]
	fn test_parse_close() {
		let parsed = Sentinel::parse(" [/one:view] ").unwrap();
		assert_eq!(parsed, Sentinel::Close {
			name: "one:view".to_string()
		});
	}

	#[test]
	fn test_parse_rejects_plain_comments() {
		assert_eq!(Sentinel::parse(" just a note "), None);
		assert_eq!(Sentinel::parse("[]"), None);
		assert_eq!(Sentinel::parse("[/]"), None);
	}

	#[test]
	fn test_markers_roundtrip() {
		let open = open_marker("follow", &[("id", "f-1"), ("following", "count,total")]);
		assert_eq!(
			open,
			"<!-- [one:follow id=\"f-1\" following=\"count,total\"] -->"
		);
		assert_eq!(close_marker("follow"), "<!-- [/one:follow] -->");

		let body = open
			.trim_start_matches("<!--")
			.trim_end_matches("-->");
		assert!(matches!(Sentinel::parse(body), Some(Sentinel::Open { .. })));
	}
}
