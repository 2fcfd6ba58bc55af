//! one-dom — rendered-tree model for the one runtime.
//!
//! This crate carries the tree the view engine reconciles against:
//!
//! - [`tree`]: the node arena with live sibling order
//! - [`parse`]: markup-fragment parsing and splicing
//! - [`serialize`]: markup serialization and escaping
//! - [`sentinel`]: the `[one:<tag>]` / `[/one:<tag>]` comment marker grammar
//! - [`detector`]: stack-based sentinel pairing over the comment walk
//! - [`locator`]: tag + attribute-signature range lookup with first/last/all
//!   limit semantics
//!
//! On the web target the arena is mirrored 1:1 onto the browser DOM by the
//! host shell; every semantic here is defined against the arena alone.

#![warn(missing_docs)]

pub mod detector;
pub mod locator;
pub mod node;
pub mod parse;
pub mod sentinel;
pub mod serialize;

pub mod tree;

pub use detector::{RegionDetector, RegionPair, nodes_between};
pub use locator::{Limit, Locator, MarkupRange, RangeCollection};
pub use node::{Node, NodeId, NodeKind};
pub use parse::{insert_markup_before, parse_fragment, set_inner_markup};
pub use sentinel::{NAMESPACE, Sentinel, close_marker, open_marker, qualified};
pub use serialize::{escape_attr, escape_text, serialize_children, serialize_node};
pub use tree::{Document, SharedDocument};
