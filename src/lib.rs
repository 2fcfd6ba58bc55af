//! one — a client-side view rendering and hydration runtime.
//!
//! Facade crate re-exporting the workspace members:
//!
//! - [`dom`]: the rendered tree, markup parsing and sentinel-range location
//! - [`views`]: the dual-mode view engine, sections, following blocks,
//!   hydration manifest handling and the client router

pub use one_dom as dom;
pub use one_views as views;

pub use one_dom::{Document, Limit, Locator, MarkupRange, NodeId, SharedDocument};
pub use one_views::{
	DataMap, DirectoryConfig, ManifestStore, Router, RouterConfig, SectionKind, SectionRegistry,
	TemplateScope, ViewDirectory, ViewState, ViewTemplate,
};
