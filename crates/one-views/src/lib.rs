//! one-views — the dual-mode view engine of the one runtime.
//!
//! One template body, two execution modes: a markup pass turns the view
//! definition into text, a scan pass re-derives the exact same view
//! hierarchy, state wiring and event wiring against markup a server render
//! already produced — without regenerating a byte of it. Both paths hang off
//! the sentinel markers and the hydration manifest carried by the rendered
//! tree.
//!
//! - [`state`]: per-view reactive state slots with a construction write-lock
//! - [`section`]: the define/yield named-content channel between views
//! - [`following`]: independently re-renderable fragments tied to state keys
//! - [`manifest`]: the server-delivered hydration manifest
//! - [`template`]: the dual-mode template primitive surface
//! - [`view`]: the view node — state, children, blocks, superview link
//! - [`directory`]: path resolution, instance cache, the superview driver
//!   loop and the reinsertion decision
//! - [`router`]: path matching, navigation, hydrate-or-render entry
//! - [`schedule`]: the deferred flush queue backing batched notifications

#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod following;
pub mod ids;
pub mod manifest;
pub mod router;
pub mod schedule;
pub mod section;
pub mod state;
pub mod template;
pub mod view;

pub use config::{DirectoryConfig, RouterConfig};
pub use directory::{LoadResult, SharedDirectory, ViewDirectory};
pub use error::{ManifestError, ViewError};
pub use events::{Event, EventBindings, EventHandler};
pub use following::{BlockHandle, FollowingBlock};
pub use ids::next_id;
pub use manifest::{ChildRecord, DataMap, FollowingRecord, ManifestStore, ViewRecord};
pub use router::{
	ActiveRoute, ActiveRouteCache, Params, Route, RouteMatch, RoutePattern, Router, normalize_path,
	parse_url_parts,
};
pub use schedule::{SharedQueue, TaskQueue};
pub use section::{SectionKind, SectionRegistry};
pub use state::{Setter, StateValue, Subscription, ViewState};
pub use template::{LoopContext, RenderMode, TemplateScope, ViewTemplate, foreach};
pub use view::{ChildScope, SERVER_RENDERED_ATTR, VIEW_ID_ATTR, ViewHandle, ViewNode};
