//! The template contract.
//!
//! A view's markup logic is one body closure that calls a small set of
//! primitives on a [`TemplateScope`]: emit markup (the returned string),
//! register state, extend a layout, include children, open following blocks,
//! define and yield sections, and stamp event handler attributes. The scope
//! carries a [`RenderMode`] flag selecting between the two primitive
//! behaviors — `Markup` emits text, `Scan` only records relationships against
//! the hydration manifest — so both passes run the identical body.

use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

use crate::directory::ViewDirectory;
use crate::error::ViewError;
use crate::events::{Event, EventHandler};
use crate::following::FollowingBlock;
use crate::ids::next_id;
use crate::manifest::DataMap;
use crate::section::{SectionKind, YIELD_CHILDREN, YIELD_CONTENT, subscribe_attr};
use crate::state::{Setter, StateValue, ViewState};
use crate::view::{ChildScope, ViewNode};

/// Which primitive set a template pass runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
	/// Produce markup text.
	Markup,
	/// Establish relationships only; suppress all markup emission.
	Scan,
}

/// The body closure of a view template.
pub type TemplateBody = Rc<dyn Fn(&mut TemplateScope) -> Result<String, ViewError>>;

/// Constructor-phase hook: registers state slots derived from the data bag.
pub type SetupFn = Rc<dyn Fn(&DataMap, &ViewState)>;

/// Lifecycle hook.
pub type LifecycleFn = Rc<dyn Fn()>;

/// Factory configuration of one view path.
#[derive(Clone)]
pub struct ViewTemplate {
	pub(crate) path: String,
	pub(crate) extends: Option<String>,
	pub(crate) long_sections: Vec<String>,
	pub(crate) subscribe: Vec<String>,
	pub(crate) body: TemplateBody,
	pub(crate) setup: Option<SetupFn>,
	pub(crate) on_mounted: Option<LifecycleFn>,
	pub(crate) on_unmounted: Option<LifecycleFn>,
}

impl std::fmt::Debug for ViewTemplate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewTemplate")
			.field("path", &self.path)
			.field("extends", &self.extends)
			.field("long_sections", &self.long_sections)
			.finish()
	}
}

impl ViewTemplate {
	/// Creates a template from its path and body.
	pub fn new(
		path: impl Into<String>,
		body: impl Fn(&mut TemplateScope) -> Result<String, ViewError> + 'static,
	) -> Self {
		Self {
			path: path.into(),
			extends: None,
			long_sections: Vec::new(),
			subscribe: Vec::new(),
			body: Rc::new(body),
			setup: None,
			on_mounted: None,
			on_unmounted: None,
		}
	}

	/// Declares the template-inheritance parent this view extends.
	pub fn extends(mut self, path: impl Into<String>) -> Self {
		self.extends = Some(path.into());
		self
	}

	/// Declares the long-form sections this view renders its content into.
	pub fn long_sections(mut self, sections: &[&str]) -> Self {
		self.long_sections = sections.iter().map(|s| s.to_string()).collect();
		self
	}

	/// State keys whose change refreshes the whole view in place.
	pub fn subscribe(mut self, keys: &[&str]) -> Self {
		self.subscribe = keys.iter().map(|k| k.to_string()).collect();
		self
	}

	/// Constructor-phase hook registering state from the data bag.
	pub fn setup(mut self, setup: impl Fn(&DataMap, &ViewState) + 'static) -> Self {
		self.setup = Some(Rc::new(setup));
		self
	}

	/// Hook invoked when the view mounts.
	pub fn on_mounted(mut self, hook: impl Fn() + 'static) -> Self {
		self.on_mounted = Some(Rc::new(hook));
		self
	}

	/// Hook invoked when the view unmounts.
	pub fn on_unmounted(mut self, hook: impl Fn() + 'static) -> Self {
		self.on_unmounted = Some(Rc::new(hook));
		self
	}

	/// The template's logical path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The declared superview path, if any.
	pub fn extends_path(&self) -> Option<&str> {
		self.extends.as_deref()
	}
}

/// The primitive surface handed to a template body.
pub struct TemplateScope<'a> {
	pub(crate) mode: RenderMode,
	pub(crate) view: &'a mut ViewNode,
	pub(crate) directory: &'a Rc<ViewDirectory>,
}

impl<'a> TemplateScope<'a> {
	/// Current pass mode.
	pub fn mode(&self) -> RenderMode {
		self.mode
	}

	/// True during a scan (hydration) pass.
	pub fn is_scan(&self) -> bool {
		self.mode == RenderMode::Scan
	}

	/// The owning view's instance id.
	pub fn view_id(&self) -> String {
		self.view.id.clone()
	}

	/// The owning view's logical path.
	pub fn path(&self) -> String {
		self.view.path.clone()
	}

	/// The view's data bag.
	pub fn data(&self) -> &DataMap {
		&self.view.data
	}

	/// String coercion of a data entry; missing keys yield the empty string.
	pub fn data_str(&self, key: &str) -> String {
		match self.view.data.get(key) {
			Some(Value::String(s)) => s.clone(),
			Some(other) => other.to_string(),
			None => String::new(),
		}
	}

	/// Shared handle to the view's state container.
	pub fn states(&self) -> ViewState {
		self.view.state.clone()
	}

	/// Registers a state slot; duplicate keys hand back the existing setter.
	pub fn use_state(&mut self, key: &str, initial: StateValue) -> Setter {
		self.view.state.register(key, initial)
	}

	/// Reads a state value; unknown keys yield `Value::Null`.
	pub fn get_state(&self, key: &str) -> StateValue {
		self.view.state.get(key).unwrap_or(Value::Null)
	}

	/// Freezes the keyed-update path on the view's state.
	pub fn lock_state_updates(&self) {
		self.view.state.lock_updates();
	}

	/// Escapes text content for markup emission.
	pub fn escape(&self, value: &str) -> String {
		one_dom::escape_text(value)
	}

	/// Obtains (or re-uses) the named view as this view's superview. Returns
	/// the empty string in both modes: the superview's markup is produced by
	/// the driver, never inline.
	pub fn extends(&mut self, path: &str, data: DataMap) -> String {
		let merged = merge_data(&self.view.data, data);
		let superview = match self.mode {
			RenderMode::Markup => self.directory.extend_view(path, merged, None),
			RenderMode::Scan => {
				if !self.directory.exists(path) {
					warn!(path, "superview not registered");
					return String::new();
				}
				let record = self.superview_record(path);
				let Some(record) = record else {
					warn!(path, "no manifest record for superview");
					return String::new();
				};
				let mut merged = merged;
				for (key, value) in &record.data {
					merged.insert(key.clone(), value.clone());
				}
				let superview =
					self.directory
						.extend_view(path, merged, Some(record.view_id.clone()));
				if let Some(handle) = &superview {
					ViewNode::scan(handle, &record, self.directory);
				}
				superview
			}
		};
		let Some(superview) = superview else {
			warn!(path, "superview not found");
			return String::new();
		};
		self.view.superview_path = Some(path.to_string());
		self.view.superview = Some(superview.clone());
		superview.borrow_mut().original_view = Some(self.view.self_weak.clone());
		String::new()
	}

	fn superview_record(&mut self, path: &str) -> Option<crate::manifest::ViewRecord> {
		// a server render lists the layout as the last child entry; fall back
		// to the positional cursor otherwise
		let from_children = self
			.view
			.children_configs
			.last()
			.filter(|child| child.name == path)
			.map(|child| child.id.clone());
		match from_children {
			Some(id) => self.directory.manifest_instance(path, &id),
			None => self.directory.manifest_scan(path),
		}
	}

	/// Obtains a child view, merging caller data over this view's data, and
	/// registers it as a scoped child. Markup mode returns the child's
	/// rendered markup; scan mode attaches the child positionally against
	/// the manifest and returns the empty string.
	pub fn include(&mut self, path: &str, data: DataMap, subscribe: &[&str]) -> String {
		match self.mode {
			RenderMode::Markup => {
				let merged = merge_data(&self.view.data, data.clone());
				let Some(child) = self.directory.create_view(path, merged, None) else {
					warn!(path, "include target not found");
					return String::new();
				};
				child.borrow_mut().parent = Some(self.view.self_weak.clone());
				self.register_child(path, &child, data, subscribe);
				let id = child.borrow().id().to_string();
				let markup = ViewNode::render(&child, self.directory);
				// sentinel-wrapped so the child owns a locatable range
				format!(
					"{}{}{}",
					one_dom::open_marker("view", &[("name", path), ("id", &id)]),
					markup,
					one_dom::close_marker("view"),
				)
			}
			RenderMode::Scan => {
				let Some(config) = self
					.view
					.children_configs
					.get(self.view.children_scan_index)
					.cloned()
				else {
					warn!(path, "no child record left for include");
					return String::new();
				};
				if config.name != path {
					warn!(
						expected = %config.name,
						found = %path,
						"child record does not match template order; skipping"
					);
					return String::new();
				}
				let Some(record) = self.directory.manifest_instance(path, &config.id) else {
					warn!(path, id = %config.id, "child manifest record missing; skipping");
					return String::new();
				};
				self.view.children_scan_index += 1;
				let mut merged = merge_data(&self.view.data, data.clone());
				for (key, value) in &record.data {
					merged.insert(key.clone(), value.clone());
				}
				let Some(child) =
					self.directory
						.create_view(path, merged, Some(record.view_id.clone()))
				else {
					return String::new();
				};
				child.borrow_mut().parent = Some(self.view.self_weak.clone());
				ViewNode::scan(&child, &record, self.directory);
				ViewNode::virtual_render(&child, self.directory);
				self.register_child(path, &child, data, subscribe);
				String::new()
			}
		}
	}

	/// Includes the view only when it is registered.
	pub fn include_if(&mut self, path: &str, data: DataMap, subscribe: &[&str]) -> String {
		if !self.directory.exists(path) {
			return String::new();
		}
		self.include(path, data, subscribe)
	}

	/// Includes the view only when `condition` holds.
	pub fn include_when(
		&mut self,
		condition: bool,
		path: &str,
		data: DataMap,
		subscribe: &[&str],
	) -> String {
		if !condition {
			return String::new();
		}
		self.include(path, data, subscribe)
	}

	fn register_child(
		&mut self,
		path: &str,
		child: &crate::view::ViewHandle,
		data: DataMap,
		subscribe: &[&str],
	) {
		let index = self.view.children.len();
		let scope = ChildScope {
			name: path.to_string(),
			id: child.borrow().id.clone(),
			index,
			view: child.clone(),
			data,
			subscribed_keys: subscribe.iter().map(|k| k.to_string()).collect(),
		};
		self.view.children.push(scope);
	}

	/// Opens a following block over `keys` with its fragment closure. Markup
	/// mode emits the sentinel-wrapped fragment; scan mode locates the
	/// pre-existing range by sentinel id, deferring the first render to the
	/// first state change.
	pub fn follow(&mut self, keys: &[&str], fragment: impl Fn() -> String + 'static) -> String {
		if keys.is_empty() {
			return String::new();
		}
		match self.mode {
			RenderMode::Markup => {
				let block = FollowingBlock::create(
					next_id("f"),
					keys.iter().map(|k| k.to_string()).collect(),
					Rc::new(fragment),
					self.view.state.clone(),
					self.view.doc.clone(),
					self.view.self_weak.clone(),
				);
				let markup = block.borrow().render_markup();
				let id = block.borrow().id().to_string();
				self.view.following_render_ids.push(id.clone());
				self.view.following_blocks.push((id, block));
				markup
			}
			RenderMode::Scan => {
				let Some(config) = self
					.view
					.following_configs
					.get(self.view.following_scan_index)
					.cloned()
				else {
					warn!("no following record left in manifest; skipping block");
					return String::new();
				};
				let same_keys = config.state_keys.len() == keys.len()
					&& keys.iter().all(|k| config.state_keys.iter().any(|c| c == k));
				if !same_keys {
					warn!(
						id = %config.id,
						"following record keys do not match template order; skipping"
					);
					return String::new();
				}
				self.view.following_scan_index += 1;
				let block = FollowingBlock::create(
					config.id.clone(),
					config.state_keys.clone(),
					Rc::new(fragment),
					self.view.state.clone(),
					self.view.doc.clone(),
					self.view.self_weak.clone(),
				);
				block.borrow_mut().locate();
				let id = block.borrow().id().to_string();
				self.view.following_render_ids.push(id.clone());
				self.view.following_blocks.push((id, block));
				String::new()
			}
		}
	}

	/// Defines a named section. In scan mode the content is cached on the
	/// view only — the server-rendered tree already carries it.
	pub fn section(&mut self, name: &str, content: &str, kind: SectionKind) {
		self.view
			.cached_sections
			.insert(name.to_string(), content.to_string());
		if self.mode == RenderMode::Markup {
			self.directory
				.sections()
				.borrow_mut()
				.define(name, content, kind);
		}
	}

	/// Pure read of a section's current content.
	pub fn yield_section(&self, name: &str, fallback: &str) -> String {
		self.directory
			.sections()
			.borrow()
			.yield_content(name, fallback)
	}

	/// Wrapper attributes subscribing an element attribute to a section.
	pub fn yield_attr(&self, attr: &str, section: &str, fallback: &str) -> String {
		subscribe_attr(&self.directory.sections().borrow(), attr, section, fallback)
	}

	/// Wrapper attribute marking an element as a section content target.
	pub fn content_target(&self, section: &str) -> String {
		format!(" {}=\"{}\"", YIELD_CONTENT, section)
	}

	/// Wrapper attribute marking an element as a section children target.
	pub fn children_target(&self, section: &str) -> String {
		format!(" {}=\"{}\"", YIELD_CHILDREN, section)
	}

	/// Appends to a named stack.
	pub fn push_stack(&mut self, name: &str, content: &str) {
		if self.mode == RenderMode::Markup {
			self.directory.sections().borrow_mut().push(name, content);
		}
	}

	/// Concatenated content of a named stack.
	pub fn stack(&self, name: &str) -> String {
		self.directory.sections().borrow().stack(name)
	}

	/// Registers an event handler stack entry; returns the handler-id
	/// attribute text for the owning element.
	pub fn event(&mut self, event_type: &str, handler: impl Fn(&Event) + 'static) -> String {
		let handler: EventHandler = Rc::new(handler);
		self.view.events.add(event_type, handler)
	}
}

fn merge_data(parent: &DataMap, mut overrides: DataMap) -> DataMap {
	let mut merged = parent.clone();
	merged.append(&mut overrides);
	merged
}

/// Position bookkeeping for [`foreach`].
#[derive(Debug, Clone, Copy)]
pub struct LoopContext {
	/// Zero-based index.
	pub index: usize,
	/// Total item count.
	pub count: usize,
}

impl LoopContext {
	/// True on the first iteration.
	pub fn first(&self) -> bool {
		self.index == 0
	}

	/// True on the last iteration.
	pub fn last(&self) -> bool {
		self.index + 1 == self.count
	}

	/// Iterations left after this one.
	pub fn remaining(&self) -> usize {
		self.count - self.index - 1
	}

	/// One-based iteration number.
	pub fn iteration(&self) -> usize {
		self.index + 1
	}
}

/// Iterates an array or object value, concatenating the callback output.
/// Non-iterable values yield the empty string.
pub fn foreach(
	items: &Value,
	mut body: impl FnMut(&Value, &str, usize, &LoopContext) -> String,
) -> String {
	let mut out = String::new();
	match items {
		Value::Array(list) => {
			let count = list.len();
			for (index, item) in list.iter().enumerate() {
				let ctx = LoopContext { index, count };
				let key = index.to_string();
				out.push_str(&body(item, &key, index, &ctx));
			}
		}
		Value::Object(map) => {
			let count = map.len();
			for (index, (key, item)) in map.iter().enumerate() {
				let ctx = LoopContext { index, count };
				out.push_str(&body(item, key, index, &ctx));
			}
		}
		_ => {}
	}
	out
}
