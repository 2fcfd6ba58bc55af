//! The view node.
//!
//! A [`ViewNode`] wraps one rendered or hydrated view: its data bag, its
//! state container, its following blocks, its scoped children, and — when the
//! template extends a layout — its superview link. For any single pass a node
//! is either in markup mode (producing text) or scan mode (establishing
//! relationships only); the same template body drives both.
//!
//! A node with a superview never owns its own top-level node range; the
//! superview's range is authoritative and the extending node's content
//! travels through named sections.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use one_dom::{
	Document, Locator, MarkupRange, NodeId, SharedDocument, escape_text, insert_markup_before,
	parse_fragment, serialize_node,
};
use tracing::{debug, error, warn};

use crate::directory::ViewDirectory;
use crate::error::ViewError;
use crate::events::EventBindings;
use crate::following::{BlockHandle, FollowingBlock};
use crate::ids::next_id;
use crate::manifest::{ChildRecord, DataMap, FollowingRecord, ViewRecord};
use crate::schedule::SharedQueue;
use crate::section::SectionKind;
use crate::state::ViewState;
use crate::template::{RenderMode, TemplateScope, ViewTemplate};

/// Attribute stamping a view instance id on its root elements.
pub const VIEW_ID_ATTR: &str = "data-view-id";
/// Attribute marking the document as server-rendered.
pub const SERVER_RENDERED_ATTR: &str = "data-server-rendered";

/// Shared handle to a view node.
pub type ViewHandle = Rc<RefCell<ViewNode>>;

/// A scoped child registered by an include.
#[derive(Clone)]
pub struct ChildScope {
	/// Logical path of the child view.
	pub name: String,
	/// Child instance id.
	pub id: String,
	/// Registration index in template execution order.
	pub index: usize,
	/// The child view.
	pub view: ViewHandle,
	/// The explicit data handed to the include.
	pub data: DataMap,
	/// Parent state keys whose change refreshes this child.
	pub subscribed_keys: Vec<String>,
}

impl std::fmt::Debug for ChildScope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChildScope")
			.field("name", &self.name)
			.field("id", &self.id)
			.field("index", &self.index)
			.field("subscribed_keys", &self.subscribed_keys)
			.finish()
	}
}

/// One rendered/hydrated view instance.
pub struct ViewNode {
	pub(crate) id: String,
	pub(crate) path: String,
	pub(crate) template: ViewTemplate,
	pub(crate) data: DataMap,
	pub(crate) state: ViewState,
	pub(crate) doc: SharedDocument,
	pub(crate) queue: SharedQueue,
	pub(crate) directory: Weak<ViewDirectory>,
	pub(crate) self_weak: Weak<RefCell<ViewNode>>,

	pub(crate) superview: Option<ViewHandle>,
	pub(crate) superview_path: Option<String>,
	pub(crate) original_view: Option<Weak<RefCell<ViewNode>>>,
	pub(crate) parent: Option<Weak<RefCell<ViewNode>>>,
	pub(crate) is_super_view: bool,
	pub(crate) url_path: String,

	pub(crate) children: Vec<ChildScope>,
	pub(crate) following_blocks: Vec<(String, BlockHandle)>,
	pub(crate) following_render_ids: Vec<String>,
	pub(crate) following_configs: Vec<FollowingRecord>,
	pub(crate) following_scan_index: usize,
	pub(crate) children_configs: Vec<ChildRecord>,
	pub(crate) children_scan_index: usize,

	pub(crate) events: EventBindings,
	pub(crate) range: Option<MarkupRange>,
	pub(crate) ref_elements: Vec<NodeId>,
	pub(crate) cached_sections: HashMap<String, String>,

	pub(crate) mounted: bool,
	pub(crate) scanned: bool,
	pub(crate) rendering: bool,
	pub(crate) destroyed: bool,

	pub(crate) changed_keys: BTreeSet<String>,
	pub(crate) flush_scheduled: bool,
}

impl std::fmt::Debug for ViewNode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewNode")
			.field("id", &self.id)
			.field("path", &self.path)
			.field("superview_path", &self.superview_path)
			.field("children", &self.children.len())
			.field("following", &self.following_blocks.len())
			.field("mounted", &self.mounted)
			.field("scanned", &self.scanned)
			.field("destroyed", &self.destroyed)
			.finish()
	}
}

impl ViewNode {
	pub(crate) fn create(
		directory: &Rc<ViewDirectory>,
		template: ViewTemplate,
		data: DataMap,
		id: Option<String>,
	) -> ViewHandle {
		let id = id.unwrap_or_else(|| next_id("v"));
		let state = ViewState::new();
		if let Some(setup) = &template.setup {
			setup(&data, &state);
		}
		// construction-time writes committed; listeners are live from here on
		state.commit();

		let path = template.path.clone();
		let events = EventBindings::new(id.clone());
		let handle = Rc::new_cyclic(|weak: &Weak<RefCell<ViewNode>>| {
			RefCell::new(ViewNode {
				id,
				path,
				template,
				data,
				state: state.clone(),
				doc: directory.doc(),
				queue: directory.queue(),
				directory: Rc::downgrade(directory),
				self_weak: weak.clone(),
				superview: None,
				superview_path: None,
				original_view: None,
				parent: None,
				is_super_view: false,
				url_path: String::new(),
				children: Vec::new(),
				following_blocks: Vec::new(),
				following_render_ids: Vec::new(),
				following_configs: Vec::new(),
				following_scan_index: 0,
				children_configs: Vec::new(),
				children_scan_index: 0,
				events,
				range: None,
				ref_elements: Vec::new(),
				cached_sections: HashMap::new(),
				mounted: false,
				scanned: false,
				rendering: false,
				destroyed: false,
				changed_keys: BTreeSet::new(),
				flush_scheduled: false,
			})
		});

		let weak = Rc::downgrade(&handle);
		state.set_change_hook(move |key| {
			if let Some(view) = weak.upgrade() {
				ViewNode::queue_state_change(&view, key);
			}
		});
		handle
	}

	// ------------------------------------------------------------------
	// accessors
	// ------------------------------------------------------------------

	/// Stable instance id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Logical path name.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The view's data bag.
	pub fn data(&self) -> &DataMap {
		&self.data
	}

	/// Shared state container.
	pub fn state(&self) -> ViewState {
		self.state.clone()
	}

	/// The superview, once resolved.
	pub fn superview(&self) -> Option<ViewHandle> {
		self.superview.clone()
	}

	/// The resolved superview path.
	pub fn superview_path(&self) -> Option<&str> {
		self.superview_path.as_deref()
	}

	/// Scoped children in registration order.
	pub fn children(&self) -> &[ChildScope] {
		&self.children
	}

	/// Following block ids in registration order.
	pub fn following_ids(&self) -> Vec<String> {
		self.following_blocks.iter().map(|(id, _)| id.clone()).collect()
	}

	/// Following block handle by id.
	pub fn following_block(&self, id: &str) -> Option<BlockHandle> {
		self.following_blocks
			.iter()
			.find(|(block_id, _)| block_id == id)
			.map(|(_, block)| block.clone())
	}

	/// True while mounted.
	pub fn is_mounted(&self) -> bool {
		self.mounted
	}

	/// True once a scan pass attached this node.
	pub fn is_scanned(&self) -> bool {
		self.scanned
	}

	/// True once destroyed.
	pub fn is_destroyed(&self) -> bool {
		self.destroyed
	}

	/// The located top-level range, when this node owns one.
	pub fn range(&self) -> Option<&MarkupRange> {
		self.range.as_ref()
	}

	/// Root elements the node attached to during a scan.
	pub fn ref_elements(&self) -> &[NodeId] {
		&self.ref_elements
	}

	/// URL path this instance was resolved for.
	pub fn url_path(&self) -> &str {
		&self.url_path
	}

	/// The including parent view, for scoped children.
	pub fn parent(&self) -> Option<ViewHandle> {
		self.parent.as_ref().and_then(Weak::upgrade)
	}

	/// True while a render or scan pass is executing.
	pub fn is_rendering(&self) -> bool {
		self.rendering
	}

	/// Section content this view defined during its last pass.
	pub fn cached_section(&self, name: &str) -> Option<&str> {
		self.cached_sections.get(name).map(String::as_str)
	}

	/// Following block ids created during the last pass.
	pub fn pass_following_ids(&self) -> &[String] {
		&self.following_render_ids
	}

	pub(crate) fn update_data(&mut self, mut data: DataMap) {
		self.data.append(&mut data);
	}

	// ------------------------------------------------------------------
	// render / scan
	// ------------------------------------------------------------------

	/// CSR pass: runs the template body in markup mode and returns the
	/// produced markup with the view-id attribute stamped on root elements.
	///
	/// Registrations from a previous markup pass are torn down first, so a
	/// re-render is a full re-registration. Render-time failures are caught
	/// here and replaced with an inline error fragment scoped to this view.
	pub fn render(view: &ViewHandle, directory: &Rc<ViewDirectory>) -> String {
		Self::reset_markup_pass(view);
		let result = {
			let mut this = view.borrow_mut();
			this.rendering = true;
			let body = this.template.body.clone();
			let mut scope = TemplateScope {
				mode: RenderMode::Markup,
				view: &mut this,
				directory,
			};
			body(&mut scope)
		};
		let markup = match result {
			Ok(markup) => {
				let this = view.borrow();
				stamp_root_attr(&markup, VIEW_ID_ATTR, &this.id)
			}
			Err(err) => {
				let path = view.borrow().path.clone();
				error!(path = %path, error = %err, "view render failed");
				Self::error_fragment(view, directory, &err)
			}
		};
		view.borrow_mut().rendering = false;
		markup
	}

	/// Scan pass: runs the identical template body with markup emission
	/// suppressed, only registering child and following-block relationships
	/// positionally against the manifest records stored by [`scan`](Self::scan).
	pub fn virtual_render(view: &ViewHandle, directory: &Rc<ViewDirectory>) {
		let result = {
			let mut this = view.borrow_mut();
			this.rendering = true;
			this.following_scan_index = 0;
			this.children_scan_index = 0;
			this.following_render_ids.clear();
			this.events.begin_pass();
			let body = this.template.body.clone();
			let mut scope = TemplateScope {
				mode: RenderMode::Scan,
				view: &mut this,
				directory,
			};
			body(&mut scope)
		};
		if let Err(err) = result {
			// hydration is best-effort enhancement; stay silent for the user
			let path = view.borrow().path.clone();
			warn!(path = %path, error = %err, "virtual render failed");
		}
		view.borrow_mut().rendering = false;
	}

	/// Hydration attach: stores the manifest record's following/children
	/// declarations for positional consumption and locates this node's
	/// pre-existing range. Nodes with a superview skip range location — the
	/// superview's range is authoritative.
	pub fn scan(view: &ViewHandle, record: &ViewRecord, _directory: &Rc<ViewDirectory>) {
		let (doc, path, id, has_super) = {
			let mut this = view.borrow_mut();
			if this.scanned {
				return;
			}
			this.following_configs = record.following.clone();
			this.children_configs = record.children.clone();
			(
				this.doc.clone(),
				this.path.clone(),
				this.id.clone(),
				this.template.extends.is_some(),
			)
		};

		if has_super {
			debug!(path = %path, "skipping element scan; superview range is authoritative");
		} else {
			let doc_ref = doc.borrow();
			let mut locator = Locator::new();
			match locator.first(&doc_ref, "view", &[("name", path.as_str()), ("id", id.as_str())]) {
				Some(range) => {
					let elements = range
						.nodes()
						.iter()
						.copied()
						.filter(|&node| doc_ref.node(node).is_element())
						.collect();
					let mut this = view.borrow_mut();
					this.ref_elements = elements;
					this.range = Some(range);
				}
				None => {
					let elements = doc_ref.query_by_attribute(VIEW_ID_ATTR, Some(&id));
					if elements.is_empty() {
						warn!(path = %path, id = %id, "no rendered nodes found for view");
					}
					view.borrow_mut().ref_elements = elements;
				}
			}
		}
		view.borrow_mut().scanned = true;
	}

	fn reset_markup_pass(view: &ViewHandle) {
		let (blocks, children) = {
			let mut this = view.borrow_mut();
			this.following_render_ids.clear();
			this.cached_sections.clear();
			this.events.begin_pass();
			(
				std::mem::take(&mut this.following_blocks),
				std::mem::take(&mut this.children),
			)
		};
		for (_, block) in blocks {
			FollowingBlock::destroy(&block);
		}
		for scope in children {
			Self::destroy(&scope.view);
		}
	}

	fn error_fragment(view: &ViewHandle, directory: &Rc<ViewDirectory>, err: &ViewError) -> String {
		let (id, is_super, long_sections) = {
			let this = view.borrow();
			(
				this.id.clone(),
				this.is_super_view,
				this.template.long_sections.clone(),
			)
		};
		let message = escape_text(&err.to_string());
		if is_super {
			return format!("<div class=\"one-error-view\">{}</div>", message);
		}
		if !long_sections.is_empty() {
			// one error fragment per affected long-form section
			let sections = directory.sections();
			let mut sections = sections.borrow_mut();
			for section in &long_sections {
				sections.define(
					section,
					&format!(
						"<div class=\"one-section-error\" data-section-ref=\"{}\">{}</div>",
						id, message
					),
					SectionKind::Markup,
				);
			}
			return String::new();
		}
		format!(
			"<div class=\"one-error-view\" {}=\"{}\">{}</div>",
			VIEW_ID_ATTR, id, message
		)
	}

	// ------------------------------------------------------------------
	// lifecycle
	// ------------------------------------------------------------------

	/// Mounts this node: lifecycle hook, event bindings, then the cascade —
	/// the originally-extending node, scoped children, following blocks.
	pub fn mount(view: &ViewHandle) {
		let (was_mounted, on_mounted, doc) = {
			let mut this = view.borrow_mut();
			if this.destroyed {
				return;
			}
			let was = this.mounted;
			this.mounted = true;
			(was, this.template.on_mounted.clone(), this.doc.clone())
		};
		if !was_mounted {
			if let Some(hook) = on_mounted {
				hook();
			}
			let mut this = view.borrow_mut();
			this.events.start(&doc.borrow());
		}

		let (original, children, blocks) = Self::cascade_targets(view);
		if let Some(original) = original {
			Self::mount(&original);
		}
		for child in children {
			Self::mount(&child);
		}
		for block in blocks {
			FollowingBlock::mount(&block);
		}
	}

	/// Unmounts this node and cascades to children and following blocks.
	pub fn unmount(view: &ViewHandle) {
		let on_unmounted = {
			let mut this = view.borrow_mut();
			if !this.mounted {
				None
			} else {
				this.mounted = false;
				this.events.stop();
				this.template.on_unmounted.clone()
			}
		};
		if let Some(hook) = on_unmounted {
			hook();
		}

		let (_, children, blocks) = Self::cascade_targets(view);
		for child in children {
			Self::unmount(&child);
		}
		for block in blocks {
			FollowingBlock::unmount(&block);
		}
	}

	/// Tears the node down: unmounts, destroys the originally-extending
	/// node, children and blocks, and releases every located node. A pending
	/// deferred flush becomes a no-op.
	pub fn destroy(view: &ViewHandle) {
		{
			let mut this = view.borrow_mut();
			if this.destroyed {
				return;
			}
			this.destroyed = true;
			this.flush_scheduled = false;
			this.changed_keys.clear();
		}
		Self::unmount(view);

		let (original, children, blocks) = Self::cascade_targets(view);
		if let Some(original) = original {
			Self::destroy(&original);
		}
		for child in children {
			Self::destroy(&child);
		}
		for block in blocks {
			FollowingBlock::destroy(&block);
		}

		let (doc, range, elements) = {
			let mut this = view.borrow_mut();
			this.children.clear();
			this.following_blocks.clear();
			(
				this.doc.clone(),
				this.range.take(),
				std::mem::take(&mut this.ref_elements),
			)
		};
		let mut doc = doc.borrow_mut();
		if let Some(range) = range {
			for node in range.nodes() {
				doc.remove_node(*node);
			}
			doc.remove_node(range.open());
			doc.remove_node(range.close());
		}
		for element in elements {
			doc.remove_node(element);
		}
	}

	fn cascade_targets(view: &ViewHandle) -> (Option<ViewHandle>, Vec<ViewHandle>, Vec<BlockHandle>) {
		let this = view.borrow();
		(
			this.original_view.as_ref().and_then(Weak::upgrade),
			this.children.iter().map(|scope| scope.view.clone()).collect(),
			this.following_blocks
				.iter()
				.map(|(_, block)| block.clone())
				.collect(),
		)
	}

	pub(crate) fn pause_events(view: &ViewHandle) {
		if let Ok(mut this) = view.try_borrow_mut() {
			this.events.stop();
		}
	}

	pub(crate) fn resume_events(view: &ViewHandle) {
		if let Ok(mut this) = view.try_borrow_mut() {
			if this.mounted {
				let doc = this.doc.clone();
				this.events.start(&doc.borrow());
			}
		}
	}

	// ------------------------------------------------------------------
	// events
	// ------------------------------------------------------------------

	/// Runs this node's handler stack for a dispatch on `target`. Returns
	/// the number of handlers invoked.
	pub fn dispatch(view: &ViewHandle, target: NodeId, event_type: &str) -> usize {
		let handlers = {
			let this = view.borrow();
			let doc = this.doc.clone();
			let doc = doc.borrow();
			this.events.resolve(&doc, target, event_type)
		};
		let count = handlers.len();
		let event = crate::events::Event {
			event_type: event_type.to_string(),
			target,
		};
		for handler in handlers {
			handler(&event);
		}
		count
	}

	/// Dispatches on this node, falling back to scoped children depth-first.
	pub fn dispatch_deep(view: &ViewHandle, target: NodeId, event_type: &str) -> usize {
		let handled = Self::dispatch(view, target, event_type);
		if handled > 0 {
			return handled;
		}
		let children: Vec<ViewHandle> = view
			.borrow()
			.children
			.iter()
			.map(|scope| scope.view.clone())
			.collect();
		for child in children {
			let handled = Self::dispatch_deep(&child, target, event_type);
			if handled > 0 {
				return handled;
			}
		}
		0
	}

	// ------------------------------------------------------------------
	// batched state notification
	// ------------------------------------------------------------------

	pub(crate) fn queue_state_change(view: &ViewHandle, key: &str) {
		let schedule = {
			let Ok(mut this) = view.try_borrow_mut() else {
				warn!(key, "state change during active pass; skipping batch");
				return;
			};
			if this.destroyed {
				return;
			}
			this.changed_keys.insert(key.to_string());
			if this.flush_scheduled {
				false
			} else {
				this.flush_scheduled = true;
				true
			}
		};
		if schedule {
			let weak = view.borrow().self_weak.clone();
			let queue = view.borrow().queue.clone();
			queue.schedule(move || {
				if let Some(view) = weak.upgrade() {
					ViewNode::flush_state_changes(&view);
				}
			});
		}
	}

	fn flush_state_changes(view: &ViewHandle) {
		let (keys, destroyed) = {
			let mut this = view.borrow_mut();
			this.flush_scheduled = false;
			let keys: Vec<String> = std::mem::take(&mut this.changed_keys).into_iter().collect();
			(keys, this.destroyed)
		};
		if destroyed || keys.is_empty() {
			return;
		}
		Self::notify_state_changes(view, &keys);
	}

	/// Applies a changed-key set: the node's own refresh completes first,
	/// then children whose subscribed keys intersect are refreshed. No
	/// particular child-to-child order is guaranteed.
	pub fn notify_state_changes(view: &ViewHandle, keys: &[String]) {
		let own = view
			.borrow()
			.template
			.subscribe
			.iter()
			.any(|key| keys.iter().any(|k| k == key));
		if own {
			Self::refresh(view);
		}

		let children: Vec<(ViewHandle, Vec<String>)> = view
			.borrow()
			.children
			.iter()
			.map(|scope| (scope.view.clone(), scope.subscribed_keys.clone()))
			.collect();
		for (child, subscribed) in children {
			if keys.iter().any(|key| subscribed.iter().any(|s| s == key)) {
				Self::refresh(&child);
			}
		}
	}

	/// Re-renders the node's located range in place and restarts its event
	/// bindings. Nodes without a locatable, attached range no-op.
	pub fn refresh(view: &ViewHandle) {
		let Some(directory) = view.borrow().directory.upgrade() else {
			return;
		};
		{
			// range may not have been derived yet (markup-mode instances)
			let mut this = view.borrow_mut();
			if this.range.is_none() {
				let path = this.path.clone();
				let id = this.id.clone();
				let doc = this.doc.clone();
				let doc = doc.borrow();
				let mut locator = Locator::new();
				this.range =
					locator.first(&doc, "view", &[("name", path.as_str()), ("id", id.as_str())]);
			}
		}
		let (doc, close) = {
			let this = view.borrow();
			let Some(range) = &this.range else {
				debug!(path = %this.path, "refresh without located range");
				return;
			};
			(this.doc.clone(), range.close())
		};
		if !doc.borrow().is_attached(close) {
			warn!("refresh target range detached");
			return;
		}

		let markup = Self::render(view, &directory);
		{
			let mut this = view.borrow_mut();
			let mut doc = doc.borrow_mut();
			if let Some(range) = &mut this.range {
				for node in range.rescan(&doc).to_vec() {
					doc.remove_node(node);
				}
			}
			insert_markup_before(&mut doc, close, &markup);
			if let Some(range) = &mut this.range {
				range.rescan(&doc);
			}
		}
		let mounted = {
			let mut this = view.borrow_mut();
			this.events.stop();
			if this.mounted {
				this.events.start(&doc.borrow());
			}
			this.mounted
		};
		// the pass re-registered children and blocks; bring them live again
		if mounted {
			let (_, children, blocks) = Self::cascade_targets(view);
			for child in children {
				Self::mount(&child);
			}
			for block in blocks {
				FollowingBlock::mount(&block);
			}
		}
	}
}

/// Stamps an attribute on every root element of a markup fragment.
pub(crate) fn stamp_root_attr(markup: &str, attr: &str, value: &str) -> String {
	if markup.trim().is_empty() || !markup.contains('<') {
		return markup.to_string();
	}
	let mut scratch = Document::new();
	let roots = parse_fragment(&mut scratch, markup);
	let mut out = String::new();
	for root in roots {
		if scratch.node(root).is_element() {
			scratch.set_attribute(root, attr, value);
		}
		out.push_str(&serialize_node(&scratch, root));
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_stamp_root_attr() {
		let stamped = stamp_root_attr("<div>a</div><p>b</p>", VIEW_ID_ATTR, "v-1");
		assert_eq!(
			stamped,
			"<div data-view-id=\"v-1\">a</div><p data-view-id=\"v-1\">b</p>"
		);
	}

	#[test]
	fn test_stamp_root_attr_skips_plain_text() {
		assert_eq!(stamp_root_attr("just text", VIEW_ID_ATTR, "v-1"), "just text");
		assert_eq!(stamp_root_attr("", VIEW_ID_ATTR, "v-1"), "");
	}

	#[test]
	fn test_stamp_root_attr_leaves_comments() {
		let markup = "<!--note--><section>x</section>";
		assert_eq!(
			stamp_root_attr(markup, VIEW_ID_ATTR, "v-9"),
			"<!--note--><section data-view-id=\"v-9\">x</section>"
		);
	}
}
