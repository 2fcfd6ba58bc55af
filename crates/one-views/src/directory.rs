//! The view directory.
//!
//! Resolves view paths to template factories, caches instances, and drives
//! the render/scan loop upward through the superview chain. The directory
//! owns the central reinsertion decision: a full layout reinsertion happens
//! only when the resolved superview path differs from the previously active
//! one — otherwise only the inner content is swapped by flushing the changed
//! sections into the already-mounted layout. Both the markup pass and the
//! hydration scan pass reproduce the same decision.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use one_dom::{NodeId, SharedDocument, set_inner_markup};
use tracing::{debug, error, info, warn};

use crate::config::DirectoryConfig;
use crate::error::ViewError;
use crate::manifest::{DataMap, ManifestStore, ViewRecord};
use crate::schedule::{SharedQueue, TaskQueue};
use crate::section::SectionRegistry;
use crate::template::ViewTemplate;
use crate::view::{ViewHandle, ViewNode};

/// Shared handle to the directory.
pub type SharedDirectory = Rc<ViewDirectory>;

/// Outcome of a render or scan pass over one view chain.
#[derive(Debug)]
pub struct LoadResult {
	/// Markup to insert, when the pass produced any.
	pub markup: Option<String>,
	/// Whether a full (re)insertion is required, or only a content swap.
	pub need_insert: bool,
	/// The resolved superview, if the chain has one.
	pub super_view: Option<ViewHandle>,
	/// The outermost node of the chain (the superview when present,
	/// otherwise the page view itself).
	pub ultra_view: Option<ViewHandle>,
	/// Failure, when the chain could not be driven at all.
	pub error: Option<ViewError>,
}

impl LoadResult {
	fn failed(error: ViewError) -> Self {
		Self {
			markup: None,
			need_insert: false,
			super_view: None,
			ultra_view: None,
			error: Some(error),
		}
	}
}

/// Resolves, instantiates, renders and mounts views.
pub struct ViewDirectory {
	templates: RefCell<HashMap<String, ViewTemplate>>,
	cached_views: RefCell<HashMap<String, ViewHandle>>,
	doc: SharedDocument,
	sections: Rc<RefCell<SectionRegistry>>,
	queue: SharedQueue,
	manifest: RefCell<ManifestStore>,
	container: RefCell<Option<NodeId>>,
	current_super_path: RefCell<Option<String>>,
	current_super_view: RefCell<Option<ViewHandle>>,
	page_view: RefCell<Option<ViewHandle>>,
	config: DirectoryConfig,
}

impl std::fmt::Debug for ViewDirectory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewDirectory")
			.field("templates", &self.templates.borrow().len())
			.field("cached_views", &self.cached_views.borrow().len())
			.field("current_super_path", &self.current_super_path.borrow())
			.finish()
	}
}

impl ViewDirectory {
	/// Creates a directory over a document.
	pub fn new(doc: SharedDocument, config: DirectoryConfig) -> SharedDirectory {
		Rc::new(Self {
			templates: RefCell::new(HashMap::new()),
			cached_views: RefCell::new(HashMap::new()),
			doc,
			sections: Rc::new(RefCell::new(SectionRegistry::new())),
			queue: TaskQueue::shared(),
			manifest: RefCell::new(ManifestStore::new()),
			container: RefCell::new(None),
			current_super_path: RefCell::new(None),
			current_super_view: RefCell::new(None),
			page_view: RefCell::new(None),
			config,
		})
	}

	/// The document this directory renders into.
	pub fn doc(&self) -> SharedDocument {
		self.doc.clone()
	}

	/// The section registry context object.
	pub fn sections(&self) -> Rc<RefCell<SectionRegistry>> {
		self.sections.clone()
	}

	/// The deferred task queue.
	pub fn queue(&self) -> SharedQueue {
		self.queue.clone()
	}

	/// Drains the deferred task queue (state-change flushes).
	pub fn run_deferred(&self) -> usize {
		self.queue.run_until_idle()
	}

	/// Registers a view template under its path.
	pub fn register(&self, template: ViewTemplate) {
		self.templates
			.borrow_mut()
			.insert(template.path().to_string(), template);
	}

	/// True when a template is registered under the path.
	pub fn exists(&self, path: &str) -> bool {
		self.templates.borrow().contains_key(path)
	}

	/// Installs the hydration manifest for the next scan pass.
	pub fn set_manifest(&self, manifest: ManifestStore) {
		*self.manifest.borrow_mut() = manifest;
	}

	pub(crate) fn manifest_scan(&self, name: &str) -> Option<ViewRecord> {
		self.manifest.borrow_mut().scan(name)
	}

	pub(crate) fn manifest_instance(&self, name: &str, id: &str) -> Option<ViewRecord> {
		self.manifest.borrow().instance(name, id)
	}

	/// Pins the mount container element.
	pub fn set_container(&self, container: NodeId) {
		*self.container.borrow_mut() = Some(container);
	}

	/// The previously active superview path, if any chain is mounted.
	pub fn current_super_path(&self) -> Option<String> {
		self.current_super_path.borrow().clone()
	}

	/// The currently mounted page view.
	pub fn page_view(&self) -> Option<ViewHandle> {
		self.page_view.borrow().clone()
	}

	/// The currently mounted superview.
	pub fn current_super_view(&self) -> Option<ViewHandle> {
		self.current_super_view.borrow().clone()
	}

	fn resolve_container(&self) -> Option<NodeId> {
		if let Some(container) = *self.container.borrow() {
			return Some(container);
		}
		let doc = self.doc.borrow();
		let found = doc
			.query_by_attribute("id", Some(&self.config.container))
			.into_iter()
			.next()
			.or_else(|| {
				doc.walk(doc.root())
					.into_iter()
					.find(|&node| doc.tag_name(node) == Some("body"))
			});
		drop(doc);
		if let Some(found) = found {
			*self.container.borrow_mut() = Some(found);
		}
		found
	}

	/// Instantiates a view with a fresh state container. Unknown paths log
	/// and yield `None`.
	pub(crate) fn create_view(
		self: &Rc<Self>,
		path: &str,
		data: DataMap,
		id: Option<String>,
	) -> Option<ViewHandle> {
		let template = self.templates.borrow().get(path).cloned();
		let Some(template) = template else {
			warn!(path, "view not found");
			return None;
		};
		Some(ViewNode::create(self, template, data, id))
	}

	/// Obtains a superview instance, re-using the cached one per path so a
	/// chain extending the same layout keeps the same instance across render
	/// cycles.
	pub(crate) fn extend_view(
		self: &Rc<Self>,
		path: &str,
		data: DataMap,
		id: Option<String>,
	) -> Option<ViewHandle> {
		let cached = self.cached_views.borrow().get(path).cloned();
		if let Some(cached) = cached {
			if !cached.borrow().is_destroyed() {
				cached.borrow_mut().update_data(data);
				return Some(cached);
			}
		}
		let view = self.create_view(path, data, id)?;
		self.cached_views
			.borrow_mut()
			.insert(path.to_string(), view.clone());
		Some(view)
	}

	// ------------------------------------------------------------------
	// render / scan drivers
	// ------------------------------------------------------------------

	/// CSR driver: renders the named view and walks its superview chain
	/// upward until a node with no superview is reached.
	pub fn load_view(self: &Rc<Self>, name: &str, data: DataMap, url_path: &str) -> LoadResult {
		let Some(view) = self.create_view(name, data, None) else {
			return LoadResult::failed(ViewError::TemplateNotFound(name.to_string()));
		};
		view.borrow_mut().url_path = url_path.to_string();
		*self.page_view.borrow_mut() = Some(view.clone());

		let mut markup = ViewNode::render(&view, self);
		let (super_view, ultra) = self.walk_super_chain(&view, |node| {
			markup = ViewNode::render(node, self);
		});

		let super_path = super_view
			.as_ref()
			.map(|_| ultra.borrow().path().to_string());
		let need_insert = !(super_path.is_some() && super_path == self.current_super_path());
		match &super_path {
			Some(path) => {
				if need_insert {
					*self.current_super_path.borrow_mut() = Some(path.clone());
					*self.current_super_view.borrow_mut() = Some(ultra.clone());
					markup = ViewNode::render(&ultra, self);
				} else {
					debug!(layout = %path, "superview already mounted; partial content swap");
					markup = String::new();
				}
			}
			None => {
				// a chain without a layout supersedes whatever was active
				*self.current_super_path.borrow_mut() = None;
				*self.current_super_view.borrow_mut() = None;
			}
		}

		LoadResult {
			markup: (!markup.is_empty()).then_some(markup),
			need_insert,
			super_view,
			ultra_view: Some(ultra),
			error: None,
		}
	}

	/// Hydration driver: the identical chain walk under scan mode, feeding
	/// each view its manifest record. No markup is produced.
	pub fn scan_view(self: &Rc<Self>, name: &str, url_path: &str) -> LoadResult {
		let Some(record) = self.manifest_scan(name) else {
			warn!(name, "no manifest record for view");
			return LoadResult::failed(ViewError::TemplateNotFound(name.to_string()));
		};
		let Some(view) = self.create_view(name, record.data.clone(), Some(record.view_id.clone()))
		else {
			return LoadResult::failed(ViewError::TemplateNotFound(name.to_string()));
		};
		view.borrow_mut().url_path = url_path.to_string();
		*self.page_view.borrow_mut() = Some(view.clone());

		ViewNode::scan(&view, &record, self);
		ViewNode::virtual_render(&view, self);
		let (super_view, ultra) = self.walk_super_chain(&view, |node| {
			ViewNode::virtual_render(node, self);
		});

		let super_path = super_view
			.as_ref()
			.map(|_| ultra.borrow().path().to_string());
		let need_insert = !(super_path.is_some() && super_path == self.current_super_path());
		match &super_path {
			Some(path) => {
				if need_insert {
					*self.current_super_path.borrow_mut() = Some(path.clone());
					*self.current_super_view.borrow_mut() = Some(ultra.clone());
					ViewNode::virtual_render(&ultra, self);
				}
			}
			None => {
				*self.current_super_path.borrow_mut() = None;
				*self.current_super_view.borrow_mut() = None;
			}
		}

		LoadResult {
			markup: None,
			need_insert,
			super_view,
			ultra_view: Some(ultra),
			error: None,
		}
	}

	/// Walks upward from `view` through resolved superviews, running `pass`
	/// on every intermediate layout that itself extends further. Returns the
	/// resolved superview (if any) and the outermost chain node.
	fn walk_super_chain(
		self: &Rc<Self>,
		view: &ViewHandle,
		mut pass: impl FnMut(&ViewHandle),
	) -> (Option<ViewHandle>, ViewHandle) {
		let mut super_view: Option<ViewHandle> = None;
		let mut ultra = view.clone();
		let mut current = view.clone();
		loop {
			let next = current.borrow().superview();
			let Some(next) = next else { break };
			next.borrow_mut().is_super_view = true;
			super_view = Some(next.clone());
			ultra = next.clone();
			let extends_further = next.borrow().template.extends.is_some();
			if !extends_further {
				break;
			}
			pass(&next);
			current = next;
		}
		(super_view, ultra)
	}

	// ------------------------------------------------------------------
	// mounting
	// ------------------------------------------------------------------

	/// Renders and mounts a view chain for a navigation: resets the section
	/// registry, unmounts the previous chain, inserts markup (full
	/// reinsertion) or flushes sections (partial swap), then mounts the new
	/// chain top-down through its back references.
	pub fn mount_view(self: &Rc<Self>, name: &str, data: DataMap, url_path: &str) -> LoadResult {
		self.sections.borrow_mut().reset();
		let previous_super = self.current_super_view.borrow().clone();
		let previous_page = self.page_view.borrow_mut().take();
		if let Some(previous) = &previous_super {
			ViewNode::unmount(previous);
		}

		let result = self.load_view(name, data, url_path);
		if let Some(err) = &result.error {
			error!(name, error = %err, "view rendering failed");
			// the previous chain stays in place
			*self.page_view.borrow_mut() = previous_page;
			if let Some(previous) = &previous_super {
				ViewNode::mount(previous);
			}
			return result;
		}

		if result.need_insert {
			if let Some(markup) = &result.markup {
				match self.resolve_container() {
					Some(container) => {
						let mut doc = self.doc.borrow_mut();
						set_inner_markup(&mut doc, container, markup);
					}
					None => {
						error!("mount container not found");
						return LoadResult::failed(ViewError::ContainerNotFound);
					}
				}
			}
		}

		self.sections.borrow_mut().flush(&mut self.doc.borrow_mut());

		if let Some(previous) = previous_page {
			ViewNode::destroy(&previous);
		}
		if let Some(ultra) = &result.ultra_view {
			ViewNode::mount(ultra);
		}
		info!(name, "view mounted");
		result
	}

	/// Hydrates a server-rendered view chain: scans the whole chain against
	/// the manifest, then mounts it bottom-up. No markup is generated and
	/// failures stay silent beyond logging — hydration is best-effort
	/// enhancement over content that is already visible.
	pub fn hydrate_view(self: &Rc<Self>, name: &str, url_path: &str) -> LoadResult {
		self.sections.borrow_mut().reset();
		let result = self.scan_view(name, url_path);
		if let Some(err) = &result.error {
			warn!(name, error = %err, "hydration scan failed");
			return result;
		}
		if let Some(ultra) = &result.ultra_view {
			ViewNode::mount(ultra);
		}
		info!(name, "view hydrated");
		result
	}

	/// Dispatches an event against the mounted chains: the page view first
	/// (depth-first through its children), then the superview.
	pub fn dispatch(&self, target: NodeId, event_type: &str) -> usize {
		let roots: Vec<ViewHandle> = [self.page_view(), self.current_super_view()]
			.into_iter()
			.flatten()
			.collect();
		for root in roots {
			let handled = ViewNode::dispatch_deep(&root, target, event_type);
			if handled > 0 {
				return handled;
			}
		}
		0
	}
}
