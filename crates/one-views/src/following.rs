//! Following blocks.
//!
//! A following block is a named, independently re-renderable fragment tied to
//! a set of state keys. It owns a sentinel-delimited range
//! (`[one:follow type="state" id=".." following="k1,k2"]`) and, on any
//! subscribed key change, replaces only its own nodes — the rest of the view
//! is untouched.
//!
//! State machine: created → mounted → (renew)* → unmounted → destroyed.
//! During a scan pass the block does not render; it locates its pre-existing
//! range by sentinel id and defers the first actual render to the next state
//! change. A renew whose close sentinel has been detached (an ancestor was
//! replaced) is a safe no-op.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use one_dom::{Locator, MarkupRange, NodeId, SharedDocument, close_marker, insert_markup_before, open_marker};
use tracing::{debug, warn};

use crate::state::{Subscription, ViewState};
use crate::view::ViewNode;

/// Shared handle to a following block.
pub type BlockHandle = Rc<RefCell<FollowingBlock>>;

/// Zero-argument fragment producer.
pub type FragmentFn = Rc<dyn Fn() -> String>;

/// An independently re-renderable fragment of a view.
pub struct FollowingBlock {
	id: String,
	state_keys: Vec<String>,
	fragment: FragmentFn,
	state: ViewState,
	doc: SharedDocument,
	owner: Weak<RefCell<ViewNode>>,
	range: Option<MarkupRange>,
	subscriptions: Vec<Subscription>,
	mounted: bool,
	scanned: bool,
	destroyed: bool,
}

impl std::fmt::Debug for FollowingBlock {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FollowingBlock")
			.field("id", &self.id)
			.field("state_keys", &self.state_keys)
			.field("mounted", &self.mounted)
			.field("scanned", &self.scanned)
			.finish()
	}
}

impl FollowingBlock {
	pub(crate) fn create(
		id: String,
		state_keys: Vec<String>,
		fragment: FragmentFn,
		state: ViewState,
		doc: SharedDocument,
		owner: Weak<RefCell<ViewNode>>,
	) -> BlockHandle {
		Rc::new(RefCell::new(Self {
			id,
			state_keys,
			fragment,
			state,
			doc,
			owner,
			range: None,
			subscriptions: Vec::new(),
			mounted: false,
			scanned: false,
			destroyed: false,
		}))
	}

	/// The block's sentinel id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The subscribed state keys.
	pub fn state_keys(&self) -> &[String] {
		&self.state_keys
	}

	/// True while mounted (subscriptions live).
	pub fn is_mounted(&self) -> bool {
		self.mounted
	}

	/// True once the range has been located.
	pub fn is_scanned(&self) -> bool {
		self.scanned
	}

	/// The located nodes as of the last scan.
	pub fn range_nodes(&self) -> Vec<NodeId> {
		self.range
			.as_ref()
			.map(|range| range.nodes().to_vec())
			.unwrap_or_default()
	}

	/// The close sentinel node, once located.
	pub fn close_sentinel(&self) -> Option<NodeId> {
		self.range.as_ref().map(MarkupRange::close)
	}

	/// Emits the sentinel-wrapped fragment for a markup pass.
	pub fn render_markup(&self) -> String {
		let following = self.state_keys.join(",");
		format!(
			"{}{}{}",
			open_marker(
				"follow",
				&[("type", "state"), ("id", &self.id), ("following", &following)],
			),
			(self.fragment)(),
			close_marker("follow"),
		)
	}

	/// Locates (or re-derives) the block's range from the live tree.
	pub(crate) fn locate(&mut self) {
		let doc = self.doc.clone();
		let doc = doc.borrow();
		match &mut self.range {
			Some(range) => {
				range.rescan(&doc);
			}
			None => {
				let mut locator = Locator::new();
				self.range = locator.first(&doc, "follow", &[("id", &self.id)]);
				if self.range.is_none() {
					debug!(id = %self.id, "following range not found in tree");
				}
			}
		}
		self.scanned = true;
	}

	/// Subscribes the block to its state keys and locates its range.
	pub fn mount(block: &BlockHandle) {
		let (keys, state) = {
			let mut this = block.borrow_mut();
			if this.mounted || this.destroyed {
				return;
			}
			this.mounted = true;
			this.locate();
			(this.state_keys.clone(), this.state.clone())
		};
		let mut subscriptions = Vec::new();
		for key in keys {
			let weak = Rc::downgrade(block);
			subscriptions.push(state.subscribe(&key, move |_, _| {
				if let Some(block) = weak.upgrade() {
					FollowingBlock::renew(&block);
				}
			}));
		}
		block.borrow_mut().subscriptions = subscriptions;
	}

	/// Cancels every subscription.
	pub fn unmount(block: &BlockHandle) {
		let subscriptions = {
			let mut this = block.borrow_mut();
			if !this.mounted {
				return;
			}
			this.mounted = false;
			std::mem::take(&mut this.subscriptions)
		};
		for subscription in subscriptions {
			subscription.cancel();
		}
	}

	/// Re-renders the block's own range in place.
	///
	/// The owning view's event bindings are paused around the swap. When the
	/// close sentinel is no longer attached the renew is a no-op and the
	/// block stays unmounted.
	pub fn renew(block: &BlockHandle) {
		let owner = block.borrow().owner.upgrade();
		if let Some(owner) = &owner {
			ViewNode::pause_events(owner);
		}

		Self::unmount(block);
		let (doc, close, fragment, old_nodes) = {
			let this = block.borrow();
			(
				this.doc.clone(),
				this.range.as_ref().map(MarkupRange::close),
				this.fragment.clone(),
				this.range
					.as_ref()
					.map(|range| range.nodes().to_vec())
					.unwrap_or_default(),
			)
		};
		{
			let mut doc = doc.borrow_mut();
			for node in old_nodes {
				doc.remove_node(node);
			}
		}

		let attached_close = close.filter(|&c| doc.borrow().is_attached(c));
		match attached_close {
			Some(close) => {
				let markup = fragment();
				{
					let mut doc = doc.borrow_mut();
					insert_markup_before(&mut doc, close, &markup);
				}
				Self::mount(block);
			}
			None => {
				let id = block.borrow().id.clone();
				warn!(id = %id, "close sentinel detached; skipping renew");
			}
		}

		if let Some(owner) = &owner {
			ViewNode::resume_events(owner);
		}
	}

	/// Unmounts the block and removes its located nodes.
	pub fn destroy(block: &BlockHandle) {
		Self::unmount(block);
		let (doc, nodes) = {
			let mut this = block.borrow_mut();
			this.destroyed = true;
			(
				this.doc.clone(),
				this.range
					.as_ref()
					.map(|range| range.nodes().to_vec())
					.unwrap_or_default(),
			)
		};
		let mut doc = doc.borrow_mut();
		for node in nodes {
			doc.remove_node(node);
		}
	}
}
