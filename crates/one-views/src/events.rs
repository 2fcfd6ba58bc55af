//! Event wiring.
//!
//! Handlers are addressed through per-event handler-id attributes of the form
//! `data-<event>-id="<viewId>-<event>-<n>"`. The template pass registers a
//! handler stack per id while emitting (or, in scan mode, re-deriving) the
//! matching attribute; starting the bindings resolves the attribute back to
//! live elements, and dispatch bubbles from a target node to the nearest
//! carrying ancestor. The `<n>` sequence is deterministic per view and event
//! type, which is what lets a hydration pass reattach to server-emitted
//! attributes without touching markup.

use std::collections::HashMap;
use std::rc::Rc;

use one_dom::{Document, NodeId};
use tracing::{debug, warn};

/// A dispatched event instance.
#[derive(Debug, Clone)]
pub struct Event {
	/// Event type, e.g. `click`.
	pub event_type: String,
	/// The tree node the event was dispatched on.
	pub target: NodeId,
}

/// Handler callback type.
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// Returns the handler-id attribute name for an event type.
pub fn event_attr(event_type: &str) -> String {
	format!("data-{}-id", event_type)
}

/// Per-view event handler registry.
pub struct EventBindings {
	view_id: String,
	sequences: HashMap<String, usize>,
	handlers: Vec<(String, String, Vec<EventHandler>)>, // (event_type, event_id, stack)
	active: bool,
}

impl std::fmt::Debug for EventBindings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventBindings")
			.field("view_id", &self.view_id)
			.field("handlers", &self.handlers.len())
			.field("active", &self.active)
			.finish()
	}
}

impl EventBindings {
	/// Creates an empty registry for a view instance.
	pub fn new(view_id: impl Into<String>) -> Self {
		Self {
			view_id: view_id.into(),
			sequences: HashMap::new(),
			handlers: Vec::new(),
			active: false,
		}
	}

	/// Registers a handler stack entry and returns the attribute text to
	/// stamp on the owning element, e.g. ` data-click-id="v-1-click-0"`.
	pub fn add(&mut self, event_type: &str, handler: EventHandler) -> String {
		let sequence = self.sequences.entry(event_type.to_string()).or_insert(0);
		let event_id = format!("{}-{}-{}", self.view_id, event_type, sequence);
		*sequence += 1;

		match self.handlers.iter().position(|(_, id, _)| *id == event_id) {
			Some(found) => self.handlers[found].2.push(handler),
			None => self
				.handlers
				.push((event_type.to_string(), event_id.clone(), vec![handler])),
		}
		format!(" {}=\"{}\"", event_attr(event_type), event_id)
	}

	/// Resets the id sequences for a fresh template pass. Registered handler
	/// stacks are replaced as the pass re-registers them.
	pub fn begin_pass(&mut self) {
		self.sequences.clear();
		self.handlers.clear();
	}

	/// Activates the bindings; handler ids with no live element are dropped.
	pub fn start(&mut self, doc: &Document) {
		self.handlers.retain(|(event_type, event_id, _)| {
			let attr = event_attr(event_type);
			let found = !doc.query_by_attribute(&attr, Some(event_id)).is_empty();
			if !found {
				warn!(event_id = %event_id, "no element found for event binding");
			}
			found
		});
		self.active = true;
	}

	/// Deactivates the bindings. Handler stacks stay registered.
	pub fn stop(&mut self) {
		self.active = false;
	}

	/// True while bindings are attached.
	pub fn is_active(&self) -> bool {
		self.active
	}

	/// Drops handler ids that no longer resolve to a live element.
	pub fn clear_orphaned(&mut self, doc: &Document) {
		let before = self.handlers.len();
		self.handlers.retain(|(event_type, event_id, _)| {
			!doc
				.query_by_attribute(&event_attr(event_type), Some(event_id))
				.is_empty()
		});
		if self.handlers.len() < before {
			debug!(
				dropped = before - self.handlers.len(),
				view_id = %self.view_id,
				"cleared orphaned event bindings"
			);
		}
	}

	/// Resolves the handler stack for a dispatch on `target`, walking up to
	/// the nearest element carrying the event's handler-id attribute.
	///
	/// Returns the cloned stack so the caller can invoke it without holding
	/// any borrow of the owning view.
	pub fn resolve(&self, doc: &Document, target: NodeId, event_type: &str) -> Vec<EventHandler> {
		if !self.active {
			return Vec::new();
		}
		let attr = event_attr(event_type);
		let Some(carrier) = doc.closest_with_attribute(target, &attr) else {
			return Vec::new();
		};
		let Some(event_id) = doc.get_attribute(carrier, &attr) else {
			return Vec::new();
		};
		self.handlers
			.iter()
			.find(|(_, id, _)| id == event_id)
			.map(|(_, _, stack)| stack.clone())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::RefCell;

	#[test]
	fn test_add_produces_sequential_ids() {
		let mut bindings = EventBindings::new("v-1");
		let noop: EventHandler = Rc::new(|_| {});
		assert_eq!(
			bindings.add("click", noop.clone()),
			" data-click-id=\"v-1-click-0\""
		);
		assert_eq!(
			bindings.add("click", noop.clone()),
			" data-click-id=\"v-1-click-1\""
		);
		assert_eq!(
			bindings.add("input", noop),
			" data-input-id=\"v-1-input-0\""
		);
	}

	#[test]
	fn test_begin_pass_restarts_sequences() {
		let mut bindings = EventBindings::new("v-1");
		let noop: EventHandler = Rc::new(|_| {});
		bindings.add("click", noop.clone());
		bindings.begin_pass();
		assert_eq!(
			bindings.add("click", noop),
			" data-click-id=\"v-1-click-0\""
		);
	}

	#[test]
	fn test_resolve_bubbles_to_carrier() {
		let mut doc = Document::new();
		let body = doc.create_element("body");
		let root = doc.root();
		doc.append_child(root, body);
		let button = doc.create_element_with_attrs("button", &[("data-click-id", "v-1-click-0")]);
		let inner = doc.create_element("span");
		doc.append_child(body, button);
		doc.append_child(button, inner);

		let mut bindings = EventBindings::new("v-1");
		let fired = Rc::new(RefCell::new(0));
		let fired_inner = fired.clone();
		bindings.add("click", Rc::new(move |_| *fired_inner.borrow_mut() += 1));
		bindings.start(&doc);

		for handler in bindings.resolve(&doc, inner, "click") {
			handler(&Event {
				event_type: "click".to_string(),
				target: inner,
			});
		}
		assert_eq!(*fired.borrow(), 1);
	}

	#[test]
	fn test_start_drops_bindings_without_elements() {
		let doc = Document::new();
		let mut bindings = EventBindings::new("v-1");
		bindings.add("click", Rc::new(|_| {}));
		bindings.start(&doc);
		assert!(bindings.is_active());
		assert!(bindings.resolve(&doc, doc.root(), "click").is_empty());
	}

	#[test]
	fn test_stopped_bindings_resolve_nothing() {
		let mut doc = Document::new();
		let root = doc.root();
		let button = doc.create_element_with_attrs("button", &[("data-click-id", "v-1-click-0")]);
		doc.append_child(root, button);

		let mut bindings = EventBindings::new("v-1");
		bindings.add("click", Rc::new(|_| {}));
		bindings.start(&doc);
		bindings.stop();
		assert!(bindings.resolve(&doc, button, "click").is_empty());
	}
}
