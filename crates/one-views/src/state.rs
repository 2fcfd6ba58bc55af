//! Per-view reactive state.
//!
//! [`ViewState`] holds ordered `[value, setter, key]` slots over
//! [`serde_json::Value`], a key → listener map, and a construction write-lock.
//! Every key maps to exactly one setter; registering a key twice is a no-op
//! that hands back the existing slot's setter.
//!
//! ## Write-lock phases
//!
//! A fresh container is in its construction phase: setter calls and
//! [`update_by_key`](ViewState::update_by_key) update the stored value but
//! fire no listener, so construction-time derived values can be written
//! without triggering a reactive refresh. [`commit`](ViewState::commit) ends
//! the phase permanently; from then on every committed write invokes the
//! key's listeners synchronously with `(new, old)`.
//!
//! [`lock_updates`](ViewState::lock_updates) is the separate, idempotent
//! hydration freeze: it closes the `update_by_key` path entirely (no write,
//! no listener) so a hydrated instance does not recompute constructor-derived
//! state, while direct setters keep working.
//!
//! Updating an unknown key logs and no-ops by design — it is a template-layer
//! lookup miss, not a crash.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, warn};

/// The uniform state value type.
pub type StateValue = Value;

type Listener = Rc<dyn Fn(&StateValue, &StateValue)>;
type ChangeHook = Rc<dyn Fn(&str)>;

struct Slot {
	key: String,
	value: StateValue,
}

struct StateInner {
	slots: Vec<Slot>,
	listeners: HashMap<String, Vec<(u64, Listener)>>,
	listener_seq: u64,
	committed: bool,
	frozen: bool,
	on_change: Option<ChangeHook>,
}

impl StateInner {
	fn slot_index(&self, key: &str) -> Option<usize> {
		// linear scan: the key set is small and stable per view
		self.slots.iter().position(|slot| slot.key == key)
	}
}

/// Reactive state container owned by one view node.
///
/// Cloning shares the container (`Rc` semantics), which is how following
/// blocks and template closures keep access to the owning view's state.
#[derive(Clone)]
pub struct ViewState {
	inner: Rc<RefCell<StateInner>>,
}

impl std::fmt::Debug for ViewState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.borrow();
		f.debug_struct("ViewState")
			.field("keys", &inner.slots.iter().map(|s| &s.key).collect::<Vec<_>>())
			.field("committed", &inner.committed)
			.field("frozen", &inner.frozen)
			.finish()
	}
}

impl Default for ViewState {
	fn default() -> Self {
		Self::new()
	}
}

impl ViewState {
	/// Creates an empty container in its construction phase.
	pub fn new() -> Self {
		Self {
			inner: Rc::new(RefCell::new(StateInner {
				slots: Vec::new(),
				listeners: HashMap::new(),
				listener_seq: 0,
				committed: false,
				frozen: false,
				on_change: None,
			})),
		}
	}

	/// Registers a keyed slot and returns its setter.
	///
	/// Registering an already-known key is a no-op: the stored value is left
	/// untouched and the existing slot's setter is returned.
	pub fn register(&self, key: &str, initial: StateValue) -> Setter {
		let mut inner = self.inner.borrow_mut();
		let index = match inner.slot_index(key) {
			Some(existing) => existing,
			None => {
				inner.slots.push(Slot {
					key: key.to_string(),
					value: initial,
				});
				inner.slots.len() - 1
			}
		};
		Setter {
			inner: Rc::downgrade(&self.inner),
			index,
		}
	}

	/// Reads a value by key.
	pub fn get(&self, key: &str) -> Option<StateValue> {
		let inner = self.inner.borrow();
		inner
			.slot_index(key)
			.map(|index| inner.slots[index].value.clone())
	}

	/// Registered keys in slot order.
	pub fn keys(&self) -> Vec<String> {
		self.inner
			.borrow()
			.slots
			.iter()
			.map(|slot| slot.key.clone())
			.collect()
	}

	/// Updates a slot by key.
	///
	/// Unknown keys log and no-op. While [`lock_updates`](Self::lock_updates)
	/// is in effect nothing is written. Listeners fire synchronously only
	/// after [`commit`](Self::commit).
	pub fn update_by_key(&self, key: &str, value: StateValue) {
		let (old, fire) = {
			let mut inner = self.inner.borrow_mut();
			let Some(index) = inner.slot_index(key) else {
				warn!(key, "state key not found");
				return;
			};
			if inner.frozen {
				debug!(key, "state updates are locked");
				return;
			}
			let old = std::mem::replace(&mut inner.slots[index].value, value.clone());
			(old, inner.committed)
		};
		if fire {
			self.fire(key, &value, &old);
		}
	}

	/// Subscribes to changes of one key. Dropping the returned subscription
	/// does not unsubscribe; call [`Subscription::cancel`].
	pub fn subscribe(&self, key: &str, listener: impl Fn(&StateValue, &StateValue) + 'static) -> Subscription {
		let mut inner = self.inner.borrow_mut();
		inner.listener_seq += 1;
		let id = inner.listener_seq;
		inner
			.listeners
			.entry(key.to_string())
			.or_default()
			.push((id, Rc::new(listener)));
		Subscription {
			inner: Rc::downgrade(&self.inner),
			key: key.to_string(),
			id,
		}
	}

	/// Ends the construction phase. Idempotent; the lock stays open for the
	/// container's lifetime.
	pub fn commit(&self) {
		self.inner.borrow_mut().committed = true;
	}

	/// True once the construction phase has ended.
	pub fn is_committed(&self) -> bool {
		self.inner.borrow().committed
	}

	/// Freezes the `update_by_key` path entirely. Idempotent.
	pub fn lock_updates(&self) {
		self.inner.borrow_mut().frozen = true;
	}

	/// True when the `update_by_key` path is frozen.
	pub fn is_locked(&self) -> bool {
		self.inner.borrow().frozen
	}

	/// Installs the owning view's changed-key hook, invoked after listeners
	/// on every committed write.
	pub fn set_change_hook(&self, hook: impl Fn(&str) + 'static) {
		self.inner.borrow_mut().on_change = Some(Rc::new(hook));
	}

	/// Snapshot of every slot as a JSON object in slot order.
	pub fn to_json(&self) -> Value {
		let inner = self.inner.borrow();
		let mut object = serde_json::Map::new();
		for slot in &inner.slots {
			object.insert(slot.key.clone(), slot.value.clone());
		}
		Value::Object(object)
	}

	fn fire(&self, key: &str, new: &StateValue, old: &StateValue) {
		// clone the listener list out so callbacks may (un)subscribe freely
		let (listeners, hook) = {
			let inner = self.inner.borrow();
			let listeners: Vec<Listener> = inner
				.listeners
				.get(key)
				.map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
				.unwrap_or_default();
			(listeners, inner.on_change.clone())
		};
		for listener in listeners {
			listener(new, old);
		}
		if let Some(hook) = hook {
			hook(key);
		}
	}

	fn set_by_index(&self, index: usize, value: StateValue) {
		let (key, old, fire) = {
			let mut inner = self.inner.borrow_mut();
			let Some(slot) = inner.slots.get_mut(index) else {
				return;
			};
			let key = slot.key.clone();
			let old = std::mem::replace(&mut slot.value, value.clone());
			// the freeze gates keyed writes only; direct setters stay live so
			// event-driven updates keep working on hydrated instances
			(key, old, inner.committed)
		};
		if fire {
			self.fire(&key, &value, &old);
		}
	}
}

/// Setter handle for one slot.
#[derive(Clone)]
pub struct Setter {
	inner: Weak<RefCell<StateInner>>,
	index: usize,
}

impl Setter {
	/// Writes the slot value. Fires listeners only once the owning container
	/// is committed and not frozen.
	pub fn set(&self, value: StateValue) {
		if let Some(inner) = self.inner.upgrade() {
			ViewState { inner }.set_by_index(self.index, value);
		}
	}
}

impl std::fmt::Debug for Setter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Setter").field("index", &self.index).finish()
	}
}

/// Handle to one key subscription.
#[derive(Debug)]
pub struct Subscription {
	inner: Weak<RefCell<StateInner>>,
	key: String,
	id: u64,
}

impl Subscription {
	/// Removes the listener.
	pub fn cancel(&self) {
		let Some(inner) = self.inner.upgrade() else {
			return;
		};
		let mut inner = inner.borrow_mut();
		if let Some(entries) = inner.listeners.get_mut(&self.key) {
			entries.retain(|(id, _)| *id != self.id);
			if entries.is_empty() {
				inner.listeners.remove(&self.key);
			}
		}
	}

	/// The subscribed key.
	pub fn key(&self) -> &str {
		&self.key
	}
}
