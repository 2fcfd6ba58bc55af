//! The hydration manifest.
//!
//! A server render delivers one record per view instance describing its id,
//! data, following blocks and children. Records are grouped by view path and
//! kept in manifest order; the scan pass consumes them strictly positionally,
//! matching declarations against template execution order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ManifestError;

/// Data bag type shared by manifests and views.
pub type DataMap = serde_json::Map<String, Value>;

/// One following block declared by a server-rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowingRecord {
	/// Sentinel id of the block's range.
	pub id: String,
	/// State keys the block subscribes to.
	#[serde(rename = "stateKeys", default)]
	pub state_keys: Vec<String>,
}

/// One child view declared by a server-rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRecord {
	/// Logical path of the child view.
	pub name: String,
	/// Instance id of the child view.
	pub id: String,
}

/// One server-rendered view instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewRecord {
	/// Instance id assigned by the server render.
	#[serde(rename = "viewId")]
	pub view_id: String,
	/// The view's data bag.
	#[serde(default)]
	pub data: DataMap,
	/// Event wiring emitted by the server; bindings are re-derived from the
	/// template pass, so this is carried opaquely.
	#[serde(default)]
	pub events: Value,
	/// Following blocks in template execution order.
	#[serde(default)]
	pub following: Vec<FollowingRecord>,
	/// Child views in template execution order.
	#[serde(default)]
	pub children: Vec<ChildRecord>,
	/// Parent instance id, if any.
	#[serde(default)]
	pub parent: Option<String>,
}

impl ViewRecord {
	/// Creates a record for an instance id.
	pub fn new(view_id: impl Into<String>) -> Self {
		Self {
			view_id: view_id.into(),
			..Self::default()
		}
	}
}

/// Ordered records of one view path with a positional cursor.
#[derive(Debug, Clone, Default)]
pub struct ViewRecordSet {
	records: Vec<ViewRecord>,
	cursor: usize,
}

impl ViewRecordSet {
	/// Yields the next unconsumed record, advancing the cursor.
	pub fn scan(&mut self) -> Option<&ViewRecord> {
		let record = self.records.get(self.cursor)?;
		self.cursor += 1;
		Some(record)
	}

	/// Random access by instance id; does not move the cursor.
	pub fn by_id(&self, id: &str) -> Option<&ViewRecord> {
		self.records.iter().find(|record| record.view_id == id)
	}

	/// Number of records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// True when the set holds no records.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// All manifest records, grouped by view path.
#[derive(Debug, Clone, Default)]
pub struct ManifestStore {
	sets: HashMap<String, ViewRecordSet>,
}

impl ManifestStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Decodes the out-of-band manifest payload: a JSON object mapping view
	/// path to an ordered record array.
	pub fn from_json(payload: &str) -> Result<Self, ManifestError> {
		let parsed: HashMap<String, Vec<ViewRecord>> = serde_json::from_str(payload)?;
		Ok(Self::from_records(parsed))
	}

	/// Builds a store from already-decoded records.
	pub fn from_records(records: HashMap<String, Vec<ViewRecord>>) -> Self {
		let sets = records
			.into_iter()
			.map(|(name, records)| (name, ViewRecordSet { records, cursor: 0 }))
			.collect();
		Self { sets }
	}

	/// Yields the next unconsumed record for a view path.
	pub fn scan(&mut self, name: &str) -> Option<ViewRecord> {
		self.sets.get_mut(name)?.scan().cloned()
	}

	/// Random access by path and instance id.
	pub fn instance(&self, name: &str, id: &str) -> Option<ViewRecord> {
		self.sets.get(name)?.by_id(id).cloned()
	}

	/// True when no records are loaded at all.
	pub fn is_empty(&self) -> bool {
		self.sets.values().all(ViewRecordSet::is_empty)
	}
}
