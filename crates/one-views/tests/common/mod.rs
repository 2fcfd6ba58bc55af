//! Shared fixtures: a small template set (two layouts, three pages, one
//! component) and helpers to drive the runtime and extract relationship
//! graphs.

#![allow(dead_code)]

use std::collections::HashMap;

use serde_json::json;

use one_dom::{Document, NodeId, SharedDocument, serialize_children};
use one_views::{
	ChildRecord, DataMap, DirectoryConfig, FollowingRecord, ManifestStore, SectionKind,
	SharedDirectory, ViewDirectory, ViewHandle, ViewRecord, ViewTemplate,
};

pub struct Runtime {
	pub doc: SharedDocument,
	pub directory: SharedDirectory,
}

/// Fresh document with `<body><div id="app"></div></body>` plus a directory
/// with the fixture templates registered.
pub fn runtime() -> Runtime {
	let doc = Document::shared();
	{
		let mut d = doc.borrow_mut();
		let root = d.root();
		let body = d.create_element("body");
		d.append_child(root, body);
		let app = d.create_element_with_attrs("div", &[("id", "app")]);
		d.append_child(body, app);
	}
	let directory = directory_over(doc.clone());
	Runtime { doc, directory }
}

/// A second directory over an existing (already rendered) document.
pub fn directory_over(doc: SharedDocument) -> SharedDirectory {
	let directory = ViewDirectory::new(doc, DirectoryConfig::default());
	register_templates(&directory);
	directory
}

pub fn register_templates(directory: &SharedDirectory) {
	directory.register(layout_base());
	directory.register(layout_admin());
	directory.register(page_home());
	directory.register(page_about());
	directory.register(page_admin());
	directory.register(badge());
}

pub fn app_container(doc: &SharedDocument) -> NodeId {
	doc.borrow()
		.query_by_attribute("id", Some("app"))
		.into_iter()
		.next()
		.expect("app container")
}

pub fn container_markup(doc: &SharedDocument) -> String {
	let container = app_container(doc);
	serialize_children(&doc.borrow(), container)
}

fn layout_base() -> ViewTemplate {
	ViewTemplate::new("layouts.base", |scope| {
		Ok(format!(
			"<header{}>one</header><main{}>{}</main>",
			scope.yield_attr("data-title", "page.title", "untitled"),
			scope.content_target("page.content"),
			scope.yield_section("page.content", ""),
		))
	})
}

fn layout_admin() -> ViewTemplate {
	ViewTemplate::new("layouts.admin", |scope| {
		Ok(format!(
			"<nav>admin</nav><main{}>{}</main>",
			scope.content_target("page.content"),
			scope.yield_section("page.content", ""),
		))
	})
}

fn page_home() -> ViewTemplate {
	ViewTemplate::new("web.home", |scope| {
		scope.extends("layouts.base", DataMap::new());
		scope.section("page.title", "Home", SectionKind::Text);

		let counter_state = scope.states();
		let counter = scope.follow(&["count"], move || {
			format!(
				"<span class=\"count\">{}</span>",
				counter_state.get("count").unwrap_or(json!(0))
			)
		});

		let label_state = scope.states();
		let label = scope.follow(&["label"], move || {
			format!(
				"<em>{}</em>",
				label_state
					.get("label")
					.and_then(|v| v.as_str().map(str::to_string))
					.unwrap_or_default()
			)
		});

		let click_state = scope.states();
		let button = scope.event("click", move |_| {
			let current = click_state
				.get("count")
				.and_then(|v| v.as_i64())
				.unwrap_or(0);
			click_state.update_by_key("count", json!(current + 1));
		});

		let badge = scope.include("components.badge", DataMap::new(), &["count"]);

		let content = format!(
			"<div class=\"home\">{}{}<button{}>+</button>{}</div>",
			counter, label, button, badge
		);
		scope.section("page.content", &content, SectionKind::Markup);
		Ok(content)
	})
	.extends("layouts.base")
	.long_sections(&["page.content"])
	.setup(|data, state| {
		state.register("count", data.get("count").cloned().unwrap_or(json!(0)));
		state.register("label", data.get("label").cloned().unwrap_or(json!("ready")));
	})
}

fn page_about() -> ViewTemplate {
	ViewTemplate::new("web.about", |scope| {
		scope.extends("layouts.base", DataMap::new());
		scope.section("page.title", "About", SectionKind::Text);
		let content = "<div class=\"about\">about us</div>".to_string();
		scope.section("page.content", &content, SectionKind::Markup);
		Ok(content)
	})
	.extends("layouts.base")
	.long_sections(&["page.content"])
}

fn page_admin() -> ViewTemplate {
	ViewTemplate::new("web.admin", |scope| {
		scope.extends("layouts.admin", DataMap::new());
		let content = "<div class=\"admin\">dashboard</div>".to_string();
		scope.section("page.content", &content, SectionKind::Markup);
		Ok(content)
	})
	.extends("layouts.admin")
	.long_sections(&["page.content"])
}

fn badge() -> ViewTemplate {
	ViewTemplate::new("components.badge", |scope| {
		Ok(format!(
			"<span class=\"badge\">{}</span>",
			scope.escape(&scope.data_str("label"))
		))
	})
}

/// One node of the relationship graph, comparable across runtimes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeSig {
	pub path: String,
	pub id: String,
	pub children: Vec<(String, String, Vec<String>)>,
	pub following: Vec<(String, Vec<String>)>,
}

/// Flattens the relationship graph below a view (children depth-first, then
/// the superview chain) into sorted signatures.
pub fn graph_signature(view: &ViewHandle) -> Vec<NodeSig> {
	let mut out = Vec::new();
	collect_signature(view, &mut out);
	out.sort();
	out
}

fn collect_signature(view: &ViewHandle, out: &mut Vec<NodeSig>) {
	let (sig, children, superview) = {
		let v = view.borrow();
		let children: Vec<(String, String, Vec<String>)> = v
			.children()
			.iter()
			.map(|scope| (scope.name.clone(), scope.id.clone(), scope.subscribed_keys.clone()))
			.collect();
		let following: Vec<(String, Vec<String>)> = v
			.following_ids()
			.into_iter()
			.map(|id| {
				let keys = v
					.following_block(&id)
					.map(|block| block.borrow().state_keys().to_vec())
					.unwrap_or_default();
				(id, keys)
			})
			.collect();
		(
			NodeSig {
				path: v.path().to_string(),
				id: v.id().to_string(),
				children,
				following: following.clone(),
			},
			v.children().iter().map(|scope| scope.view.clone()).collect::<Vec<_>>(),
			v.superview(),
		)
	};
	out.push(sig);
	for child in children {
		collect_signature(&child, out);
	}
	if let Some(superview) = superview {
		let already = out.iter().any(|sig| sig.id == superview.borrow().id());
		if !already {
			collect_signature(&superview, out);
		}
	}
}

/// Builds the manifest a server render would deliver for the mounted chain:
/// one record per instance, with the live state snapshot folded into the data
/// bag and children/following listed in template execution order.
pub fn manifest_from(view: &ViewHandle) -> ManifestStore {
	let mut records: HashMap<String, Vec<ViewRecord>> = HashMap::new();
	collect_records(view, &mut records);
	ManifestStore::from_records(records)
}

fn collect_records(view: &ViewHandle, records: &mut HashMap<String, Vec<ViewRecord>>) {
	let (path, record, children, superview) = {
		let v = view.borrow();
		let mut record = ViewRecord::new(v.id());
		record.data = v.data().clone();
		if let serde_json::Value::Object(state) = v.state().to_json() {
			for (key, value) in state {
				record.data.insert(key, value);
			}
		}
		for id in v.following_ids() {
			let keys = v
				.following_block(&id)
				.map(|block| block.borrow().state_keys().to_vec())
				.unwrap_or_default();
			record.following.push(FollowingRecord {
				id,
				state_keys: keys,
			});
		}
		for scope in v.children() {
			record.children.push(ChildRecord {
				name: scope.name.clone(),
				id: scope.id.clone(),
			});
		}
		(
			v.path().to_string(),
			record,
			v.children().iter().map(|scope| scope.view.clone()).collect::<Vec<_>>(),
			v.superview(),
		)
	};
	records.entry(path).or_default().push(record);
	for child in children {
		collect_records(&child, records);
	}
	if let Some(superview) = superview {
		let id = superview.borrow().id().to_string();
		let seen = records
			.values()
			.flatten()
			.any(|record| record.view_id == id);
		if !seen {
			collect_records(&superview, records);
		}
	}
}
