//! Client-side rendering flow: mounting, the superview reinsertion decision,
//! following-block isolation, error containment and event wiring.

mod common;

use serde_json::json;

use common::{app_container, container_markup, runtime};
use one_dom::serialize_children;
use one_views::{DataMap, ViewError, ViewNode, ViewTemplate};

#[test]
fn test_mount_renders_layout_with_page_content() {
	let rt = runtime();
	let result = rt.directory.mount_view("web.home", DataMap::new(), "/");
	assert!(result.error.is_none());
	assert!(result.need_insert);

	let markup = container_markup(&rt.doc);
	assert!(markup.contains("<header"), "layout chrome present: {markup}");
	assert!(markup.contains("data-title=\"Home\""));
	assert!(markup.contains("class=\"count\""));
	assert!(markup.contains("class=\"badge\""));

	let page = rt.directory.page_view().unwrap();
	assert!(page.borrow().is_mounted());
	assert_eq!(page.borrow().children().len(), 1);
	assert_eq!(page.borrow().following_ids().len(), 2);
	let layout = rt.directory.current_super_view().unwrap();
	assert!(layout.borrow().is_mounted());
	assert_eq!(rt.directory.current_super_path().as_deref(), Some("layouts.base"));
}

#[test]
fn test_same_layout_second_render_is_partial_swap() {
	let rt = runtime();
	rt.directory.mount_view("web.home", DataMap::new(), "/");

	let container = app_container(&rt.doc);
	let chrome_before: Vec<_> = rt.doc.borrow().children(container).to_vec();
	let layout_before = rt.directory.current_super_view().unwrap();

	let result = rt.directory.mount_view("web.about", DataMap::new(), "/about");
	assert!(!result.need_insert, "same layout must not reinsert");

	// the layout's own nodes are untouched, node for node
	let chrome_after: Vec<_> = rt.doc.borrow().children(container).to_vec();
	assert_eq!(chrome_before, chrome_after);
	let layout_after = rt.directory.current_super_view().unwrap();
	assert!(std::rc::Rc::ptr_eq(&layout_before, &layout_after));

	// only the yielded content was swapped
	let markup = container_markup(&rt.doc);
	assert!(markup.contains("about us"));
	assert!(!markup.contains("class=\"home\""));
	assert!(markup.contains("data-title=\"About\""));
}

#[test]
fn test_different_layout_triggers_full_reinsertion() {
	let rt = runtime();
	rt.directory.mount_view("web.home", DataMap::new(), "/");
	let container = app_container(&rt.doc);
	let chrome_before: Vec<_> = rt.doc.borrow().children(container).to_vec();

	let result = rt.directory.mount_view("web.admin", DataMap::new(), "/admin");
	assert!(result.need_insert, "different layout must reinsert");

	let chrome_after: Vec<_> = rt.doc.borrow().children(container).to_vec();
	assert_ne!(chrome_before, chrome_after);
	let markup = container_markup(&rt.doc);
	assert!(markup.contains("<nav>admin</nav>"));
	assert!(!markup.contains("<header"));
	assert_eq!(
		rt.directory.current_super_path().as_deref(),
		Some("layouts.admin")
	);
}

#[test]
fn test_following_block_isolation() {
	let rt = runtime();
	rt.directory.mount_view("web.home", DataMap::new(), "/");
	let page = rt.directory.page_view().unwrap();

	let ids = page.borrow().following_ids();
	let count_block = page.borrow().following_block(&ids[0]).unwrap();
	let label_block = page.borrow().following_block(&ids[1]).unwrap();
	let label_nodes_before = label_block.borrow().range_nodes();
	assert!(!label_nodes_before.is_empty());

	let state = page.borrow().state();
	state.update_by_key("count", json!(41));

	// the subscribed block re-rendered its own range
	let markup = container_markup(&rt.doc);
	assert!(markup.contains("<span class=\"count\">41</span>"));
	assert!(!count_block.borrow().range_nodes().is_empty());

	// the disjoint block's located range is untouched, reference-equal
	assert_eq!(label_block.borrow().range_nodes(), label_nodes_before);
}

#[test]
fn test_click_dispatch_updates_following_block() {
	let rt = runtime();
	rt.directory.mount_view("web.home", DataMap::new(), "/");

	let button = rt
		.doc
		.borrow()
		.query_by_attribute_contains("data-click-id", "-click-")
		.into_iter()
		.next()
		.expect("button with handler id");
	let handled = rt.directory.dispatch(button, "click");
	assert_eq!(handled, 1);
	assert!(container_markup(&rt.doc).contains("<span class=\"count\">1</span>"));

	rt.directory.dispatch(button, "click");
	assert!(container_markup(&rt.doc).contains("<span class=\"count\">2</span>"));
}

#[test]
fn test_deferred_flush_refreshes_subscribed_child() {
	let rt = runtime();
	rt.directory.mount_view("web.home", DataMap::new(), "/");
	let page = rt.directory.page_view().unwrap();
	let badge_before = page.borrow().children()[0].id.clone();

	page.borrow().state().update_by_key("count", json!(9));
	assert!(!rt.directory.queue().is_idle(), "flush must be scheduled");
	rt.directory.run_deferred();

	// the badge child subscribed to `count` was re-rendered in place
	let badge_after = page.borrow().children()[0].id.clone();
	assert_eq!(badge_before, badge_after, "child identity is stable");
	assert!(container_markup(&rt.doc).contains("class=\"badge\""));

	// coalescing: several writes in one turn produce a single pending flush
	page.borrow().state().update_by_key("count", json!(1));
	page.borrow().state().update_by_key("label", json!("x"));
	assert_eq!(rt.directory.run_deferred(), 1);
}

#[test]
fn test_destroyed_view_makes_pending_flush_noop() {
	let rt = runtime();
	rt.directory.mount_view("web.home", DataMap::new(), "/");
	let page = rt.directory.page_view().unwrap();

	page.borrow().state().update_by_key("count", json!(3));
	ViewNode::destroy(&page);
	// the scheduled flush still runs, but on a destroyed node it must no-op
	rt.directory.run_deferred();
	assert!(page.borrow().is_destroyed());
}

#[test]
fn test_render_error_is_scoped_to_the_view() {
	let rt = runtime();
	rt.directory.register(ViewTemplate::new("web.broken", |_scope| {
		Err(ViewError::render("web.broken", "boom"))
	}));

	let result = rt.directory.mount_view("web.broken", DataMap::new(), "/broken");
	assert!(result.error.is_none(), "render errors do not fail the mount");
	let markup = container_markup(&rt.doc);
	assert!(markup.contains("one-error-view"));
	assert!(markup.contains("boom"));
}

#[test]
fn test_render_error_with_long_sections_goes_through_sections() {
	let rt = runtime();
	rt.directory.register(
		ViewTemplate::new("web.broken_page", |scope| {
			scope.extends("layouts.base", DataMap::new());
			Err(ViewError::render("web.broken_page", "exploded"))
		})
		.extends("layouts.base")
		.long_sections(&["page.content"]),
	);

	rt.directory.mount_view("web.broken_page", DataMap::new(), "/");
	let markup = container_markup(&rt.doc);
	// the layout still renders; the error fragment lands in the section slot
	assert!(markup.contains("<header"));
	assert!(markup.contains("one-section-error"));
	assert!(markup.contains("exploded"));
}

#[test]
fn test_unknown_view_fails_mount_without_panic() {
	let rt = runtime();
	let result = rt.directory.mount_view("web.missing", DataMap::new(), "/");
	assert!(matches!(result.error, Some(ViewError::TemplateNotFound(_))));
}

#[test]
fn test_section_flush_idempotence_on_rendered_tree() {
	let rt = runtime();
	rt.directory.mount_view("web.about", DataMap::new(), "/about");

	let container = app_container(&rt.doc);
	let main = rt.doc.borrow().children(container)[1];
	let nodes_before: Vec<_> = rt.doc.borrow().children(main).to_vec();
	let markup_before = serialize_children(&rt.doc.borrow(), container);

	let sections = rt.directory.sections();
	sections.borrow_mut().flush(&mut rt.doc.borrow_mut());
	sections.borrow_mut().flush(&mut rt.doc.borrow_mut());

	assert_eq!(rt.doc.borrow().children(main), &nodes_before[..]);
	assert_eq!(serialize_children(&rt.doc.borrow(), container), markup_before);
}
