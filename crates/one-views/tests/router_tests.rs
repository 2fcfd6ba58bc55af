//! Routing: registration-order matching, navigation-driven mounting, the
//! hydrate-or-render start decision and link-click interception.

mod common;

use rstest::rstest;

use common::{app_container, container_markup, directory_over, manifest_from, runtime};
use one_dom::NodeId;
use one_views::{DataMap, Router, RouterConfig, SharedDirectory};

fn fixture_router(directory: SharedDirectory) -> Router {
	Router::new(directory, RouterConfig::default())
		.named_route("home", "/", "web.home")
		.named_route("about", "/about", "web.about")
		.route("/users/{id}", "web.about")
		.route("/users/active", "web.home")
		.route("/files/*", "web.about")
}

#[test]
fn test_first_match_wins_is_registration_order() {
	// `/users/{id}` is registered before `/users/active`, so the
	// parameterized route shadows the literal one. Intentional: priority is
	// registration order, not specificity.
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());

	let matched = router.match_route("/users/active").unwrap();
	assert_eq!(matched.route.pattern.raw(), "/users/{id}");
	assert_eq!(matched.params.get("id"), Some(&"active".to_string()));
}

#[rstest]
#[case("/", "/", None)]
#[case("/about", "/about", None)]
#[case("/users/42", "/users/{id}", Some(("id", "42")))]
#[case("/files/a/b.txt", "/files/*", Some(("any", "a/b.txt")))]
#[case("/about?page=2", "/about", None)]
fn test_match_route_table(
	#[case] path: &str,
	#[case] expected_pattern: &str,
	#[case] expected_param: Option<(&str, &str)>,
) {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());

	let matched = router.match_route(path).unwrap();
	assert_eq!(matched.route.pattern.raw(), expected_pattern);
	if let Some((key, value)) = expected_param {
		assert_eq!(matched.params.get(key), Some(&value.to_string()));
	}
}

#[test]
fn test_unmatched_route_noops() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	assert!(router.match_route("/nope/nope/nope").is_none());
	assert!(!router.handle_route("/nope/nope/nope"));
}

#[test]
fn test_navigate_mounts_view_and_tracks_active_route() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());

	assert!(router.navigate("/users/7?tab=posts#bio"));
	assert!(container_markup(&rt.doc).contains("about us"));

	let active = router.active_route().unwrap();
	assert_eq!(active.url_path, "/users/7");
	assert_eq!(active.param("id"), Some("7"));
	assert_eq!(active.query.get("tab"), Some(&"posts".to_string()));
	assert_eq!(active.fragment, "bio");
	assert_eq!(router.current_uri(), "/users/7?tab=posts#bio");
}

#[test]
fn test_before_hook_cancels_navigation() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	router.before_each(|route, _params| route.pattern.raw() != "/about");

	assert!(router.navigate("/"));
	assert!(!router.navigate("/about"));
	assert!(container_markup(&rt.doc).contains("class=\"home\""));
}

#[test]
fn test_start_renders_from_scratch_without_marker() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	assert!(router.start("/"));
	assert!(container_markup(&rt.doc).contains("class=\"home\""));
}

#[test]
fn test_start_hydrates_server_rendered_document() {
	// server side: render, mark, capture the manifest
	let server = runtime();
	server.directory.mount_view("web.home", DataMap::new(), "/");
	let container = app_container(&server.doc);
	server
		.doc
		.borrow_mut()
		.set_attribute(container, "data-server-rendered", "true");
	let manifest = manifest_from(&server.directory.page_view().unwrap());
	let markup_before = container_markup(&server.doc);

	// client side: same document, fresh runtime
	let client = directory_over(server.doc.clone());
	client.set_manifest(manifest);
	let router = fixture_router(client.clone());
	assert!(router.start("/"));

	assert_eq!(container_markup(&server.doc), markup_before);
	assert!(client.page_view().unwrap().borrow().is_mounted());
}

#[test]
fn test_url_for_named_routes() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	assert_eq!(router.url_for("about", &Default::default()).unwrap(), "/about");
	assert!(router.url_for("missing", &Default::default()).is_none());
}

fn anchor(rt: &common::Runtime, attrs: &[(&str, &str)]) -> NodeId {
	let mut doc = rt.doc.borrow_mut();
	let root = doc.root();
	let anchor = doc.create_element_with_attrs("a", attrs);
	doc.append_child(root, anchor);
	anchor
}

#[test]
fn test_intercept_click_prefers_nav_link_attribute() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	let element = anchor(&rt, &[("data-nav-link", "/about"), ("href", "/elsewhere")]);
	assert_eq!(router.intercept_click(element).as_deref(), Some("/about"));
}

#[test]
fn test_intercept_click_honors_disabled_markers() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());

	let disabled_nav = anchor(&rt, &[("data-nav-link", "/about"), ("data-nav-disabled", "")]);
	assert_eq!(router.intercept_click(disabled_nav), None);

	let disabled_anchor = anchor(&rt, &[("href", "/about"), ("data-nav", "false")]);
	assert_eq!(router.intercept_click(disabled_anchor), None);

	let new_tab = anchor(&rt, &[("href", "/about"), ("target", "_blank")]);
	assert_eq!(router.intercept_click(new_tab), None);
}

#[test]
fn test_intercept_click_skips_special_and_cross_origin() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());

	let mailto = anchor(&rt, &[("href", "mailto:a@b.c")]);
	assert_eq!(router.intercept_click(mailto), None);

	let cross = anchor(&rt, &[("href", "https://elsewhere.example/x")]);
	assert_eq!(router.intercept_click(cross), None);
}

#[test]
fn test_intercept_click_same_origin_absolute_link() {
	let rt = runtime();
	let config = RouterConfig {
		origin: Some("https://app.example".to_string()),
		..RouterConfig::default()
	};
	let router = Router::new(rt.directory.clone(), config).route("/about", "web.about");

	let same = anchor(&rt, &[("href", "https://app.example/about")]);
	assert_eq!(router.intercept_click(same).as_deref(), Some("/about"));

	let cross = anchor(&rt, &[("href", "https://other.example/about")]);
	assert_eq!(router.intercept_click(cross), None);
}

#[test]
fn test_handle_document_click_navigates_once() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	router.navigate("/");

	let link = anchor(&rt, &[("href", "/about")]);
	assert!(router.handle_document_click(link));
	assert!(container_markup(&rt.doc).contains("about us"));

	// same path again: no navigation
	assert!(!router.handle_document_click(link));
}

#[test]
fn test_click_on_plain_element_is_left_alone() {
	let rt = runtime();
	let router = fixture_router(rt.directory.clone());
	let plain = {
		let mut doc = rt.doc.borrow_mut();
		let root = doc.root();
		let div = doc.create_element("div");
		doc.append_child(root, div);
		div
	};
	assert_eq!(router.intercept_click(plain), None);
	assert!(!router.handle_document_click(plain));
}
