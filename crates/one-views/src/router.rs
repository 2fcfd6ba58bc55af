//! Client router.
//!
//! Matches URL paths against registered route patterns in registration order
//! — first match wins, deliberately: a parameterized route registered before
//! a literal one shadows it, and that ordering is part of the contract, not a
//! defect. On start the router decides between hydrating a server-rendered
//! document and rendering from scratch, and it resolves intercepted link
//! clicks to client-side navigations.
//!
//! Path grammar: `/literal/{param}/*` — `{param}` binds one segment
//! excluding `/`, `-` and `.`; a trailing `*` (or `{any}`) binds the
//! remainder to the synthetic `any` key; otherwise segment counts must match
//! exactly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::RouterConfig;
use crate::directory::SharedDirectory;
use crate::manifest::DataMap;
use crate::view::SERVER_RENDERED_ATTR;

/// Extracted route parameters.
pub type Params = HashMap<String, String>;

/// Navigation hook; returning `false` cancels the navigation.
pub type NavigationHook = Rc<dyn Fn(&Route, &Params) -> bool>;

#[derive(Debug, Clone)]
enum Segment {
	Literal(String),
	/// Mixed literal/parameter segment compiled to a regex; capture names in
	/// written order.
	Pattern { regex: Regex, names: Vec<String> },
	/// Trailing wildcard binding the remainder to `any`.
	Any,
}

/// A compiled route path pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
	raw: String,
	segments: Vec<Segment>,
}

impl RoutePattern {
	/// Compiles a pattern.
	pub fn new(pattern: &str) -> Self {
		let raw = normalize_path(pattern);
		let segments = raw
			.trim_matches('/')
			.split('/')
			.filter(|segment| !segment.is_empty())
			.map(compile_segment)
			.collect();
		Self { raw, segments }
	}

	/// The normalized pattern text.
	pub fn raw(&self) -> &str {
		&self.raw
	}

	/// True when the pattern carries parameters or a wildcard.
	pub fn has_parameters(&self) -> bool {
		self.segments
			.iter()
			.any(|segment| !matches!(segment, Segment::Literal(_)))
	}

	/// Matches a path, returning bound parameters on success.
	pub fn matches(&self, path: &str) -> Option<Params> {
		let path = normalize_path(path);
		let parts: Vec<&str> = path
			.trim_matches('/')
			.split('/')
			.filter(|part| !part.is_empty())
			.collect();

		let wildcard = matches!(self.segments.last(), Some(Segment::Any));
		if wildcard {
			if parts.len() < self.segments.len() - 1 {
				return None;
			}
		} else if parts.len() != self.segments.len() {
			return None;
		}

		let mut params = Params::new();
		for (index, segment) in self.segments.iter().enumerate() {
			match segment {
				Segment::Literal(literal) => {
					if parts.get(index) != Some(&literal.as_str()) {
						return None;
					}
				}
				Segment::Pattern { regex, names } => {
					let part = parts.get(index)?;
					let captures = regex.captures(part)?;
					for (position, name) in names.iter().enumerate() {
						params.insert(
							name.clone(),
							captures.get(position + 1)?.as_str().to_string(),
						);
					}
				}
				Segment::Any => {
					params.insert("any".to_string(), parts[index..].join("/"));
					break;
				}
			}
		}
		Some(params)
	}

	/// Substitutes parameters back into the pattern.
	pub fn expand(&self, params: &Params) -> String {
		let mut url = self.raw.clone();
		for (key, value) in params {
			url = url.replace(&format!("{{{}}}", key), value);
		}
		if let Some(any) = params.get("any") {
			url = url.replace('*', any);
		}
		url
	}
}

fn compile_segment(segment: &str) -> Segment {
	if segment.contains('*') || segment.eq_ignore_ascii_case("{any}") {
		return Segment::Any;
	}
	if !segment.contains('{') {
		return Segment::Literal(segment.to_string());
	}
	let mut names = Vec::new();
	let mut pattern = String::from("^");
	let mut rest = segment;
	while let Some(open) = rest.find('{') {
		let (literal, tail) = rest.split_at(open);
		pattern.push_str(&regex::escape(literal));
		let Some(close) = tail.find('}') else {
			pattern.push_str(&regex::escape(tail));
			rest = "";
			break;
		};
		names.push(tail[1..close].to_string());
		pattern.push_str("([^/\\-.]+)");
		rest = &tail[close + 1..];
	}
	pattern.push_str(&regex::escape(rest));
	pattern.push('$');
	// the pattern is built from escaped literals and a fixed capture class
	let regex = Regex::new(&pattern).expect("segment pattern must compile");
	Segment::Pattern { regex, names }
}

/// Normalizes a path: leading slash, no trailing slash except the root.
pub fn normalize_path(path: &str) -> String {
	let mut normalized = if path.starts_with('/') {
		path.to_string()
	} else {
		format!("/{}", path)
	};
	while normalized.len() > 1 && normalized.ends_with('/') {
		normalized.pop();
	}
	normalized
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
	/// Compiled path pattern.
	pub pattern: RoutePattern,
	/// The view path rendered for this route.
	pub view: String,
	/// Optional route name for URL generation.
	pub name: Option<String>,
}

/// A matched route with its extracted parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
	/// The matched route.
	pub route: Route,
	/// Bound parameters.
	pub params: Params,
	/// The normalized matched path.
	pub path: String,
}

/// Resolved navigation state for one route path.
#[derive(Debug, Clone)]
pub struct ActiveRoute {
	/// The pattern text of the matched route.
	pub route_path: String,
	/// The concrete URL path.
	pub url_path: String,
	/// Bound parameters.
	pub params: Params,
	/// Parsed query-string pairs.
	pub query: HashMap<String, String>,
	/// The URL fragment, without `#`.
	pub fragment: String,
	/// The view path the route renders.
	pub view: String,
}

impl ActiveRoute {
	/// Reads one bound parameter.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}
}

/// Per-path singleton cache of resolved routes; last writer wins.
#[derive(Debug, Default)]
pub struct ActiveRouteCache {
	containers: HashMap<String, ActiveRoute>,
	active: Option<String>,
}

impl ActiveRouteCache {
	/// Records a resolution and makes it the active one.
	pub fn add(&mut self, route: ActiveRoute) {
		let key = route.route_path.clone();
		self.containers.insert(key.clone(), route);
		self.active = Some(key);
	}

	/// The currently active route.
	pub fn current(&self) -> Option<&ActiveRoute> {
		self.active
			.as_ref()
			.and_then(|key| self.containers.get(key))
	}

	/// A cached resolution by route pattern text.
	pub fn cached(&self, route_path: &str) -> Option<&ActiveRoute> {
		self.containers.get(route_path)
	}
}

/// The client router.
pub struct Router {
	routes: Vec<Route>,
	named: HashMap<String, usize>,
	directory: SharedDirectory,
	cache: RefCell<ActiveRouteCache>,
	current_uri: RefCell<String>,
	before_each: RefCell<Option<NavigationHook>>,
	after_each: RefCell<Option<NavigationHook>>,
	config: RouterConfig,
}

impl std::fmt::Debug for Router {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Router")
			.field("routes", &self.routes.len())
			.field("current_uri", &self.current_uri.borrow())
			.finish()
	}
}

impl Router {
	/// Creates a router over a view directory.
	pub fn new(directory: SharedDirectory, config: RouterConfig) -> Self {
		let initial = config.default_route.clone();
		Self {
			routes: Vec::new(),
			named: HashMap::new(),
			directory,
			cache: RefCell::new(ActiveRouteCache::default()),
			current_uri: RefCell::new(initial),
			before_each: RefCell::new(None),
			after_each: RefCell::new(None),
			config,
		}
	}

	/// Registers a route. Registration order is matching order.
	pub fn route(mut self, pattern: &str, view: &str) -> Self {
		self.routes.push(Route {
			pattern: RoutePattern::new(pattern),
			view: view.to_string(),
			name: None,
		});
		self
	}

	/// Registers a named route.
	pub fn named_route(mut self, name: &str, pattern: &str, view: &str) -> Self {
		let index = self.routes.len();
		self.routes.push(Route {
			pattern: RoutePattern::new(pattern),
			view: view.to_string(),
			name: Some(name.to_string()),
		});
		self.named.insert(name.to_string(), index);
		self
	}

	/// Installs the before-navigation hook.
	pub fn before_each(&self, hook: impl Fn(&Route, &Params) -> bool + 'static) {
		*self.before_each.borrow_mut() = Some(Rc::new(hook));
	}

	/// Installs the after-navigation hook.
	pub fn after_each(&self, hook: impl Fn(&Route, &Params) -> bool + 'static) {
		*self.after_each.borrow_mut() = Some(Rc::new(hook));
	}

	/// Number of registered routes.
	pub fn route_count(&self) -> usize {
		self.routes.len()
	}

	/// The URI of the last navigation.
	pub fn current_uri(&self) -> String {
		self.current_uri.borrow().clone()
	}

	/// The active route cache.
	pub fn active_route(&self) -> Option<ActiveRoute> {
		self.cache.borrow().current().cloned()
	}

	/// Matches a path (query string stripped) against the registered routes
	/// in registration order; the first match wins. This is intentional:
	/// route priority is the author's registration order, not specificity.
	pub fn match_route(&self, path: &str) -> Option<RouteMatch> {
		let clean = path.split(['?', '#']).next().unwrap_or(path);
		let normalized = normalize_path(clean);
		for route in &self.routes {
			if let Some(params) = route.pattern.matches(&normalized) {
				return Some(RouteMatch {
					route: route.clone(),
					params,
					path: normalized,
				});
			}
		}
		None
	}

	/// Generates a URL for a named route.
	pub fn url_for(&self, name: &str, params: &Params) -> Option<String> {
		let index = *self.named.get(name)?;
		let url = self.routes[index].pattern.expand(params);
		if url.starts_with('/') || url.starts_with("http:") || url.starts_with("https:") {
			Some(url)
		} else {
			Some(format!("{}{}", self.config.base, url))
		}
	}

	/// Resolves a path and renders its view. An unmatched path logs and
	/// no-ops. Returns whether a view was mounted.
	pub fn handle_route(&self, path: &str) -> bool {
		let Some(matched) = self.match_route(path) else {
			warn!(path, "no route found");
			return false;
		};
		if !self.run_before_hook(&matched) {
			debug!(path, "navigation cancelled by before hook");
			return false;
		}
		self.store_active(&matched, path);

		let data = params_to_data(&matched.params);
		let result = self
			.directory
			.mount_view(&matched.route.view, data, &matched.path);
		self.run_after_hook(&matched);
		result.error.is_none()
	}

	/// Hydrates the server-rendered document for the active route.
	pub fn hydrate_views(&self) -> bool {
		let Some(active) = self.active_route() else {
			warn!("no active route to hydrate");
			return false;
		};
		info!(path = %active.url_path, "starting hydration of server-rendered views");
		let result = self.directory.hydrate_view(&active.view, &active.url_path);
		result.error.is_none()
	}

	/// Decides the initial strategy: hydrate when the document carries the
	/// server-rendered marker, render from scratch otherwise.
	pub fn start(&self, initial_path: &str) -> bool {
		*self.current_uri.borrow_mut() = initial_path.to_string();
		let server_rendered = {
			let doc = self.directory.doc();
			let doc = doc.borrow();
			!doc.query_by_attribute(SERVER_RENDERED_ATTR, None).is_empty()
		};
		info!(server_rendered, path = initial_path, "router start");

		if server_rendered {
			self.set_active_route_for(initial_path);
			self.hydrate_views()
		} else {
			self.handle_route(initial_path)
		}
	}

	/// Resolves a path into the active-route cache without rendering.
	pub fn set_active_route_for(&self, path: &str) {
		match self.match_route(path) {
			Some(matched) => self.store_active(&matched, path),
			None => warn!(path, "no matching route for current path"),
		}
	}

	/// Drives a client-side navigation.
	pub fn navigate(&self, path: &str) -> bool {
		let handled = self.handle_route(path);
		if handled {
			*self.current_uri.borrow_mut() = path.to_string();
		}
		handled
	}

	/// Resolves a document click to a navigation path, or `None` when the
	/// click must be left to the host environment.
	///
	/// Priority: an explicit `data-nav-link` attribute first (honoring its
	/// disabled marker), then the nearest anchor — excluding new-tab targets,
	/// `data-nav` disabled links, non-http(s) protocols and cross-origin
	/// hrefs.
	pub fn intercept_click(&self, target: one_dom::NodeId) -> Option<String> {
		let doc = self.directory.doc();
		let doc = doc.borrow();

		if let Some(nav) = doc.closest_with_attribute(target, "data-nav-link") {
			if doc.get_attribute(nav, "data-nav-disabled").is_some() {
				debug!("skipping disabled nav-link element");
				return None;
			}
			let path = doc.get_attribute(nav, "data-nav-link").unwrap_or_default();
			if !path.trim().is_empty() {
				return Some(path.to_string());
			}
		}

		let anchor = doc.closest_tag(target, "a")?;
		let href = doc.get_attribute(anchor, "href")?.to_string();
		if doc.get_attribute(anchor, "target") == Some("_blank") {
			debug!(href, "skipping new-tab link");
			return None;
		}
		if matches!(doc.get_attribute(anchor, "data-nav"), Some("false") | Some("disabled")) {
			debug!(href, "skipping disabled link");
			return None;
		}
		let lowered = href.to_ascii_lowercase();
		if lowered.starts_with("mailto:")
			|| lowered.starts_with("tel:")
			|| lowered.starts_with("javascript:")
		{
			debug!(href, "skipping special protocol link");
			return None;
		}
		if lowered.starts_with("http://") || lowered.starts_with("https://") {
			let Some(origin) = &self.config.origin else {
				debug!(href, "skipping absolute link without configured origin");
				return None;
			};
			let Some(rest) = href.strip_prefix(origin.as_str()) else {
				debug!(href, "skipping cross-origin link");
				return None;
			};
			let path = if rest.is_empty() { "/" } else { rest };
			return Some(path.to_string());
		}
		if href.starts_with("//") {
			debug!(href, "skipping protocol-relative link");
			return None;
		}
		Some(href)
	}

	/// Handles an intercepted document click: navigates when the target
	/// resolves to an internal path that differs from the current one.
	pub fn handle_document_click(&self, target: one_dom::NodeId) -> bool {
		let Some(path) = self.intercept_click(target) else {
			return false;
		};
		if path == self.current_uri() {
			debug!(path, "same path; no navigation needed");
			return false;
		}
		self.navigate(&path)
	}

	fn run_before_hook(&self, matched: &RouteMatch) -> bool {
		let hook = self.before_each.borrow().clone();
		match hook {
			Some(hook) => hook(&matched.route, &matched.params),
			None => true,
		}
	}

	fn run_after_hook(&self, matched: &RouteMatch) {
		let hook = self.after_each.borrow().clone();
		if let Some(hook) = hook {
			hook(&matched.route, &matched.params);
		}
	}

	fn store_active(&self, matched: &RouteMatch, full_path: &str) {
		let (query, fragment) = parse_url_parts(full_path);
		self.cache.borrow_mut().add(ActiveRoute {
			route_path: matched.route.pattern.raw().to_string(),
			url_path: matched.path.clone(),
			params: matched.params.clone(),
			query,
			fragment,
			view: matched.route.view.clone(),
		});
	}
}

/// Splits query-string pairs and the fragment out of a URL path.
pub fn parse_url_parts(path: &str) -> (HashMap<String, String>, String) {
	let (path, fragment) = match path.split_once('#') {
		Some((before, fragment)) => (before, fragment.to_string()),
		None => (path, String::new()),
	};
	let mut query = HashMap::new();
	if let Some((_, search)) = path.split_once('?') {
		for pair in search.split('&').filter(|pair| !pair.is_empty()) {
			match pair.split_once('=') {
				Some((key, value)) => query.insert(key.to_string(), value.to_string()),
				None => query.insert(pair.to_string(), String::new()),
			};
		}
	}
	(query, fragment)
}

fn params_to_data(params: &Params) -> DataMap {
	let mut data = DataMap::new();
	for (key, value) in params {
		data.insert(key.clone(), serde_json::Value::String(value.clone()));
	}
	data
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pattern_literal() {
		let pattern = RoutePattern::new("/users/active");
		assert!(pattern.matches("/users/active").is_some());
		assert!(pattern.matches("/users/active/").is_some());
		assert!(pattern.matches("/users").is_none());
		assert!(pattern.matches("/users/active/extra").is_none());
	}

	#[test]
	fn test_pattern_param_excludes_separators() {
		let pattern = RoutePattern::new("/users/{id}");
		let params = pattern.matches("/users/42").unwrap();
		assert_eq!(params.get("id"), Some(&"42".to_string()));
		// `-` and `.` break a parameter segment
		assert!(pattern.matches("/users/4-2").is_none());
		assert!(pattern.matches("/users/4.2").is_none());
		assert!(pattern.matches("/users/a/b").is_none());
	}

	#[test]
	fn test_pattern_mixed_segment() {
		let pattern = RoutePattern::new("/posts/post-{id}.html");
		let params = pattern.matches("/posts/post-7.html").unwrap();
		assert_eq!(params.get("id"), Some(&"7".to_string()));
		assert!(pattern.matches("/posts/post-.html").is_none());
	}

	#[test]
	fn test_pattern_wildcard_binds_remainder() {
		let pattern = RoutePattern::new("/files/*");
		let params = pattern.matches("/files/docs/a.txt").unwrap();
		assert_eq!(params.get("any"), Some(&"docs/a.txt".to_string()));

		let pattern = RoutePattern::new("/{any}");
		let params = pattern.matches("/anything/at/all").unwrap();
		assert_eq!(params.get("any"), Some(&"anything/at/all".to_string()));
	}

	#[test]
	fn test_pattern_segment_count_must_match() {
		let pattern = RoutePattern::new("/a/{x}/c");
		assert!(pattern.matches("/a/b").is_none());
		assert!(pattern.matches("/a/b/c/d").is_none());
		assert!(pattern.matches("/a/b/c").is_some());
	}

	#[test]
	fn test_expand() {
		let pattern = RoutePattern::new("/users/{id}/posts/{slug}");
		let mut params = Params::new();
		params.insert("id".to_string(), "7".to_string());
		params.insert("slug".to_string(), "hello".to_string());
		assert_eq!(pattern.expand(&params), "/users/7/posts/hello");
	}

	#[test]
	fn test_normalize_path() {
		assert_eq!(normalize_path("users"), "/users");
		assert_eq!(normalize_path("/users/"), "/users");
		assert_eq!(normalize_path("/"), "/");
	}

	#[test]
	fn test_parse_url_parts() {
		let (query, fragment) = parse_url_parts("/users?page=2&sort=name#top");
		assert_eq!(query.get("page"), Some(&"2".to_string()));
		assert_eq!(query.get("sort"), Some(&"name".to_string()));
		assert_eq!(fragment, "top");
	}
}
