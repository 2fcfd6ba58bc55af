//! Runtime configuration.

use serde::{Deserialize, Serialize};

fn default_container() -> String {
	"app".to_string()
}

fn default_route() -> String {
	"/".to_string()
}

/// Configuration of the view directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
	/// `id` attribute of the mount container element.
	#[serde(default = "default_container")]
	pub container: String,
}

impl Default for DirectoryConfig {
	fn default() -> Self {
		Self {
			container: default_container(),
		}
	}
}

/// Configuration of the client router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
	/// Prefix prepended to generated URLs.
	#[serde(default)]
	pub base: String,
	/// Route taken when no initial path is known.
	#[serde(default = "default_route")]
	pub default_route: String,
	/// Own origin (`scheme://host[:port]`); absolute links outside it are
	/// left to the host environment.
	#[serde(default)]
	pub origin: Option<String>,
}

impl Default for RouterConfig {
	fn default() -> Self {
		Self {
			base: String::new(),
			default_route: default_route(),
			origin: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let directory = DirectoryConfig::default();
		assert_eq!(directory.container, "app");

		let router: RouterConfig = serde_json::from_str("{}").unwrap();
		assert_eq!(router.default_route, "/");
		assert!(router.origin.is_none());
	}
}
