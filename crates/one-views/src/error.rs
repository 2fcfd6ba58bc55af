//! Error types for the view engine.
//!
//! Lookup misses (unknown state key, unknown view name, unmatched route,
//! detached marker) are not errors — they are recovered locally and logged.
//! The types here cover genuine failures: a template body that fails while
//! producing markup, and a manifest that cannot be decoded.

use thiserror::Error;

/// Failure raised by a view template or the engine driving it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewError {
	/// No template is registered under the requested path.
	#[error("view not found: {0}")]
	TemplateNotFound(String),
	/// A template body failed while rendering.
	#[error("render failed for '{path}': {message}")]
	RenderFailed {
		/// Logical path of the failing view.
		path: String,
		/// Human-readable cause.
		message: String,
	},
	/// No usable container element for mounting.
	#[error("mount container not found")]
	ContainerNotFound,
}

impl ViewError {
	/// Shorthand for a render failure.
	pub fn render(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self::RenderFailed {
			path: path.into(),
			message: message.into(),
		}
	}
}

/// Failure decoding a hydration manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
	/// The manifest payload is not valid JSON of the expected shape.
	#[error("invalid hydration manifest: {0}")]
	Invalid(#[from] serde_json::Error),
}
