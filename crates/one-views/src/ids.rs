//! Instance id generation.
//!
//! Ids are drawn from a process-wide counter and formatted with a short
//! prefix (`v-3` for views, `f-7` for following blocks). Server-delivered ids
//! override generated ones during hydration, so the counter only has to be
//! unique within one client session.

use std::sync::atomic::{AtomicU64, Ordering};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates the next unique id with the given prefix.
pub fn next_id(prefix: &str) -> String {
	let id = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
	format!("{}-{}", prefix, id)
}

/// Resets the counter. Test support only.
#[doc(hidden)]
pub fn reset_ids() {
	ID_COUNTER.store(0, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_next_id_monotonic() {
		let first = next_id("v");
		let second = next_id("f");
		let first_n: u64 = first[2..].parse().unwrap();
		let second_n: u64 = second[2..].parse().unwrap();
		assert!(first.starts_with("v-"));
		assert!(second.starts_with("f-"));
		assert_eq!(second_n, first_n + 1);
	}
}
