//! Content fingerprint for threaded-conversation folding
//!
//! Generates a deterministic hash key from (package, profile, title, text) by
//! normalizing whitespace and hashing the joined parts. Two posted events for
//! the same evolving conversation produce the same fingerprint even when the
//! host hands out a fresh notification key, which is what lets the tracker
//! fold them onto one mirror.
//!
//! NOTE: only notifications classified as threaded ever consult this key.
//! Episodic notifications that merely share text must NOT be folded, so the
//! fingerprint is deliberately not applied to them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::profile::ProfileKind;

/// Field separator that cannot appear in normalized content.
const SEP: char = '\u{1f}';

/// Compute the fingerprint for a notification's folded identity.
///
/// The key is stable across:
/// - leading/trailing whitespace differences
/// - runs of internal whitespace (collapsed to one space)
/// and distinct across package, profile, title and text.
pub fn content_fingerprint(
    package: &str,
    profile: ProfileKind,
    title: Option<&str>,
    text: Option<&str>,
) -> String {
    let mut input = String::new();
    input.push_str(package);
    input.push(SEP);
    input.push_str(profile.as_str());
    input.push(SEP);
    input.push_str(&normalize_part(title.unwrap_or("")));
    input.push(SEP);
    input.push_str(&normalize_part(text.unwrap_or("")));

    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Collapse whitespace runs and trim the ends.
fn normalize_part(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
