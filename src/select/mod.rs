//! File selection: glob pattern classification and matching
// (c) 2024 Ross Younger

mod patterns;
pub use patterns::{classify, AnchoredPattern, PatternSet};

mod walk;
pub use walk::enumerate_files;

mod matching;
pub use matching::select_files;

/// The wildcard pattern meaning "every file under the source root".
pub const MATCH_EVERYTHING: &str = "**";

/// True if the pattern list is the single match-everything wildcard.
///
/// Callers use this to bypass per-file selection and hand the whole
/// source tree to the transport in one operation.
#[must_use]
pub fn is_match_everything(patterns: &[String]) -> bool {
    matches!(patterns, [only] if only.trim() == MATCH_EVERYTHING)
}
