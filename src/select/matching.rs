//! Glob matching against the enumerated file listing
// (c) 2024 Ross Younger

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use glob::{MatchOptions, Pattern};
use tracing::debug;

use super::{AnchoredPattern, PatternSet};

/// Filename matching is case-insensitive only where the native filesystem
/// convention is; `*` never crosses a path separator (that is what `**` is
/// for), and dot files are not hidden from wildcards.
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// A compiled pattern, plus the bare-name variant used when the pattern
/// body contains no path separator and so matches by file name anywhere in
/// the tree.
struct Matcher {
    anchored: Pattern,
    base_name: Option<Pattern>,
}

impl Matcher {
    fn compile(pattern: &AnchoredPattern) -> Result<Self> {
        let glob = pattern.glob.trim_start_matches('!');
        let anchored = Pattern::new(glob).with_context(|| format!("bad glob pattern {glob}"))?;
        let base_name = if pattern.body.contains(['/', '\\']) {
            None
        } else {
            Some(
                Pattern::new(&pattern.body)
                    .with_context(|| format!("bad glob pattern {}", pattern.body))?,
            )
        };
        Ok(Self {
            anchored,
            base_name,
        })
    }

    fn matches(&self, path: &Path, options: MatchOptions) -> bool {
        if self.anchored.matches_path_with(path, options) {
            return true;
        }
        match (&self.base_name, path.file_name()) {
            (Some(pattern), Some(name)) => {
                pattern.matches_with(name.to_string_lossy().as_ref(), options)
            }
            _ => false,
        }
    }
}

/// Applies the classified patterns to the file listing.
///
/// Include patterns are evaluated independently against the whole listing
/// and their matches appended in first-seen, first-pattern order, each path
/// at most once. Exclude patterns are then folded over the accumulated
/// list in order: each one removes its matches from what survived the
/// previous excludes, never consulting the original listing again.
///
/// An empty result is a valid outcome and means "nothing to copy".
pub fn select_files(set: &PatternSet, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let options = match_options();
    let mut selected: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<&Path> = HashSet::new();

    for pattern in &set.includes {
        let matcher = Matcher::compile(pattern)?;
        let before = selected.len();
        for file in files {
            if matcher.matches(file, options) && seen.insert(file.as_path()) {
                selected.push(file.clone());
            }
        }
        debug!(
            "{} matched {} new file(s)",
            pattern.glob,
            selected.len() - before
        );
    }

    for pattern in &set.excludes {
        let matcher = Matcher::compile(pattern)?;
        let before = selected.len();
        selected.retain(|file| !matcher.matches(file, options));
        debug!(
            "{} removed {} file(s)",
            pattern.glob,
            before - selected.len()
        );
    }

    Ok(selected)
}

#[cfg(test)]
mod test {
    use super::select_files;
    use crate::select::classify;
    use std::path::{Path, PathBuf};

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/src/{n}"))).collect()
    }

    fn select(patterns: &[&str], files: &[&str]) -> Vec<String> {
        let patterns: Vec<String> = patterns.iter().map(ToString::to_string).collect();
        let set = classify(&patterns, Path::new("/src"));
        select_files(&set, &paths(files))
            .unwrap()
            .into_iter()
            .map(|p| {
                p.to_string_lossy()
                    .strip_prefix("/src/")
                    .unwrap()
                    .to_owned()
            })
            .collect()
    }

    #[test]
    fn union_in_first_pattern_order_without_duplicates() {
        let found = select(
            &["**/*.txt", "sub/*"],
            &["a.txt", "sub/b.txt", "sub/c.bin"],
        );
        // sub/b.txt matches both patterns but is listed once, where the
        // first pattern found it.
        assert_eq!(found, ["a.txt", "sub/b.txt", "sub/c.bin"]);
    }

    #[test]
    fn wildcard_and_log_exclude() {
        let found = select(&["**", "!**/*.log"], &["a.txt", "b.log", "sub/c.log"]);
        assert_eq!(found, ["a.txt"]);
    }

    #[test]
    fn excludes_narrow_cumulatively() {
        // The second exclude can only remove what survived the first: b.log
        // is already gone, so "!**/b.*" only takes b.txt with it. The fold
        // converges to the same survivors either way (idempotent
        // narrowing), which is the point of spelling it as a fold.
        let found = select(
            &["**", "!**/*.log", "!**/b.*"],
            &["a.txt", "b.log", "b.txt", "c.txt"],
        );
        assert_eq!(found, ["a.txt", "c.txt"]);
    }

    #[test]
    fn exclude_only_subtracts_from_everything() {
        let found = select(&["!**/*.tmp"], &["keep.rs", "drop.tmp", "sub/drop.tmp"]);
        assert_eq!(found, ["keep.rs"]);
    }

    #[test]
    fn bare_pattern_matches_by_file_name_anywhere() {
        let found = select(&["*.log"], &["top.log", "sub/nested.log", "sub/other.txt"]);
        assert_eq!(found, ["top.log", "sub/nested.log"]);
    }

    #[test]
    fn bare_exclude_matches_by_file_name_anywhere() {
        let found = select(&["**", "!*.log"], &["a.txt", "sub/nested.log"]);
        assert_eq!(found, ["a.txt"]);
    }

    #[test]
    fn dot_files_are_not_hidden_from_wildcards() {
        let found = select(&["**"], &[".env", ".config/settings"]);
        assert_eq!(found, [".env", ".config/settings"]);
    }

    #[test]
    fn star_does_not_cross_separators() {
        let found = select(&["*.txt"], &["a.txt", "sub/b.txt"]);
        // Anchored "*" stops at the separator; "b.txt" still matches by
        // base name. A pattern with a separator does not get that licence.
        assert_eq!(found, ["a.txt", "sub/b.txt"]);
        let found = select(&["sub/*.txt"], &["a.txt", "sub/b.txt", "sub/deep/c.txt"]);
        assert_eq!(found, ["sub/b.txt"]);
    }

    #[test]
    fn empty_selection_is_not_an_error() {
        let found = select(&["**/*.zip"], &["a.txt"]);
        assert!(found.is_empty());
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let patterns = vec!["[".to_string()];
        let set = classify(&patterns, Path::new("/src"));
        assert!(select_files(&set, &paths(&["a.txt"])).is_err());
    }
}
