//! Pattern classification: leading-`!` negation, root anchoring
// (c) 2024 Ross Younger

use std::path::Path;

use tracing::debug;

use super::MATCH_EVERYTHING;

/// A glob pattern anchored to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredPattern {
    /// The anchored glob. For exclude patterns this retains the leading
    /// `!` run as written; it is stripped again before matching.
    pub glob: String,
    /// The pattern text after the negation run, exactly as the user wrote
    /// it. A body with no path separator matches by file name anywhere in
    /// the tree.
    pub body: String,
}

/// The outcome of classifying a raw pattern list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    pub includes: Vec<AnchoredPattern>,
    pub excludes: Vec<AnchoredPattern>,
}

fn anchor(root: &Path, body: &str) -> String {
    let root = root.to_string_lossy();
    let root = root.trim_end_matches(['/', '\\']);
    format!("{root}/{}", body.trim_start_matches(['/', '\\']))
}

/// Splits raw glob patterns into include and exclude sets, anchored to the
/// source root.
///
/// A run of `k` leading `!` characters negates the pattern when `k` is odd;
/// double negation cancels back to inclusion, in which case the `!`s are
/// kept as literal pattern text. When the list contains excludes but no
/// includes, an implicit match-everything include is injected so the
/// excludes have something to subtract from.
#[must_use]
pub fn classify(patterns: &[String], root: &Path) -> PatternSet {
    let mut set = PatternSet::default();
    for raw in patterns {
        let raw = raw.trim();
        let body = raw.trim_start_matches('!');
        let negations = raw.len() - body.len();
        if negations % 2 == 1 {
            set.excludes.push(AnchoredPattern {
                glob: format!("{}{}", &raw[..negations], anchor(root, body)),
                body: body.to_owned(),
            });
        } else {
            set.includes.push(AnchoredPattern {
                glob: anchor(root, raw),
                body: raw.to_owned(),
            });
        }
    }
    if set.includes.is_empty() && !set.excludes.is_empty() {
        debug!("no include patterns given; implying {MATCH_EVERYTHING}");
        set.includes.push(AnchoredPattern {
            glob: anchor(root, MATCH_EVERYTHING),
            body: MATCH_EVERYTHING.to_owned(),
        });
    }
    set
}

#[cfg(test)]
mod test {
    use super::classify;
    use std::path::Path;

    fn run(patterns: &[&str]) -> super::PatternSet {
        let patterns: Vec<String> = patterns.iter().map(ToString::to_string).collect();
        classify(&patterns, Path::new("/src"))
    }

    #[test]
    fn plain_patterns_are_includes() {
        let set = run(&["**/*.txt", "bin/*"]);
        assert_eq!(set.excludes, []);
        let globs: Vec<&str> = set.includes.iter().map(|p| p.glob.as_str()).collect();
        assert_eq!(globs, ["/src/**/*.txt", "/src/bin/*"]);
    }

    #[test]
    fn single_negation_excludes() {
        let set = run(&["**", "!**/*.log"]);
        assert_eq!(set.includes.len(), 1);
        assert_eq!(set.excludes.len(), 1);
        assert_eq!(set.excludes[0].glob, "!/src/**/*.log");
        assert_eq!(set.excludes[0].body, "**/*.log");
    }

    #[test]
    fn triple_negation_still_excludes() {
        let set = run(&["a", "!!!b"]);
        assert_eq!(set.excludes[0].glob, "!!!/src/b");
        assert_eq!(set.excludes[0].body, "b");
    }

    #[test]
    fn double_negation_is_a_literal_include() {
        // An even number of !s cancels out; the pattern is anchored whole.
        let set = run(&["!!peculiar"]);
        assert_eq!(set.excludes, []);
        assert_eq!(set.includes[0].glob, "/src/!!peculiar");
        assert_eq!(set.includes[0].body, "!!peculiar");
    }

    #[test]
    fn exclude_only_list_gains_implicit_include() {
        let set = run(&["!**/*.tmp"]);
        assert_eq!(set.includes.len(), 1);
        assert_eq!(set.includes[0].glob, "/src/**");
        assert_eq!(set.excludes.len(), 1);
    }

    #[test]
    fn empty_list_stays_empty() {
        let set = run(&[]);
        assert!(set.includes.is_empty());
        assert!(set.excludes.is_empty());
    }

    #[test]
    fn trailing_root_separator_is_collapsed() {
        let patterns = vec!["*.c".to_string()];
        let set = classify(&patterns, Path::new("/src/"));
        assert_eq!(set.includes[0].glob, "/src/*.c");
    }
}
