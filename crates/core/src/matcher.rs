//! Include/exclude glob matching for archive entry paths.
//!
//! Patterns use path-glob semantics: `?` and `*` never cross a `/`, while a
//! `**` component spans any number of directories. An empty include set
//! includes everything; excludes always win over includes.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UberizeError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Serializable form of a matcher, as written in configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSet {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl PathSet {
    pub fn new<I, E, S, T>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            includes: includes.into_iter().map(Into::into).collect(),
            excludes: excludes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn compile(&self, ignore_case: bool) -> Result<PathMatcher> {
        PathMatcher::new(&self.includes, &self.excludes, ignore_case)
    }
}

#[derive(Debug, Clone, Default)]
struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    fn compile<S: AsRef<str>>(raw: &[S], fold: Fold) -> Result<Self> {
        let mut patterns = Vec::with_capacity(raw.len());
        for p in raw {
            let folded = fold.apply(p.as_ref());
            let pattern = Pattern::new(&folded).map_err(|e| {
                UberizeError::config(format!("invalid path pattern '{}': {e}", p.as_ref()))
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn any(&self, value: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(value, MATCH_OPTIONS))
    }
}

#[derive(Debug, Clone, Copy)]
enum Fold {
    Verbatim,
    Lower,
    Upper,
}

impl Fold {
    fn apply(self, value: &str) -> String {
        match self {
            Fold::Verbatim => value.to_string(),
            Fold::Lower => value.to_ascii_lowercase(),
            Fold::Upper => value.to_ascii_uppercase(),
        }
    }
}

/// Patterns compiled once per folding direction.
#[derive(Debug, Clone)]
struct Folding {
    includes: PatternSet,
    excludes: PatternSet,
    fold: Fold,
}

impl Folding {
    fn compile<S: AsRef<str>>(includes: &[S], excludes: &[S], fold: Fold) -> Result<Self> {
        Ok(Self {
            includes: PatternSet::compile(includes, fold)?,
            excludes: PatternSet::compile(excludes, fold)?,
            fold,
        })
    }

    fn included(&self, path: &str) -> bool {
        self.includes.is_empty() || self.includes.any(&self.fold.apply(path))
    }

    fn excluded(&self, path: &str) -> bool {
        !self.excludes.is_empty() && self.excludes.any(&self.fold.apply(path))
    }
}

/// Compiled include/exclude glob sets.
///
/// Case-insensitive matching folds ASCII letters only: pattern and candidate
/// are compared once fully lowercased and once fully uppercased, and either
/// comparison succeeding counts as a match. Non-ASCII characters are compared
/// verbatim.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    foldings: Vec<Folding>,
}

impl PathMatcher {
    pub fn new<S: AsRef<str>>(includes: &[S], excludes: &[S], ignore_case: bool) -> Result<Self> {
        let foldings = if ignore_case {
            vec![
                Folding::compile(includes, excludes, Fold::Lower)?,
                Folding::compile(includes, excludes, Fold::Upper)?,
            ]
        } else {
            vec![Folding::compile(includes, excludes, Fold::Verbatim)?]
        };
        Ok(Self { foldings })
    }

    /// A matcher that accepts every path.
    pub fn everything() -> Self {
        Self {
            foldings: vec![Folding {
                includes: PatternSet::default(),
                excludes: PatternSet::default(),
                fold: Fold::Verbatim,
            }],
        }
    }

    pub fn is_included(&self, path: &str) -> bool {
        self.foldings.iter().any(|f| f.included(path))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.foldings.iter().any(|f| f.excluded(path))
    }

    pub fn matches(&self, path: &str) -> bool {
        self.is_included(path) && !self.is_excluded(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(includes: &[&str], excludes: &[&str]) -> PathMatcher {
        PathMatcher::new(includes, excludes, false).unwrap()
    }

    #[test]
    fn test_empty_includes_match_everything() {
        let m = matcher(&[], &[]);
        assert!(m.matches("META-INF/MANIFEST.MF"));
        assert!(m.matches("a/b/c.class"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let m = matcher(&["META-INF/**"], &["META-INF/*.SF"]);
        assert!(m.matches("META-INF/NOTICE"));
        assert!(!m.matches("META-INF/SIGNER.SF"));
        assert!(!m.matches("org/foo/Bar.class"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let m = matcher(&["org/*"], &[]);
        assert!(m.matches("org/Foo.class"));
        assert!(!m.matches("org/foo/Bar.class"));

        let deep = matcher(&["org/**/*.class"], &[]);
        assert!(deep.matches("org/foo/Bar.class"));
        assert!(deep.matches("org/Foo.class"));
        assert!(!deep.matches("org/foo/bar.txt"));
    }

    #[test]
    fn test_question_mark() {
        let m = matcher(&["a?c"], &[]);
        assert!(m.matches("abc"));
        assert!(!m.matches("a/c"));
        assert!(!m.matches("abbc"));
    }

    #[test]
    fn test_case_insensitive_folds_both_directions() {
        let m = PathMatcher::new(&["abcdefghijklmnopqrstuvwxyz"], &[], true).unwrap();
        assert!(m.matches("abcdefghijklmnopqrstuvwxyz"));
        assert!(m.matches("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert!(m.matches("AbCdEfGhIjKlMnOpQrStUvWxYz"));
        assert!(!m.matches("META-INF/MANIFEST.MF"));
    }

    #[test]
    fn test_case_insensitive_is_ascii_only() {
        // Dotted/dotless i pairs must not be folded into each other
        let m = PathMatcher::new(&["file-i.txt"], &[], true).unwrap();
        assert!(m.matches("FILE-I.TXT"));
        assert!(!m.matches("FILE-\u{130}.TXT"));
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let m = matcher(&["meta-inf/notice"], &[]);
        assert!(!m.matches("META-INF/NOTICE"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = PathMatcher::new(&["a/***"], &[], false).unwrap_err();
        assert!(err.is_config());
    }
}
