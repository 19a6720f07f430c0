//! Package relocation rules and the name mapping built from them.

use std::borrow::Cow;
use std::collections::BTreeMap;

use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bytecode::Remapper;
use crate::error::{Result, UberizeError};

/// Target namespace used when a rule does not name one.
pub const DEFAULT_SHADE_PREFIX: &str = "hidden";

const EXCLUDE_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One relocation rule as configured: `pattern` may be written dotted
/// (`org.foo`) or slashed (`org/foo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRule {
    pub pattern: String,
    #[serde(default)]
    pub shaded_pattern: Option<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl RelocationRule {
    pub fn new(pattern: impl Into<String>, shaded_pattern: Option<&str>) -> Self {
        Self {
            pattern: pattern.into(),
            shaded_pattern: shaded_pattern.map(str::to_string),
            excludes: Vec::new(),
        }
    }

    pub fn with_excludes<S: Into<String>>(mut self, excludes: impl IntoIterator<Item = S>) -> Self {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }
}

pub trait Relocator: Send + Sync {
    /// `name` is a dotted class name, e.g. `com.foo.Bar`.
    fn can_relocate_class(&self, name: &str) -> bool;
    fn relocate_class(&self, name: &str) -> String;
    /// `path` is slashed, optionally ending in `.class`.
    fn can_relocate_path(&self, path: &str) -> bool;
    fn relocate_path(&self, path: &str) -> String;
}

/// Prefix relocator with glob excludes.
#[derive(Debug, Clone)]
pub struct SimpleRelocator {
    pattern: String,
    path_pattern: String,
    shaded_pattern: String,
    shaded_path_pattern: String,
    excludes: Vec<Pattern>,
}

impl SimpleRelocator {
    pub fn new(rule: &RelocationRule) -> Result<Self> {
        let trimmed = rule.pattern.trim().trim_end_matches(['.', '/']);
        if trimmed.is_empty() {
            return Err(UberizeError::config(
                "relocation rule requires a non-empty source pattern",
            ));
        }
        let pattern = trimmed.replace('/', ".");
        let path_pattern = trimmed.replace('.', "/");

        let (shaded_pattern, shaded_path_pattern) = match rule
            .shaded_pattern
            .as_deref()
            .map(|s| s.trim().trim_end_matches(['.', '/']))
            .filter(|s| !s.is_empty())
        {
            Some(shaded) => (shaded.replace('/', "."), shaded.replace('.', "/")),
            None => (
                format!("{DEFAULT_SHADE_PREFIX}.{pattern}"),
                format!("{DEFAULT_SHADE_PREFIX}/{path_pattern}"),
            ),
        };

        let mut excludes = Vec::new();
        for raw in normalize_excludes(&rule.excludes) {
            let compiled = Pattern::new(&raw).map_err(|e| {
                UberizeError::config(format!("invalid relocation exclude '{raw}': {e}"))
            })?;
            excludes.push(compiled);
        }

        Ok(Self {
            pattern,
            path_pattern,
            shaded_pattern,
            shaded_path_pattern,
            excludes,
        })
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes
            .iter()
            .any(|p| p.matches_with(path, EXCLUDE_OPTIONS))
    }
}

/// Excludes are matched against slashed names. `a.b.*` also excludes the
/// package `a/b` itself, so package-name string constants stay put.
fn normalize_excludes(excludes: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for e in excludes {
        let slashed = e.trim().replace('.', "/");
        if slashed.is_empty() {
            continue;
        }
        if let Some(package) = slashed.strip_suffix("/*") {
            out.push(package.to_string());
        }
        out.push(slashed);
    }
    out
}

fn has_prefix(value: &str, prefix: &str, separator: char) -> bool {
    match value.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(separator),
        None => false,
    }
}

impl Relocator for SimpleRelocator {
    fn can_relocate_class(&self, name: &str) -> bool {
        !name.contains('/') && self.can_relocate_path(&name.replace('.', "/"))
    }

    fn relocate_class(&self, name: &str) -> String {
        match name.strip_prefix(&self.pattern) {
            Some(rest) => format!("{}{rest}", self.shaded_pattern),
            None => name.to_string(),
        }
    }

    fn can_relocate_path(&self, path: &str) -> bool {
        let path = path.strip_suffix(".class").unwrap_or(path);
        has_prefix(path, &self.path_pattern, '/') && !self.is_excluded(path)
    }

    fn relocate_path(&self, path: &str) -> String {
        match path.strip_prefix(&self.path_pattern) {
            Some(rest) => format!("{}{rest}", self.shaded_path_pattern),
            None => path.to_string(),
        }
    }
}

/// Ordered relocators; the first one that accepts a name decides.
#[derive(Default)]
pub struct RelocatorSet {
    relocators: Vec<Box<dyn Relocator>>,
}

impl RelocatorSet {
    pub fn from_rules(rules: &[RelocationRule]) -> Result<Self> {
        let mut relocators: Vec<Box<dyn Relocator>> = Vec::with_capacity(rules.len());
        for rule in rules {
            relocators.push(Box::new(SimpleRelocator::new(rule)?));
        }
        Ok(Self { relocators })
    }

    pub fn push(&mut self, relocator: Box<dyn Relocator>) {
        self.relocators.push(relocator);
    }

    pub fn is_empty(&self) -> bool {
        self.relocators.is_empty()
    }

    /// Relocates a dotted class name, or returns it unchanged.
    pub fn map_class_name(&self, name: &str) -> String {
        self.relocators
            .iter()
            .find(|r| r.can_relocate_class(name))
            .map(|r| r.relocate_class(name))
            .unwrap_or_else(|| name.to_string())
    }

    /// Relocates a slashed resource path, or returns it unchanged.
    pub fn map_path(&self, path: &str) -> String {
        self.relocators
            .iter()
            .find(|r| r.can_relocate_path(path))
            .map(|r| r.relocate_path(path))
            .unwrap_or_else(|| path.to_string())
    }

    /// Relocates a free-form reference: a dotted class name, a slashed path,
    /// or an array descriptor such as `[[Lcom/foo/Bar;`.
    pub fn map_reference(&self, value: &str) -> Option<String> {
        for r in &self.relocators {
            if r.can_relocate_class(value) {
                return Some(r.relocate_class(value));
            }
            if r.can_relocate_path(value) {
                return Some(r.relocate_path(value));
            }

            let element = value.trim_start_matches('[');
            let dims = value.len() - element.len();
            if dims == 0 {
                continue;
            }
            if let Some(inner) = element
                .strip_prefix('L')
                .and_then(|s| s.strip_suffix(';'))
            {
                let relocated = if r.can_relocate_path(inner) {
                    Some(r.relocate_path(inner))
                } else if r.can_relocate_class(inner) {
                    Some(r.relocate_class(inner))
                } else {
                    None
                };
                if let Some(relocated) = relocated {
                    return Some(format!("{}L{relocated};", "[".repeat(dims)));
                }
            }
        }
        None
    }
}

impl Remapper for RelocatorSet {
    fn map_internal_name(&self, name: &str) -> Option<String> {
        self.relocators
            .iter()
            .find(|r| r.can_relocate_path(name))
            .map(|r| r.relocate_path(name))
    }

    fn map_value(&self, value: &str) -> Option<String> {
        self.map_reference(value)
    }
}

/// Dotted class names renamed so far in a run, original -> relocated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassRelocations {
    renamed: BTreeMap<String, String>,
}

impl ClassRelocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rename. Identity mappings are ignored.
    pub fn record(&mut self, original: &str, relocated: &str) {
        if original != relocated {
            self.renamed
                .insert(original.to_string(), relocated.to_string());
        }
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.renamed.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.renamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.renamed
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builds a rewriter for literal occurrences of the recorded names.
    pub fn text_rewriter(&self) -> Result<Option<TextRewriter<'_>>> {
        if self.renamed.is_empty() {
            return Ok(None);
        }
        // Longest names first so `a.B` never shadows `a.Bc`
        let mut keys: Vec<&str> = self.renamed.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&alternation)
            .map_err(|e| UberizeError::config(format!("relocation text pattern: {e}")))?;
        Ok(Some(TextRewriter {
            regex,
            relocations: self,
        }))
    }
}

/// Single-pass literal replacement of relocated class names. Replaced text
/// is never scanned again, so `a.B -> hidden.a.B` cannot cascade. A name
/// only matches as a whole: `a.B` is left alone inside `a.Bx` or `x.a.B`.
pub struct TextRewriter<'a> {
    regex: Regex,
    relocations: &'a ClassRelocations,
}

impl TextRewriter<'_> {
    pub fn rewrite<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out = String::new();
        let mut last = 0;
        for m in self.regex.find_iter(text) {
            if !is_whole_name(text, m.start(), m.end()) {
                continue;
            }
            let Some(relocated) = self.relocations.get(m.as_str()) else {
                continue;
            };
            out.push_str(&text[last..m.start()]);
            out.push_str(relocated);
            last = m.end();
        }
        if last == 0 {
            return Cow::Borrowed(text);
        }
        out.push_str(&text[last..]);
        Cow::Owned(out)
    }
}

fn is_whole_name(text: &str, start: usize, end: usize) -> bool {
    let identifier = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| identifier(c) || c == '.') && !after.is_some_and(identifier)
}
