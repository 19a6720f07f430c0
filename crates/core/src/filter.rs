//! Pre-filters decide which archive entries never enter the entry index.

use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UberizeError};
use crate::matcher::{PathMatcher, PathSet};

pub trait Filter: Send + Sync {
    /// Whether this filter applies to entries of `archive` at all.
    fn can_filter(&self, archive: &Path) -> bool;

    /// Whether the entry at `path` is dropped.
    fn is_filtered(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Glob on the archive file name; unset applies to every archive.
    pub archive: Option<String>,
    #[serde(flatten)]
    pub entries: PathSet,
}

/// Keeps the entries of matching archives that pass the include/exclude
/// globs and drops the rest.
#[derive(Debug, Clone)]
pub struct SimpleFilter {
    archive: Option<Pattern>,
    entries: PathMatcher,
}

impl SimpleFilter {
    pub fn new(archive: Option<&str>, entries: PathMatcher) -> Result<Self> {
        let archive = archive
            .map(|raw| {
                Pattern::new(raw).map_err(|e| {
                    UberizeError::config(format!("invalid archive pattern '{raw}': {e}"))
                })
            })
            .transpose()?;
        Ok(Self { archive, entries })
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Self::new(config.archive.as_deref(), config.entries.compile(false)?)
    }
}

impl Filter for SimpleFilter {
    fn can_filter(&self, archive: &Path) -> bool {
        let Some(pattern) = &self.archive else {
            return true;
        };
        archive
            .file_name()
            .map(|name| pattern.matches(&name.to_string_lossy()))
            .unwrap_or(false)
    }

    fn is_filtered(&self, path: &str) -> bool {
        !self.entries.matches(path)
    }
}

/// Filters that apply to one archive.
pub fn applicable<'a>(filters: &'a [Box<dyn Filter>], archive: &Path) -> Vec<&'a dyn Filter> {
    filters
        .iter()
        .filter(|f| f.can_filter(archive))
        .map(|f| f.as_ref())
        .collect()
}
