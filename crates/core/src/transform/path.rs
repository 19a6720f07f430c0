//! Base for stages that apply a merge function to selected paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TransformContext, Transformer};
use crate::error::Result;
use crate::index::{EntryIndex, UberEntry};
use crate::matcher::{PathMatcher, PathSet};

/// Selection of entries by exact path and/or glob set, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub path: Option<String>,
    pub paths: Option<PathSet>,
    pub ignore_case: bool,
}

/// Compiled [`Selection`]. Matches nothing when neither form is set.
#[derive(Debug, Clone)]
pub struct PathSelector {
    path: Option<String>,
    paths: Option<PathMatcher>,
    ignore_case: bool,
}

impl PathSelector {
    pub fn exact(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            paths: None,
            ignore_case: false,
        }
    }

    pub fn matching(paths: PathMatcher) -> Self {
        Self {
            path: None,
            paths: Some(paths),
            ignore_case: false,
        }
    }

    pub fn compile(selection: &Selection) -> Result<Self> {
        let paths = selection
            .paths
            .as_ref()
            .map(|set| set.compile(selection.ignore_case))
            .transpose()?;
        Ok(Self {
            path: selection.path.clone(),
            paths,
            ignore_case: selection.ignore_case,
        })
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let exact = self.path.as_deref().is_some_and(|p| {
            if self.ignore_case {
                p.eq_ignore_ascii_case(candidate)
            } else {
                p == candidate
            }
        });
        exact || self.paths.as_ref().is_some_and(|m| m.matches(candidate))
    }
}

/// What a merge function decided for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Keep,
    Replace(Vec<PathBuf>),
    Remove,
}

pub trait PathMerge: Send + Sync {
    fn describe(&self) -> String;

    /// Entries with fewer sources are left alone.
    fn min_sources(&self) -> usize {
        1
    }

    /// Whether competing sources are resolved to one before merging.
    fn single_source(&self) -> bool {
        false
    }

    /// `target` is this stage's output file for the entry, parent
    /// directories already created.
    fn merge(
        &self,
        ctx: &mut TransformContext<'_>,
        entry: &UberEntry,
        target: &Path,
    ) -> Result<MergeOutcome>;
}

/// Runs a [`PathMerge`] over every selected, non-empty entry.
pub struct PathTransformer<M> {
    selector: PathSelector,
    merge: M,
}

impl<M: PathMerge> PathTransformer<M> {
    pub fn new(selector: PathSelector, merge: M) -> Self {
        Self { selector, merge }
    }

    pub fn merge_fn(&self) -> &M {
        &self.merge
    }
}

impl<M: PathMerge> Transformer for PathTransformer<M> {
    fn describe(&self) -> String {
        self.merge.describe()
    }

    fn process(&self, ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()> {
        for path in index.paths() {
            if !self.selector.matches(&path) {
                continue;
            }
            let count = index.get(&path).map_or(0, |e| e.sources().len());
            if count == 0 || count < self.merge.min_sources() {
                continue;
            }
            if self.merge.single_source() && count > 1 {
                ctx.pick_one_source(index, &path)?;
            }
            let Some(entry) = index.get(&path) else {
                continue;
            };

            let target = ctx.prepare_file(&path)?;
            match self.merge.merge(ctx, entry, &target)? {
                MergeOutcome::Keep => {}
                MergeOutcome::Replace(sources) => {
                    debug!("{}: replaced {path}", self.merge.describe());
                    index.replace(&path, sources);
                }
                MergeOutcome::Remove => {
                    debug!("{}: removed {path}", self.merge.describe());
                    index.remove(&path);
                }
            }
        }
        Ok(())
    }
}
