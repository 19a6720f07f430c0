//! Explicit injection and removal of entries.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::path::{MergeOutcome, PathMerge, PathSelector, PathTransformer};
use super::{TransformContext, Transformer};
use crate::error::{Result, UberizeError};
use crate::index::{EntryIndex, UberEntry};

/// Puts an external file at `path`, ahead of whatever sources are already
/// there so a first-wins policy prefers it.
#[derive(Debug, Clone)]
pub struct AddResource {
    path: String,
    file: PathBuf,
}

impl AddResource {
    /// Fails when `file` does not exist.
    pub fn new(path: impl Into<String>, file: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = file.into();
        if path.trim().is_empty() {
            return Err(UberizeError::config("add: target path must not be empty"));
        }
        if !file.is_file() {
            return Err(UberizeError::config(format!(
                "add: {} does not exist or is not a file",
                file.display()
            )));
        }
        Ok(Self { path, file })
    }
}

impl Transformer for AddResource {
    fn describe(&self) -> String {
        format!("add {} as {}", self.file.display(), self.path)
    }

    fn process(&self, _ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()> {
        let mut sources = vec![self.file.clone()];
        if let Some(existing) = index.get(&self.path) {
            sources.extend(existing.sources().iter().cloned());
        }
        debug!("Adding {} ({} sources)", self.path, sources.len());
        index.replace(&self.path, sources);
        Ok(())
    }
}

/// Drops every selected entry regardless of how many sources it has.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveResource;

impl RemoveResource {
    pub fn stage(selector: PathSelector) -> PathTransformer<Self> {
        PathTransformer::new(selector, Self)
    }
}

impl PathMerge for RemoveResource {
    fn describe(&self) -> String {
        "remove".to_string()
    }

    fn merge(
        &self,
        _ctx: &mut TransformContext<'_>,
        _entry: &UberEntry,
        _target: &Path,
    ) -> Result<MergeOutcome> {
        Ok(MergeOutcome::Remove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::PathMatcher;
    use crate::transform::testing::StageHarness;
    use std::fs;

    #[test]
    fn test_add_prepends_to_existing_sources() {
        let mut harness = StageHarness::new();
        let existing = harness.add("META-INF/LICENSE", "old license");
        let injected = harness.dir.path().join("LICENSE.custom");
        fs::write(&injected, "new license").unwrap();

        let stage = AddResource::new("META-INF/LICENSE", &injected).unwrap();
        harness.run(&stage).unwrap();

        let entry = harness.index.get("META-INF/LICENSE").unwrap();
        assert_eq!(entry.sources(), &[injected, existing]);
        assert_eq!(entry.previous().len(), 1);
    }

    #[test]
    fn test_add_creates_missing_entry() {
        let mut harness = StageHarness::new();
        let injected = harness.dir.path().join("extra.txt");
        fs::write(&injected, "extra").unwrap();

        harness
            .run(&AddResource::new("docs/extra.txt", &injected).unwrap())
            .unwrap();
        assert_eq!(harness.read("docs/extra.txt"), "extra");
        assert!(harness.index.get("docs/extra.txt").unwrap().is_original());
    }

    #[test]
    fn test_add_requires_existing_file() {
        let err = AddResource::new("x", "/definitely/not/here").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_remove_drops_matching_entries() {
        let mut harness = StageHarness::new();
        harness.add("META-INF/BC.SF", "sig");
        harness.add("META-INF/BC.SF", "sig2");
        harness.add("META-INF/BC.RSA", "sig");
        harness.add("a/B.class", "class");

        let matcher = PathMatcher::new(&["META-INF/*.SF", "META-INF/*.RSA"], &[], false).unwrap();
        harness
            .run(&RemoveResource::stage(PathSelector::matching(matcher)))
            .unwrap();

        assert_eq!(harness.index.paths(), vec!["a/B.class"]);
    }
}
