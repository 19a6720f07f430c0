use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::path::{MergeOutcome, PathMerge, PathSelector, PathTransformer};
use super::TransformContext;
use crate::error::{Result, UberizeError};
use crate::index::UberEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pick {
    #[default]
    First,
    Last,
}

impl FromStr for Pick {
    type Err = UberizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Pick::First),
            "last" => Ok(Pick::Last),
            other => Err(UberizeError::config(format!(
                "invalid pick type '{other}': must be 'first' or 'last'"
            ))),
        }
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pick::First => f.write_str("first"),
            Pick::Last => f.write_str("last"),
        }
    }
}

/// Keeps the first or last source of every selected entry.
#[derive(Debug, Clone, Copy)]
pub struct PickResource {
    pick: Pick,
}

impl PickResource {
    pub fn new(pick: Pick) -> Self {
        Self { pick }
    }

    pub fn stage(selector: PathSelector, pick: Pick) -> PathTransformer<Self> {
        PathTransformer::new(selector, Self::new(pick))
    }
}

impl PathMerge for PickResource {
    fn describe(&self) -> String {
        format!("pick {}", self.pick)
    }

    fn merge(
        &self,
        _ctx: &mut TransformContext<'_>,
        entry: &UberEntry,
        _target: &Path,
    ) -> Result<MergeOutcome> {
        let chosen = match self.pick {
            Pick::First => entry.sources().first(),
            Pick::Last => entry.sources().last(),
        };
        Ok(match chosen {
            Some(source) => MergeOutcome::Replace(vec![source.clone()]),
            None => MergeOutcome::Keep,
        })
    }
}
