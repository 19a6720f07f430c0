//! Collision resolution: reduce an entry with competing sources to one.
//!
//! The first source wins. For file types that are safe to compare as opaque
//! bytes, sources identical to the first are dropped silently; anything else
//! that gets discarded is reported as a [`CollisionWarning`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::index::EntryIndex;
use crate::staging::SourceOrigins;

/// Extensions whose contents can be compared byte for byte.
const DEDUP_EXTENSIONS: &[&str] = &[
    "class", "jar", "zip", "war", "ear", "png", "gif", "jpg", "jpeg", "ico", "bmp", "so", "dll",
    "dylib", "jnilib", "exe",
];

pub fn is_dedup_candidate(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) => DEDUP_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// One source taking part in a collision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContendingSource {
    pub blob: PathBuf,
    /// Input archive or stage the blob came from, when known.
    pub origin: Option<String>,
    /// xxh3 of the blob contents, hex encoded.
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionWarning {
    pub path: String,
    pub used: ContendingSource,
    pub ignored: Vec<ContendingSource>,
}

#[derive(Debug, Default)]
pub struct CollisionResolver {
    warnings: Vec<CollisionWarning>,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> &[CollisionWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<CollisionWarning> {
        self.warnings
    }

    /// Narrows the entry at `path` down to a single source and returns it.
    /// `None` when there is no entry or it has no sources left.
    pub fn pick_one_source(
        &mut self,
        index: &mut EntryIndex,
        path: &str,
        origins: &SourceOrigins,
    ) -> Result<Option<PathBuf>> {
        let Some(entry) = index.get(path) else {
            return Ok(None);
        };
        let sources = entry.sources().to_vec();
        let Some(first) = sources.first().cloned() else {
            return Ok(None);
        };
        if sources.len() == 1 {
            return Ok(Some(first));
        }

        let first_bytes = fs::read(&first)?;
        let dedup = is_dedup_candidate(path);
        let mut ignored = Vec::new();
        for other in &sources[1..] {
            let bytes = fs::read(other)?;
            if dedup && bytes == first_bytes {
                continue;
            }
            ignored.push(contender(other, &bytes, origins));
        }

        if !ignored.is_empty() {
            let used = contender(&first, &first_bytes, origins);
            warn!("Overlapping sources for jar entry: {path}");
            warn!("  Using source: {}", describe(&used));
            for source in &ignored {
                warn!("  Ignoring source: {}", describe(source));
            }
            self.warnings.push(CollisionWarning {
                path: path.to_string(),
                used,
                ignored,
            });
        }

        index.replace(path, vec![first.clone()]);
        Ok(Some(first))
    }

    /// Final pass over the whole index: empty entries are dropped, the rest
    /// end up with exactly one source.
    pub fn resolve_collisions(
        &mut self,
        index: &mut EntryIndex,
        origins: &SourceOrigins,
    ) -> Result<()> {
        for path in index.paths() {
            let empty = index.get(&path).is_some_and(|e| e.sources().is_empty());
            if empty {
                index.remove(&path);
            } else {
                self.pick_one_source(index, &path, origins)?;
            }
        }
        Ok(())
    }
}

fn contender(blob: &Path, bytes: &[u8], origins: &SourceOrigins) -> ContendingSource {
    ContendingSource {
        blob: blob.to_path_buf(),
        origin: origins.origin_of(blob).map(ToString::to_string),
        digest: format!("{:016x}", xxh3_64(bytes)),
    }
}

fn describe(source: &ContendingSource) -> String {
    match &source.origin {
        Some(origin) => format!("{} from {origin} [{}]", source.blob.display(), source.digest),
        None => format!("{} [{}]", source.blob.display(), source.digest),
    }
}
