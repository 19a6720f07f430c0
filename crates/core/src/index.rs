//! The entry index: archive path -> current version of its [`UberEntry`].
//!
//! Versions live in an append-only arena keyed by [`EntryId`]. A version is
//! never changed once a pipeline stage can observe it; stages publish a new
//! version that names the one(s) it supersedes, so the full transformation
//! history of every path stays inspectable after the run.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of one entry version. Ids grow monotonically within an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// All content currently competing for one output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UberEntry {
    id: EntryId,
    path: String,
    sources: Vec<PathBuf>,
    previous: Vec<EntryId>,
}

impl UberEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Staged blobs in contribution order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// The only source, if there is exactly one.
    pub fn source(&self) -> Option<&Path> {
        match self.sources.as_slice() {
            [single] => Some(single.as_path()),
            _ => None,
        }
    }

    /// Versions this one superseded. Empty for an original entry.
    pub fn previous(&self) -> &[EntryId] {
        &self.previous
    }

    pub fn is_original(&self) -> bool {
        self.previous.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct EntryIndex {
    versions: Vec<UberEntry>,
    current: BTreeMap<String, EntryId>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.current.contains_key(path)
    }

    /// Current version at `path`.
    pub fn get(&self, path: &str) -> Option<&UberEntry> {
        self.current.get(path).map(|id| &self.versions[id.0])
    }

    /// Any version, current or superseded.
    pub fn version(&self, id: EntryId) -> Option<&UberEntry> {
        self.versions.get(id.0)
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Snapshot of the current paths, in order. Stages iterate over this so
    /// they can replace and remove entries while walking.
    pub fn paths(&self) -> Vec<String> {
        self.current.keys().cloned().collect()
    }

    /// Current entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = &UberEntry> + '_ {
        self.current.values().map(|id| &self.versions[id.0])
    }

    pub fn get_or_create(&mut self, path: &str) -> EntryId {
        if let Some(id) = self.current.get(path) {
            return *id;
        }
        let id = self.push(path.to_string(), Vec::new(), Vec::new());
        self.current.insert(path.to_string(), id);
        id
    }

    /// Appends a freshly extracted blob to the node at `path`, creating the
    /// node on first sight. Only meant for populating the index before any
    /// stage has seen it.
    pub fn add_source(&mut self, path: &str, blob: PathBuf) -> EntryId {
        let id = self.get_or_create(path);
        self.versions[id.0].sources.push(blob);
        id
    }

    /// Publishes a new version at `path` with the given sources. The version
    /// being replaced, if any, becomes its predecessor.
    pub fn replace(&mut self, path: &str, sources: Vec<PathBuf>) -> EntryId {
        self.supersede(path, Vec::new(), sources)
    }

    /// Publishes a new version at `path` that supersedes every id in
    /// `previous`, plus whatever currently occupies `path`.
    pub fn supersede(
        &mut self,
        path: &str,
        mut previous: Vec<EntryId>,
        sources: Vec<PathBuf>,
    ) -> EntryId {
        if let Some(existing) = self.current.get(path) {
            if !previous.contains(existing) {
                previous.push(*existing);
            }
        }
        let id = self.push(path.to_string(), sources, previous);
        self.current.insert(path.to_string(), id);
        id
    }

    /// Moves the entry at `from` to `to` as a new version holding `sources`.
    /// Returns `None` when nothing lives at `from`.
    pub fn relocate(&mut self, from: &str, to: &str, sources: Vec<PathBuf>) -> Option<EntryId> {
        let old = self.current.remove(from)?;
        Some(self.supersede(to, vec![old], sources))
    }

    /// Drops the mapping for `path`. Its versions stay in the arena.
    pub fn remove(&mut self, path: &str) -> Option<EntryId> {
        self.current.remove(path)
    }

    /// Every ancestor of `id`, nearest first, each version once.
    pub fn history(&self, id: EntryId) -> Vec<&UberEntry> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let mut out = Vec::new();

        if let Some(entry) = self.version(id) {
            queue.extend(entry.previous.iter().copied());
        }
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(entry) = self.version(next) {
                queue.extend(entry.previous.iter().copied());
                out.push(entry);
            }
        }
        out
    }

    fn push(&mut self, path: String, sources: Vec<PathBuf>, previous: Vec<EntryId>) -> EntryId {
        let id = EntryId(self.versions.len());
        self.versions.push(UberEntry {
            id,
            path,
            sources,
            previous,
        });
        id
    }
}
