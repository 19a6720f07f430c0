//! The transformer pipeline: ordered stages that reshape the entry index
//! between extraction and emission.

pub mod components;
pub mod concat;
pub mod manifest;
pub mod notice;
pub mod path;
pub mod pick;
pub mod resource;
pub mod shade;
pub mod xml;

use std::path::{Path, PathBuf};

use crate::collision::CollisionResolver;
use crate::error::Result;
use crate::index::EntryIndex;
use crate::relocation::ClassRelocations;
use crate::staging::{self, SourceOrigins};

pub use components::PlexusComponents;
pub use concat::Concatenator;
pub use manifest::ManifestEditor;
pub use notice::NoticeAggregator;
pub use path::{MergeOutcome, PathMerge, PathSelector, PathTransformer, Selection};
pub use pick::{Pick, PickResource};
pub use resource::{AddResource, RemoveResource};
pub use shade::{ClassShader, TextRewrite};

/// Shared state handed to every stage of one run.
pub struct TransformContext<'a> {
    work_dir: PathBuf,
    class_relocations: &'a mut ClassRelocations,
    resolver: &'a mut CollisionResolver,
    origins: &'a SourceOrigins,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        work_dir: PathBuf,
        class_relocations: &'a mut ClassRelocations,
        resolver: &'a mut CollisionResolver,
        origins: &'a SourceOrigins,
    ) -> Self {
        Self {
            work_dir,
            class_relocations,
            resolver,
            origins,
        }
    }

    /// Directory owned by the running stage. Stages never write into the
    /// extraction directories.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Output file for archive path `path` inside the stage directory.
    pub fn prepare_file(&self, path: &str) -> Result<PathBuf> {
        staging::prepare_file(&self.work_dir, path)
    }

    /// Collision resolution on demand, for stages that need one input.
    pub fn pick_one_source(&mut self, index: &mut EntryIndex, path: &str) -> Result<Option<PathBuf>> {
        self.resolver.pick_one_source(index, path, self.origins)
    }

    pub fn class_relocations(&self) -> &ClassRelocations {
        self.class_relocations
    }

    pub fn record_relocation(&mut self, original: &str, relocated: &str) {
        self.class_relocations.record(original, relocated);
    }
}

/// One pipeline stage.
pub trait Transformer: Send + Sync {
    /// Short human readable description, recorded in the process mapping.
    fn describe(&self) -> String;

    fn process(&self, ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()>;
}
