//! Uber-jar assembly: merge many archives into one, resolving path
//! collisions and relocating packages consistently across class files and
//! resources.

pub mod archive;
pub mod bytecode;
pub mod collision;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod logging;
pub mod matcher;
pub mod relocation;
pub mod staging;
pub mod transform;
pub mod uberizer;

pub use config::{StageConfig, UberizeConfig};
pub use error::{Result, UberizeError};
pub use index::{EntryId, EntryIndex, UberEntry};
pub use matcher::{PathMatcher, PathSet};
pub use relocation::{ClassRelocations, RelocationRule, RelocatorSet};
pub use transform::{TransformContext, Transformer};
pub use uberizer::{UberizePhase, UberizeReport, Uberizer};
