//! The staging area: every extracted blob and every stage output lives in a
//! subdirectory of one working directory, and two mapping files record which
//! input archive or pipeline stage each subdirectory belongs to.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Result, UberizeError};

pub const JAR_MAPPING_FILE: &str = "jar-mapping.txt";
pub const PROCESS_MAPPING_FILE: &str = "process-mapping.txt";
const STAGE_PREFIX: &str = "process-";

/// Names an archive directory may not take: stage directories, including
/// ones not allocated yet, and the mapping files.
fn is_reserved(id: &str) -> bool {
    let stage = id
        .strip_prefix(STAGE_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    stage || id == JAR_MAPPING_FILE || id == PROCESS_MAPPING_FILE
}

/// Where a staged blob came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Archive(PathBuf),
    Stage { id: String, description: String },
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::Archive(path) => write!(f, "{}", path.display()),
            SourceOrigin::Stage { id, description } => write!(f, "{id} ({description})"),
        }
    }
}

/// Staging subdirectories and their origins.
#[derive(Debug, Clone, Default)]
pub struct SourceOrigins {
    dirs: Vec<(PathBuf, SourceOrigin)>,
}

impl SourceOrigins {
    pub fn register(&mut self, dir: PathBuf, origin: SourceOrigin) {
        self.dirs.push((dir, origin));
    }

    /// Best effort: the origin of the staging directory holding `blob`.
    pub fn origin_of(&self, blob: &Path) -> Option<&SourceOrigin> {
        self.dirs
            .iter()
            .find(|(dir, _)| blob.starts_with(dir))
            .map(|(_, origin)| origin)
    }
}

#[derive(Debug)]
pub struct Staging {
    root: PathBuf,
    origins: SourceOrigins,
    stages: usize,
}

impl Staging {
    /// Creates `root` if needed and empties it.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        debug!("Staging area ready at {}", root.display());
        Ok(Self {
            root,
            origins: SourceOrigins::default(),
            stages: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origins(&self) -> &SourceOrigins {
        &self.origins
    }

    /// Allocates the extraction directory for `archive`, named after the
    /// archive file and suffixed `.1`, `.2`, ... when that name is taken.
    pub fn archive_dir(&mut self, archive: &Path) -> Result<PathBuf> {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());

        let mut id = name.clone();
        let mut counter = 1;
        while is_reserved(&id) || self.root.join(&id).exists() {
            id = format!("{name}.{counter}");
            counter += 1;
        }
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir)?;

        self.append_mapping(JAR_MAPPING_FILE, &id, &archive.display().to_string())?;
        self.origins
            .register(dir.clone(), SourceOrigin::Archive(archive.to_path_buf()));
        Ok(dir)
    }

    /// Allocates the next `process-<n>` work directory for a pipeline stage.
    pub fn stage_dir(&mut self, description: &str) -> Result<PathBuf> {
        let id = format!("{STAGE_PREFIX}{}", self.stages);
        self.stages += 1;
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir)?;

        self.append_mapping(PROCESS_MAPPING_FILE, &id, description)?;
        self.origins.register(
            dir.clone(),
            SourceOrigin::Stage {
                id,
                description: description.to_string(),
            },
        );
        Ok(dir)
    }

    fn append_mapping(&self, file: &str, id: &str, value: &str) -> Result<()> {
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(file))?;
        writeln!(out, "{id}={value}")?;
        Ok(())
    }
}

/// Resolves the archive entry `path` under `base` and creates its parent
/// directories. Paths that would land outside `base` are rejected.
pub fn prepare_file(base: &Path, path: &str) -> Result<PathBuf> {
    let unsafe_path = || UberizeError::UnsafePath(path.to_string());

    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(unsafe_path());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path()),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(unsafe_path());
    }

    let file = base.join(relative);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(file)
}
