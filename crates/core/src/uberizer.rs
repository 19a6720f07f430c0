//! The assembly run: extract every input into the staging area, run the
//! pipeline, settle remaining collisions and write the output archive.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::archive::{JarReader, JarWriter};
use crate::collision::{CollisionResolver, CollisionWarning};
use crate::error::{Result, UberizeError};
use crate::filter::{self, Filter};
use crate::index::EntryIndex;
use crate::relocation::ClassRelocations;
use crate::staging::{self, Staging};
use crate::transform::{TransformContext, Transformer};

/// Phases of one run, strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UberizePhase {
    Extracting,
    Transforming,
    ResolvingCollisions,
    Emitting,
    Done,
}

impl fmt::Display for UberizePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UberizePhase::Extracting => "extracting",
            UberizePhase::Transforming => "transforming",
            UberizePhase::ResolvingCollisions => "resolving collisions",
            UberizePhase::Emitting => "emitting",
            UberizePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UberizeReport {
    pub output: PathBuf,
    pub archives: usize,
    pub entries_extracted: usize,
    pub entries_filtered: usize,
    pub stages: Vec<String>,
    pub files_written: usize,
    pub directories_written: usize,
    pub collisions: Vec<CollisionWarning>,
    pub class_relocations: ClassRelocations,
}

/// Assembles many archives into one.
pub struct Uberizer {
    work_dir: PathBuf,
    filters: Vec<Box<dyn Filter>>,
    transformers: Vec<Box<dyn Transformer>>,
}

impl Uberizer {
    /// `work_dir` is the staging area. It is emptied at the start of every
    /// run and must not be shared between concurrent runs.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            filters: Vec::new(),
            transformers: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_transformer(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn transformers(&self) -> &[Box<dyn Transformer>] {
        &self.transformers
    }

    /// Runs the whole assembly. Any failure once a phase has started is
    /// returned as [`UberizeError::AssemblyFailed`] naming that phase.
    /// Collision warnings are not failures; they come back in the report.
    pub fn uberize(&self, inputs: &[PathBuf], output: &Path) -> Result<UberizeReport> {
        let mut report = UberizeReport {
            output: output.to_path_buf(),
            archives: inputs.len(),
            ..UberizeReport::default()
        };
        let mut index = EntryIndex::new();
        let mut relocations = ClassRelocations::new();
        let mut resolver = CollisionResolver::new();

        info!("Extracting {} archives", inputs.len());
        let mut staging = in_phase(UberizePhase::Extracting, Staging::create(&self.work_dir))?;
        in_phase(
            UberizePhase::Extracting,
            self.extract(&mut staging, inputs, &mut index, &mut report),
        )?;

        info!("Running {} transformers", self.transformers.len());
        for transformer in &self.transformers {
            let description = transformer.describe();
            debug!("Stage: {description}");
            in_phase(
                UberizePhase::Transforming,
                run_stage(
                    transformer.as_ref(),
                    &description,
                    &mut staging,
                    &mut relocations,
                    &mut resolver,
                    &mut index,
                ),
            )?;
            report.stages.push(description);
        }

        info!("Resolving collisions over {} entries", index.len());
        in_phase(
            UberizePhase::ResolvingCollisions,
            resolver.resolve_collisions(&mut index, staging.origins()),
        )?;

        info!("Writing {}", output.display());
        in_phase(UberizePhase::Emitting, emit(&index, output, &mut report))?;

        report.collisions = resolver.into_warnings();
        report.class_relocations = relocations;
        info!(
            "Done: {} files, {} directories, {} collision warnings",
            report.files_written,
            report.directories_written,
            report.collisions.len()
        );
        Ok(report)
    }

    fn extract(
        &self,
        staging: &mut Staging,
        inputs: &[PathBuf],
        index: &mut EntryIndex,
        report: &mut UberizeReport,
    ) -> Result<()> {
        for archive in inputs {
            let dir = staging.archive_dir(archive)?;
            let filters = filter::applicable(&self.filters, archive);
            let mut reader = JarReader::open(archive)?;
            debug!("Extracting {} entries from {}", reader.len(), archive.display());

            reader.for_each_entry(|name, is_dir, contents| {
                if is_dir {
                    return Ok(());
                }
                if filters.iter().any(|f| f.is_filtered(name)) {
                    report.entries_filtered += 1;
                    return Ok(());
                }
                let blob = staging::prepare_file(&dir, name)?;
                let mut out = File::create(&blob)?;
                io::copy(contents, &mut out)?;
                index.add_source(name, blob);
                report.entries_extracted += 1;
                Ok(())
            })?;
        }
        Ok(())
    }
}

fn run_stage(
    transformer: &dyn Transformer,
    description: &str,
    staging: &mut Staging,
    relocations: &mut ClassRelocations,
    resolver: &mut CollisionResolver,
    index: &mut EntryIndex,
) -> Result<()> {
    let work_dir = staging.stage_dir(description)?;
    let mut ctx = TransformContext::new(work_dir, relocations, resolver, staging.origins());
    transformer.process(&mut ctx, index)
}

fn emit(index: &EntryIndex, output: &Path, report: &mut UberizeReport) -> Result<()> {
    let mut writer = JarWriter::create(output)?;
    for entry in index.iter() {
        let Some(source) = entry.source() else {
            continue;
        };
        let mut file = File::open(source)?;
        writer.write_entry(entry.path(), &mut file)?;
    }
    report.files_written = writer.file_count();
    report.directories_written = writer.directory_count();
    writer.finish()
}

fn in_phase<T>(phase: UberizePhase, result: Result<T>) -> Result<T> {
    result.map_err(|source| match source {
        failed @ UberizeError::AssemblyFailed { .. } => failed,
        source => UberizeError::AssemblyFailed {
            phase,
            source: Box::new(source),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_input_fails_while_extracting() {
        let dir = tempdir().unwrap();
        let err = Uberizer::new(dir.path().join("work"))
            .uberize(&[dir.path().join("absent.jar")], &dir.path().join("out.jar"))
            .unwrap_err();

        match err {
            UberizeError::AssemblyFailed { phase, source } => {
                assert_eq!(phase, UberizePhase::Extracting);
                assert!(matches!(*source, UberizeError::Io(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_no_inputs_writes_empty_archive() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out/uber.jar");
        let report = Uberizer::new(dir.path().join("work"))
            .uberize(&[], &output)
            .unwrap();

        assert!(output.is_file());
        assert_eq!(report.files_written, 0);
        assert!(report.collisions.is_empty());
        assert!(JarReader::open(&output).unwrap().is_empty());
    }

    #[test]
    fn test_phase_names() {
        let err = in_phase::<()>(UberizePhase::ResolvingCollisions, Err(UberizeError::config("x")));
        assert_eq!(
            err.unwrap_err().to_string(),
            "Assembly failed while resolving collisions: Configuration error: x"
        );
    }
}
