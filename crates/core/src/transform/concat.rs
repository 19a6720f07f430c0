//! Concatenation of text sources with line ending normalization.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::path::{MergeOutcome, PathMerge, PathSelector, PathTransformer};
use super::TransformContext;
use crate::error::Result;
use crate::index::UberEntry;
use crate::matcher::PathMatcher;

pub const SERVICES_PATTERN: &str = "META-INF/services/**";

/// Appends every source into one file. Carriage returns are dropped, each
/// line feed is written as `eol`, every source ends a line, and the output
/// ends with exactly one `eol` however many blank lines trail it.
#[derive(Debug, Clone)]
pub struct Concatenator {
    eol: String,
}

impl Default for Concatenator {
    fn default() -> Self {
        Self::new("\n")
    }
}

impl Concatenator {
    pub fn new(eol: impl Into<String>) -> Self {
        Self { eol: eol.into() }
    }

    pub fn stage(selector: PathSelector, eol: impl Into<String>) -> PathTransformer<Self> {
        PathTransformer::new(selector, Self::new(eol))
    }

    /// Merges every `META-INF/services/**` provider file.
    pub fn services() -> Result<PathTransformer<Self>> {
        let matcher = PathMatcher::new(&[SERVICES_PATTERN], &[], false)?;
        Ok(PathTransformer::new(
            PathSelector::matching(matcher),
            Self::default(),
        ))
    }

    /// Line feeds are held back in `pending` until more content follows,
    /// so trailing blank lines never reach the output.
    fn append(&self, source: &Path, out: &mut impl Write, pending: &mut usize) -> Result<()> {
        let reader = BufReader::new(File::open(source)?);
        let mut open_line = false;
        for byte in reader.bytes() {
            match byte? {
                b'\r' => {}
                b'\n' => {
                    open_line = false;
                    *pending += 1;
                }
                other => {
                    for _ in 0..*pending {
                        out.write_all(self.eol.as_bytes())?;
                    }
                    *pending = 0;
                    open_line = true;
                    out.write_all(&[other])?;
                }
            }
        }
        if open_line {
            *pending += 1;
        }
        Ok(())
    }
}

impl PathMerge for Concatenator {
    fn describe(&self) -> String {
        format!("concatenate (eol {:?})", self.eol)
    }

    fn merge(
        &self,
        _ctx: &mut TransformContext<'_>,
        entry: &UberEntry,
        target: &Path,
    ) -> Result<MergeOutcome> {
        let mut out = BufWriter::new(File::create(target)?);
        let mut pending = 0;
        for source in entry.sources() {
            self.append(source, &mut out, &mut pending)?;
        }
        out.write_all(self.eol.as_bytes())?;
        out.flush()?;
        Ok(MergeOutcome::Replace(vec![target.to_path_buf()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::testing::StageHarness;

    #[test]
    fn test_concatenates_with_normalized_endings() {
        let mut harness = StageHarness::new();
        harness.add("notes.txt", "one\r\ntwo");
        harness.add("notes.txt", "three\n");
        harness.add("notes.txt", "");

        let stage = Concatenator::stage(PathSelector::exact("notes.txt"), "\r\n");
        harness.run(&stage).unwrap();

        assert_eq!(harness.read("notes.txt"), "one\r\ntwo\r\nthree\r\n");
        let entry = harness.index.get("notes.txt").unwrap();
        assert_eq!(entry.previous().len(), 1);
    }

    #[test]
    fn test_output_ends_with_one_terminator() {
        let mut harness = StageHarness::new();
        harness.add("a.txt", "alpha\n\n\n");
        harness.add("a.txt", "");
        harness.add("a.txt", "beta\r\n\r\n");
        harness.add("empty.txt", "");
        harness.add("empty.txt", "\n\n");

        let stage = Concatenator::stage(
            PathSelector::matching(PathMatcher::new(&["*.txt"], &[], false).unwrap()),
            "\n",
        );
        harness.run(&stage).unwrap();

        // blank lines between content survive, trailing ones collapse
        assert_eq!(harness.read("a.txt"), "alpha\n\n\nbeta\n");
        assert_eq!(harness.read("empty.txt"), "\n");
    }

    #[test]
    fn test_services_are_appended() {
        let mut harness = StageHarness::new();
        harness.add("META-INF/services/javax.script.ScriptEngineFactory", "a.Engine");
        harness.add("META-INF/services/javax.script.ScriptEngineFactory", "b.Engine\n");
        harness.add("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n");
        harness.add("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n");

        harness.run(&Concatenator::services().unwrap()).unwrap();

        assert_eq!(
            harness.read("META-INF/services/javax.script.ScriptEngineFactory"),
            "a.Engine\nb.Engine\n"
        );
        assert_eq!(harness.index.get("META-INF/MANIFEST.MF").unwrap().sources().len(), 2);
    }
}
