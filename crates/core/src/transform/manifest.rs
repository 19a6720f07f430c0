//! JAR manifest model and the manifest editing stage.

use std::fs;

use indexmap::IndexMap;
use tracing::debug;

use super::{TransformContext, Transformer};
use crate::error::{Result, UberizeError};
use crate::index::EntryIndex;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const MAIN_CLASS: &str = "Main-Class";

const MAX_LINE: usize = 72;

/// Header name to value, case-insensitive on the name, insertion ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: IndexMap<String, (String, String)>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Sets `name`. An existing header keeps its position and spelling.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.get_mut(&name.to_ascii_lowercase()) {
            Some((_, existing)) => *existing = value,
            None => {
                self.entries
                    .insert(name.to_ascii_lowercase(), (name.to_string(), value));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub main: Attributes,
    /// Per-entry sections, in file order.
    pub sections: Vec<Attributes>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| UberizeError::Manifest(format!("not valid UTF-8: {e}")))?;

        let mut manifest = Manifest::new();
        let mut current = Attributes::default();
        let mut in_main = true;
        let mut pending: Option<(String, String)> = None;

        let flush = |pending: &mut Option<(String, String)>, current: &mut Attributes| {
            if let Some((name, value)) = pending.take() {
                current.insert(&name, value);
            }
        };

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(continuation) = line.strip_prefix(' ') {
                match pending.as_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(UberizeError::Manifest(format!(
                            "continuation line without a header: '{line}'"
                        )));
                    }
                }
                continue;
            }

            flush(&mut pending, &mut current);
            if line.is_empty() {
                // Section boundary
                if in_main {
                    manifest.main = std::mem::take(&mut current);
                    in_main = false;
                } else if !current.is_empty() {
                    manifest.sections.push(std::mem::take(&mut current));
                }
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| {
                UberizeError::Manifest(format!("malformed header line: '{line}'"))
            })?;
            let name = name.trim_end();
            if name.is_empty() {
                return Err(UberizeError::Manifest(format!("empty header name: '{line}'")));
            }
            pending = Some((name.to_string(), value.strip_prefix(' ').unwrap_or(value).to_string()));
        }

        flush(&mut pending, &mut current);
        if in_main {
            manifest.main = current;
        } else if !current.is_empty() {
            manifest.sections.push(current);
        }
        Ok(manifest)
    }

    /// Writes `Manifest-Version` first (1.0 when unset), wraps at 72 bytes
    /// and ends lines with CRLF.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        let version = self.main.get(MANIFEST_VERSION).unwrap_or("1.0");
        write_header(&mut out, MANIFEST_VERSION, version);
        for (name, value) in self.main.iter() {
            if !name.eq_ignore_ascii_case(MANIFEST_VERSION) {
                write_header(&mut out, name, value);
            }
        }
        out.push_str("\r\n");

        for section in &self.sections {
            for (name, value) in section.iter() {
                write_header(&mut out, name, value);
            }
            out.push_str("\r\n");
        }
        out.into_bytes()
    }
}

fn write_header(out: &mut String, name: &str, value: &str) {
    let line = format!("{name}: {value}");
    let mut rest = line.as_str();
    let mut limit = MAX_LINE;
    let mut first = true;
    while !rest.is_empty() {
        let mut cut = rest.len().min(limit);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n");
        rest = &rest[cut..];
        // Continuation lines lose one byte to the leading space
        limit = MAX_LINE - 1;
        first = false;
    }
}

/// Rewrites `META-INF/MANIFEST.MF`: the first existing manifest (or a blank
/// one) with the main class and extra headers applied.
#[derive(Debug, Clone, Default)]
pub struct ManifestEditor {
    main_class: Option<String>,
    entries: IndexMap<String, String>,
}

impl ManifestEditor {
    pub fn new(main_class: Option<String>, entries: IndexMap<String, String>) -> Self {
        Self {
            main_class,
            entries,
        }
    }

    pub fn apply(&self, manifest: &mut Manifest) {
        if let Some(main_class) = &self.main_class {
            manifest.main.insert(MAIN_CLASS, main_class.clone());
        }
        for (name, value) in &self.entries {
            manifest.main.insert(name, value.clone());
        }
    }
}

impl Transformer for ManifestEditor {
    fn describe(&self) -> String {
        format!("edit manifest ({MANIFEST_PATH})")
    }

    fn process(&self, ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()> {
        let first = index
            .get(MANIFEST_PATH)
            .and_then(|entry| entry.sources().first().cloned());
        let mut manifest = match &first {
            Some(source) => Manifest::parse(&fs::read(source)?)?,
            None => Manifest::new(),
        };
        self.apply(&mut manifest);

        let target = ctx.prepare_file(MANIFEST_PATH)?;
        fs::write(&target, manifest.to_bytes())?;
        debug!("Wrote manifest with {} main attributes", manifest.main.len());
        index.replace(MANIFEST_PATH, vec![target]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::testing::StageHarness;

    #[test]
    fn test_parse_with_continuations_and_sections() {
        let text = "Manifest-Version: 1.0\r\nBundle-Description: a long\r\n  value\r\nmain-class: a.Main\r\n\r\nName: a/b/\r\nSealed: true\r\n\r\n";
        let manifest = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(manifest.main.get("bundle-description"), Some("a long value"));
        assert_eq!(manifest.main.get("Main-Class"), Some("a.Main"));
        assert_eq!(manifest.sections.len(), 1);
        assert_eq!(manifest.sections[0].get("Name"), Some("a/b/"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Manifest::parse(b" orphan continuation"),
            Err(UberizeError::Manifest(_))
        ));
        assert!(matches!(
            Manifest::parse(b"no colon here"),
            Err(UberizeError::Manifest(_))
        ));
    }

    #[test]
    fn test_long_values_wrap_at_72_bytes() {
        let mut manifest = Manifest::new();
        let value = "x".repeat(150);
        manifest.main.insert("Class-Path", value.clone());
        let text = String::from_utf8(manifest.to_bytes()).unwrap();

        for line in text.split("\r\n") {
            assert!(line.len() <= 72, "{line}");
        }
        assert!(text.starts_with("Manifest-Version: 1.0\r\n"));
        let parsed = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(parsed.main.get("Class-Path"), Some(value.as_str()));
    }

    #[test]
    fn test_editor_uses_first_manifest() {
        let mut harness = StageHarness::new();
        harness.add(MANIFEST_PATH, "Manifest-Version: 1.0\nCreated-By: first\nMain-Class: old.Main\n");
        harness.add(MANIFEST_PATH, "Manifest-Version: 1.0\nCreated-By: second\n");

        let mut entries = IndexMap::new();
        entries.insert("implementation-title".to_string(), "uber".to_string());
        let editor = ManifestEditor::new(Some("new.Main".to_string()), entries);
        harness.run(&editor).unwrap();

        let manifest = Manifest::parse(harness.read(MANIFEST_PATH).as_bytes()).unwrap();
        assert_eq!(manifest.main.get("Created-By"), Some("first"));
        assert_eq!(manifest.main.get("Main-Class"), Some("new.Main"));
        assert_eq!(manifest.main.get("Implementation-Title"), Some("uber"));
        // The replaced version keeps both inputs reachable
        let entry = harness.index.get(MANIFEST_PATH).unwrap();
        assert_eq!(harness.index.history(entry.id()).len(), 1);
    }

    #[test]
    fn test_editor_creates_blank_manifest() {
        let mut harness = StageHarness::new();
        let editor = ManifestEditor::new(Some("app.Main".to_string()), IndexMap::new());
        harness.run(&editor).unwrap();
        assert_eq!(
            harness.read(MANIFEST_PATH),
            "Manifest-Version: 1.0\r\nMain-Class: app.Main\r\n\r\n"
        );
    }
}
