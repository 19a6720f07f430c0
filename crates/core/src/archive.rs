//! Reading input archives and writing the assembled one.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipArchive, ZipWriter};

use crate::error::{Result, UberizeError};

pub struct JarReader {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl JarReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(|source| UberizeError::Archive {
            archive: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Streams every entry, in archive order, as `(name, is_dir, contents)`.
    pub fn for_each_entry<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, bool, &mut dyn Read) -> Result<()>,
    {
        for i in 0..self.archive.len() {
            let mut entry = self
                .archive
                .by_index(i)
                .map_err(|source| UberizeError::Archive {
                    archive: self.path.clone(),
                    source,
                })?;
            let name = entry.name().to_string();
            let is_dir = entry.is_dir();
            visit(&name, is_dir, &mut entry)?;
        }
        Ok(())
    }
}

/// Archive writer that emits each directory entry at most once.
pub struct JarWriter {
    path: PathBuf,
    zip: ZipWriter<File>,
    options: SimpleFileOptions,
    directories: HashSet<String>,
    files: usize,
}

impl JarWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        // Fixed timestamps keep repeated runs byte-identical
        let options = SimpleFileOptions::default().last_modified_time(DateTime::default());
        Ok(Self {
            path: path.to_path_buf(),
            zip: ZipWriter::new(file),
            options,
            directories: HashSet::new(),
            files: 0,
        })
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Writes `dir` (ending in `/`) unless it was written before.
    pub fn add_directory(&mut self, dir: &str) -> Result<bool> {
        if !self.directories.insert(dir.to_string()) {
            return Ok(false);
        }
        self.zip
            .add_directory(dir, self.options)
            .map_err(|source| self.archive_error(source))?;
        Ok(true)
    }

    /// Writes a file entry, preceded by any ancestor directory not yet
    /// present in the output.
    pub fn write_entry(&mut self, path: &str, contents: &mut dyn Read) -> Result<()> {
        for dir in parent_dirs(path) {
            self.add_directory(&dir)?;
        }
        self.zip
            .start_file(path, self.options)
            .map_err(|source| self.archive_error(source))?;
        io::copy(contents, &mut self.zip)?;
        self.files += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        let path = self.path;
        self.zip
            .finish()
            .map_err(|source| UberizeError::Archive {
                archive: path,
                source,
            })?;
        Ok(())
    }

    fn archive_error(&self, source: zip::result::ZipError) -> UberizeError {
        UberizeError::Archive {
            archive: self.path.clone(),
            source,
        }
    }
}

/// Ancestor directories of an entry path, shallowest first, each ending in
/// `/`. `a/b/c.txt` yields `a/` and `a/b/`.
pub fn parent_dirs(path: &str) -> Vec<String> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed
        .match_indices('/')
        .filter(|(i, _)| *i > 0)
        .map(|(i, _)| trimmed[..=i].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_parent_dirs() {
        assert_eq!(parent_dirs("a/b/c.txt"), vec!["a/", "a/b/"]);
        assert_eq!(parent_dirs("top.txt"), Vec::<String>::new());
        assert_eq!(parent_dirs("a/b/"), vec!["a/"]);
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("out/test.jar");

        let mut writer = JarWriter::create(&jar).unwrap();
        writer
            .write_entry("a/b/c.txt", &mut "c".as_bytes())
            .unwrap();
        writer
            .write_entry("a/b/d.txt", &mut "d".as_bytes())
            .unwrap();
        assert!(!writer.add_directory("a/").unwrap());
        assert_eq!(writer.directory_count(), 2);
        assert_eq!(writer.file_count(), 2);
        writer.finish().unwrap();

        let mut reader = JarReader::open(&jar).unwrap();
        let mut seen = Vec::new();
        reader
            .for_each_entry(|name, is_dir, contents| {
                let mut text = String::new();
                contents.read_to_string(&mut text)?;
                seen.push((name.to_string(), is_dir, text));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                ("a/".to_string(), true, String::new()),
                ("a/b/".to_string(), true, String::new()),
                ("a/b/c.txt".to_string(), false, "c".to_string()),
                ("a/b/d.txt".to_string(), false, "d".to_string()),
            ]
        );
    }

    #[test]
    fn test_open_rejects_non_archives() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("bogus.jar");
        File::create(&bogus)
            .unwrap()
            .write_all(b"definitely not a zip")
            .unwrap();
        assert!(matches!(
            JarReader::open(&bogus),
            Err(UberizeError::Archive { .. })
        ));
    }
}
