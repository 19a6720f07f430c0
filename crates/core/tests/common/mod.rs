#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use ristretto_classfile::{ClassAccessFlags, ClassFile, Constant, ConstantPool, JAVA_8};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Writes a jar holding `entries` in the given order.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    let file = File::create(path).expect("create jar");
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).expect("add directory");
        } else {
            zip.start_file(*name, options).expect("start file");
            zip.write_all(contents).expect("write entry");
        }
    }
    zip.finish().expect("finish jar");
    path.to_path_buf()
}

/// Every entry of a jar, in archive order.
pub fn read_jar(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(File::open(path).expect("open jar")).expect("read jar");
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("entry");
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).expect("read entry");
        entries.push((entry.name().to_string(), contents));
    }
    entries
}

/// File entries only, keyed by path.
pub fn jar_files(path: &Path) -> BTreeMap<String, Vec<u8>> {
    read_jar(path)
        .into_iter()
        .filter(|(name, _)| !name.ends_with('/'))
        .collect()
}

pub fn jar_dirs(path: &Path) -> Vec<String> {
    read_jar(path)
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| name.ends_with('/'))
        .collect()
}

/// Minimal class file: `name` extends `java/lang/Object`, with extra
/// class constants for `references` and string constants for `strings`.
pub fn class_bytes(name: &str, references: &[&str], strings: &[&str]) -> Vec<u8> {
    let mut constant_pool = ConstantPool::new();
    let this_class = constant_pool.add_class(name).expect("class");
    let super_class = constant_pool.add_class("java/lang/Object").expect("class");
    for reference in references {
        constant_pool.add_class(reference).expect("class");
    }
    for value in strings {
        constant_pool.add_string(value).expect("string");
    }

    let class = ClassFile {
        version: JAVA_8,
        constant_pool,
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        ..ClassFile::default()
    };
    let mut bytes = Vec::new();
    class.to_bytes(&mut bytes).expect("serialize class");
    bytes
}

/// Every Utf8 constant of the class in `bytes`, in pool order.
pub fn utf8_constants(bytes: &[u8]) -> Vec<String> {
    let class = ClassFile::from_bytes(&mut Cursor::new(bytes)).expect("parse class");
    class
        .constant_pool
        .iter()
        .filter_map(|constant| match constant {
            Constant::Utf8(value) => Some(value.clone()),
            _ => None,
        })
        .collect()
}
