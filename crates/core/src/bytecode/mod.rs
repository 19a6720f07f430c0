//! Symbol rewriting for compiled class units.
//!
//! Every symbolic reference a class makes to another class is stored in a
//! `CONSTANT_Utf8` entry of its constant pool. Relocation parses the class
//! with `ristretto_classfile`, visits each place a Utf8 index is stored,
//! remaps the value according to how that place uses it, and serializes the
//! class again. Bytecode and stack maps only point into the pool, so they
//! come through unchanged.

pub mod descriptor;
mod walk;

use std::collections::HashMap;
use std::io::Cursor;

use indexmap::IndexMap;
use ristretto_classfile::{ClassFile, Constant, ConstantPool, FieldType};

use crate::error::{Result, UberizeError};
use walk::Role;

/// Name mapping consulted while rewriting one class.
pub trait Remapper {
    /// Maps a slashed internal name such as `com/foo/Bar`.
    fn map_internal_name(&self, name: &str) -> Option<String>;

    /// Maps a string constant. Only values that look like a class name,
    /// resource path or array descriptor accepted by the mapping change.
    fn map_value(&self, value: &str) -> Option<String>;
}

pub trait SymbolRewriter: Send + Sync {
    /// Returns the rewritten class unit. `path` is only used for diagnostics.
    fn rewrite(&self, path: &str, class_bytes: &[u8], remapper: &dyn Remapper) -> Result<Vec<u8>>;
}

/// Rewrites the constant pool in place, splitting a shared Utf8 entry when
/// its users need different values (a member name that happens to equal a
/// relocated class name keeps its old bytes).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantPoolRewriter;

impl SymbolRewriter for ConstantPoolRewriter {
    fn rewrite(&self, path: &str, class_bytes: &[u8], remapper: &dyn Remapper) -> Result<Vec<u8>> {
        let mut class = parse(path, class_bytes)?;
        let invalid = |e: ristretto_classfile::Error| invalid_class(path, e);

        let values: HashMap<u16, String> = utf8_values(&class.constant_pool);
        let mut uses = Vec::new();
        walk::references(&mut class, &mut |index, role| {
            let mapped = values
                .get(&*index)
                .and_then(|value| remap(value, role, remapper));
            uses.push((*index, mapped));
        })
        .map_err(invalid)?;

        if uses.iter().all(|(_, mapped)| mapped.is_none()) {
            return Ok(class_bytes.to_vec());
        }

        let targets = allocate(&mut class.constant_pool, &uses).map_err(invalid)?;
        let mut targets = targets.into_iter();
        walk::references(&mut class, &mut |index, _| {
            if let Some(Some(target)) = targets.next() {
                *index = target;
            }
        })
        .map_err(invalid)?;

        for field in &mut class.fields {
            let descriptor = class
                .constant_pool
                .try_get_utf8(field.descriptor_index)
                .map_err(invalid)?;
            field.field_type = FieldType::parse(descriptor).map_err(invalid)?;
        }

        let mut out = Vec::with_capacity(class_bytes.len() + 64);
        class.to_bytes(&mut out).map_err(invalid)?;
        Ok(out)
    }
}

/// Decides where every visited use points afterwards, `None` meaning it
/// keeps its index. A Utf8 entry is rewritten in place when no unchanged
/// user needs it; other mapped values get appended entries.
fn allocate(
    pool: &mut ConstantPool,
    uses: &[(u16, Option<String>)],
) -> ristretto_classfile::Result<Vec<Option<u16>>> {
    // utf8 index -> distinct values its users want, in first-seen order
    let mut wanted: IndexMap<u16, Vec<Option<&str>>> = IndexMap::new();
    for (index, mapped) in uses {
        let values = wanted.entry(*index).or_default();
        if !values.contains(&mapped.as_deref()) {
            values.push(mapped.as_deref());
        }
    }

    let mut appended: HashMap<(u16, &str), u16> = HashMap::new();
    for (index, values) in &wanted {
        if values.iter().all(Option::is_none) {
            continue;
        }
        let owner = values.iter().position(Option::is_none).unwrap_or(0);
        for (i, value) in values.iter().enumerate() {
            let Some(value) = *value else { continue };
            if i == owner {
                pool.set(*index, Constant::Utf8(value.to_string()))?;
            } else {
                appended.insert((*index, value), pool.add_utf8(value)?);
            }
        }
    }

    Ok(uses
        .iter()
        .map(|(index, mapped)| {
            mapped
                .as_deref()
                .and_then(|value| appended.get(&(*index, value)).copied())
        })
        .collect())
}

fn utf8_values(pool: &ConstantPool) -> HashMap<u16, String> {
    let mut values = HashMap::new();
    for index in 1..=u16::try_from(pool.len()).unwrap_or(u16::MAX) {
        if let Some(Constant::Utf8(value)) = pool.get(index) {
            values.insert(index, value.clone());
        }
    }
    values
}

fn remap(value: &str, role: Role, remapper: &dyn Remapper) -> Option<String> {
    let mapped = match role {
        Role::ClassName => descriptor::map_type(value, remapper),
        Role::Descriptor => descriptor::map_descriptor(value, remapper),
        Role::Signature => descriptor::map_signature(value, remapper),
        Role::Value => remapper.map_value(value),
        Role::Package => remapper.map_internal_name(value),
        Role::Name => None,
    };
    mapped.filter(|m| m != value)
}

fn parse(path: &str, class_bytes: &[u8]) -> Result<ClassFile> {
    ClassFile::from_bytes(&mut Cursor::new(class_bytes)).map_err(|e| invalid_class(path, e))
}

fn invalid_class(path: &str, error: ristretto_classfile::Error) -> UberizeError {
    UberizeError::InvalidClass {
        path: path.to_string(),
        reason: error.to_string(),
    }
}

/// Internal name declared by `this_class`, e.g. `com/foo/Bar`.
pub fn class_name(path: &str, class_bytes: &[u8]) -> Result<String> {
    let class = parse(path, class_bytes)?;
    let name = class.class_name().map_err(|e| invalid_class(path, e))?;
    Ok(name.to_string())
}
