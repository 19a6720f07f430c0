//! Class relocation and the textual rewrite of relocated names.

use std::collections::HashSet;
use std::fs;

use tracing::{debug, info, warn};

use super::path::PathSelector;
use super::{TransformContext, Transformer};
use crate::bytecode::{self, ConstantPoolRewriter, SymbolRewriter, descriptor};
use crate::error::Result;
use crate::index::EntryIndex;
use crate::relocation::RelocatorSet;

/// Rewrites every `.class` entry through the relocators and moves it to the
/// path of its new class name.
pub struct ClassShader {
    relocators: RelocatorSet,
    rewriter: Box<dyn SymbolRewriter>,
    resources: Option<PathSelector>,
}

impl ClassShader {
    pub fn new(relocators: RelocatorSet) -> Self {
        Self {
            relocators,
            rewriter: Box::new(ConstantPoolRewriter),
            resources: None,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Box<dyn SymbolRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Also rewrite relocated class names inside the selected resources.
    pub fn with_resources(mut self, resources: PathSelector) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Where the rewritten class lives. Class files under a prefix such as
    /// `META-INF/versions/9/` keep that prefix.
    fn relocated_path(&self, path: &str, old_name: &str, new_name: &str) -> String {
        match path.strip_suffix(&format!("{old_name}.class")) {
            Some(prefix) => format!("{prefix}{new_name}.class"),
            None => self.relocators.map_path(path),
        }
    }
}

impl Transformer for ClassShader {
    fn describe(&self) -> String {
        "relocate classes".to_string()
    }

    fn process(&self, ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()> {
        if self.relocators.is_empty() {
            return Ok(());
        }

        let mut produced = HashSet::new();
        let mut moved = 0usize;
        for path in index.paths() {
            if !path.ends_with(".class") || produced.contains(&path) {
                continue;
            }
            let Some(source) = ctx.pick_one_source(index, &path)? else {
                continue;
            };

            let original = fs::read(&source)?;
            let rewritten = self.rewriter.rewrite(&path, &original, &self.relocators)?;
            let old_name = bytecode::class_name(&path, &original)?;
            let new_name = descriptor::map_type(&old_name, &self.relocators)
                .unwrap_or_else(|| old_name.clone());
            let new_path = self.relocated_path(&path, &old_name, &new_name);

            if old_name != new_name {
                ctx.record_relocation(&old_name.replace('/', "."), &new_name.replace('/', "."));
            }
            if new_path == path && rewritten == original {
                continue;
            }

            let target = ctx.prepare_file(&new_path)?;
            fs::write(&target, &rewritten)?;
            produced.insert(new_path.clone());

            if new_path == path {
                index.replace(&path, vec![target]);
                continue;
            }

            let mut sources = vec![target];
            if let Some(occupant) = index.get(&new_path) {
                warn!("Relocated class {path} lands on existing entry {new_path}");
                sources.extend(occupant.sources().iter().cloned());
            }
            debug!("Relocated {path} -> {new_path}");
            index.relocate(&path, &new_path, sources);
            moved += 1;
        }
        info!("Relocated {moved} classes");

        if let Some(resources) = &self.resources {
            rewrite_resources(ctx, index, resources)?;
        }
        Ok(())
    }
}

/// Replaces literal occurrences of relocated class names in text resources.
pub struct TextRewrite {
    selector: PathSelector,
}

impl TextRewrite {
    pub fn new(selector: PathSelector) -> Self {
        Self { selector }
    }
}

impl Transformer for TextRewrite {
    fn describe(&self) -> String {
        "rewrite relocated class names in resources".to_string()
    }

    fn process(&self, ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()> {
        rewrite_resources(ctx, index, &self.selector)
    }
}

fn rewrite_resources(
    ctx: &mut TransformContext<'_>,
    index: &mut EntryIndex,
    selector: &PathSelector,
) -> Result<()> {
    let relocations = ctx.class_relocations().clone();
    let Some(rewriter) = relocations.text_rewriter()? else {
        return Ok(());
    };

    for path in index.paths() {
        if path.ends_with(".class") || !selector.matches(&path) {
            continue;
        }
        let Some(source) = ctx.pick_one_source(index, &path)? else {
            continue;
        };
        let bytes = fs::read(&source)?;
        let Ok(text) = std::str::from_utf8(&bytes) else {
            debug!("Skipping non UTF-8 resource {path}");
            continue;
        };

        let rewritten = rewriter.rewrite(text);
        if rewritten == text {
            continue;
        }
        let target = ctx.prepare_file(&path)?;
        fs::write(&target, rewritten.as_bytes())?;
        debug!("Rewrote class names in {path}");
        index.replace(&path, vec![target]);
    }
    Ok(())
}
