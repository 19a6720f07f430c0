//! JSON description of one assembly run.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UberizeError};
use crate::filter::{FilterConfig, SimpleFilter};
use crate::relocation::{RelocationRule, RelocatorSet};
use crate::transform::notice::NoticeSettings;
use crate::transform::{
    AddResource, ClassShader, Concatenator, ManifestEditor, NoticeAggregator, PathSelector, Pick,
    PickResource, PlexusComponents, RemoveResource, Selection, TextRewrite, Transformer,
};
use crate::uberizer::Uberizer;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct UberizeConfig {
    /// Staging directory, emptied on every run.
    pub work_dir: PathBuf,
    /// Input archives, in extraction order.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub filters: Vec<FilterConfig>,
    pub transformers: Vec<StageConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StageConfig {
    Pick {
        #[serde(flatten)]
        selection: Selection,
        #[serde(default)]
        pick: Pick,
    },

    Text {
        #[serde(flatten)]
        selection: Selection,
        #[serde(default = "default_eol")]
        eol: String,
    },

    /// Concatenates `META-INF/services/**`.
    Services,

    PlexusComponents,

    Manifest {
        #[serde(default)]
        main_class: Option<String>,
        #[serde(default)]
        entries: IndexMap<String, String>,
    },

    Notice(NoticeSettings),

    Add {
        path: String,
        file: PathBuf,
    },

    Remove {
        #[serde(flatten)]
        selection: Selection,
    },

    Shade {
        #[serde(default)]
        relocations: Vec<RelocationRule>,
        /// Resources whose text gets relocated class names replaced.
        #[serde(default)]
        resources: Option<Selection>,
    },

    RewriteText {
        #[serde(flatten)]
        selection: Selection,
    },
}

fn default_eol() -> String {
    "\n".to_string()
}

impl UberizeConfig {
    /// Reads a configuration file. Relative paths inside it resolve against
    /// the directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            UberizeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!(
            "Loaded {} with {} inputs and {} transformers",
            path.display(),
            config.inputs.len(),
            config.transformers.len()
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if !p.as_os_str().is_empty() && p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.work_dir);
        resolve(&mut self.output);
        for input in &mut self.inputs {
            resolve(input);
        }
        for stage in &mut self.transformers {
            if let StageConfig::Add { file, .. } = stage {
                resolve(file);
            }
        }
    }

    /// Validates everything and assembles the runner. Nothing is read or
    /// written besides checking that `add` files exist.
    pub fn build(&self) -> Result<Uberizer> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(UberizeError::config("work_dir is required"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(UberizeError::config("output is required"));
        }

        let mut uberizer = Uberizer::new(&self.work_dir);
        for filter in &self.filters {
            uberizer = uberizer.with_filter(Box::new(SimpleFilter::from_config(filter)?));
        }
        for (i, stage) in self.transformers.iter().enumerate() {
            let transformer = stage
                .build()
                .map_err(|e| UberizeError::config(format!("transformer #{}: {e}", i + 1)))?;
            uberizer = uberizer.with_transformer(transformer);
        }
        Ok(uberizer)
    }
}

impl StageConfig {
    pub fn build(&self) -> Result<Box<dyn Transformer>> {
        let stage: Box<dyn Transformer> = match self {
            StageConfig::Pick { selection, pick } => {
                Box::new(PickResource::stage(selector(selection)?, *pick))
            }
            StageConfig::Text { selection, eol } => {
                Box::new(Concatenator::stage(selector(selection)?, eol.clone()))
            }
            StageConfig::Services => Box::new(Concatenator::services()?),
            StageConfig::PlexusComponents => Box::new(PlexusComponents::stage()),
            StageConfig::Manifest {
                main_class,
                entries,
            } => Box::new(ManifestEditor::new(main_class.clone(), entries.clone())),
            StageConfig::Notice(settings) => Box::new(NoticeAggregator::new(settings.clone())),
            StageConfig::Add { path, file } => Box::new(AddResource::new(path.clone(), file.clone())?),
            StageConfig::Remove { selection } => Box::new(RemoveResource::stage(selector(selection)?)),
            StageConfig::Shade {
                relocations,
                resources,
            } => {
                let mut shader = ClassShader::new(RelocatorSet::from_rules(relocations)?);
                if let Some(resources) = resources {
                    shader = shader.with_resources(selector(resources)?);
                }
                Box::new(shader)
            }
            StageConfig::RewriteText { selection } => {
                Box::new(TextRewrite::new(selector(selection)?))
            }
        };
        Ok(stage)
    }
}

/// A stage that selects by path must select something.
fn selector(selection: &Selection) -> Result<PathSelector> {
    if selection.path.is_none() && selection.paths.is_none() {
        return Err(UberizeError::config(
            "either 'path' or 'paths' must be given",
        ));
    }
    PathSelector::compile(selection)
}
