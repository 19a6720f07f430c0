//! Aggregation of Plexus component descriptors.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use super::path::{MergeOutcome, PathMerge, PathSelector, PathTransformer};
use super::xml::Element;
use super::TransformContext;
use crate::error::{Result, UberizeError};
use crate::index::UberEntry;

pub const COMPONENTS_XML_PATH: &str = "META-INF/plexus/components.xml";

/// Merges every `components.xml` into one `component-set`. Components are
/// keyed by role and role hint; a later component replaces an earlier one
/// in place and inherits its `configuration` when it has none of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlexusComponents;

impl PlexusComponents {
    pub fn stage() -> PathTransformer<Self> {
        PathTransformer::new(PathSelector::exact(COMPONENTS_XML_PATH), Self)
    }
}

fn merge_components(entry: &UberEntry) -> Result<IndexMap<(String, String), Element>> {
    let mut components: IndexMap<(String, String), Element> = IndexMap::new();
    for source in entry.sources() {
        let xml_error = |reason: String| UberizeError::Xml {
            path: source.display().to_string(),
            reason,
        };
        let document = Element::parse(&fs::read(source)?).map_err(xml_error)?;
        let Some(list) = document.child("components") else {
            continue;
        };

        for component in list.children_named("component") {
            let role = component
                .child("role")
                .map(|r| r.value().to_string())
                .ok_or_else(|| xml_error("component without a role".to_string()))?;
            let hint = component
                .child("role-hint")
                .map(|h| h.value().to_string())
                .unwrap_or_default();

            let mut component = component.clone();
            let key = (role, hint);
            if let Some(previous) = components.get(&key) {
                if component.child("configuration").is_none() {
                    if let Some(configuration) = previous.child("configuration") {
                        component.add_child(configuration.clone());
                    }
                }
            }
            // IndexMap keeps the original position of a replaced key
            components.insert(key, component);
        }
    }
    Ok(components)
}

impl PathMerge for PlexusComponents {
    fn describe(&self) -> String {
        format!("merge plexus components ({COMPONENTS_XML_PATH})")
    }

    fn min_sources(&self) -> usize {
        2
    }

    fn merge(
        &self,
        _ctx: &mut TransformContext<'_>,
        entry: &UberEntry,
        target: &Path,
    ) -> Result<MergeOutcome> {
        let components = merge_components(entry)?;
        debug!(
            "Merged {} components from {} descriptors",
            components.len(),
            entry.sources().len()
        );

        let mut list = Element::new("components");
        for component in components.into_values() {
            list.add_child(component);
        }
        let mut set = Element::new("component-set");
        set.add_child(list);

        let xml = set.to_xml().map_err(|reason| UberizeError::Xml {
            path: entry.path().to_string(),
            reason,
        })?;
        fs::write(target, xml)?;
        Ok(MergeOutcome::Replace(vec![target.to_path_buf()]))
    }
}
