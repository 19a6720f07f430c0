//! Aggregation of Apache style `NOTICE` files.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TransformContext, Transformer};
use crate::error::Result;
use crate::index::EntryIndex;

pub const NOTICE_PATH: &str = "META-INF/NOTICE";
pub const NOTICE_TXT_PATH: &str = "META-INF/NOTICE.txt";

const ORGANIZATION_MARKER: &str = "This product includes/uses software(s) developed by";

pub fn is_notice_path(path: &str) -> bool {
    path.eq_ignore_ascii_case(NOTICE_PATH) || path.eq_ignore_ascii_case(NOTICE_TXT_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeSettings {
    pub project_name: String,
    /// Explicit leading paragraphs. When unset a default header, copyright
    /// line and attribution paragraph are generated.
    pub notices: Option<Vec<String>>,
    pub organization_name: String,
    pub organization_url: String,
    pub inception_year: String,
    /// Replaces the second paragraph of the output.
    pub copyright: Option<String>,
}

impl Default for NoticeSettings {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            notices: None,
            organization_name: "The Apache Software Foundation".to_string(),
            organization_url: "http://www.apache.org/".to_string(),
            inception_year: "2006".to_string(),
            copyright: None,
        }
    }
}

/// Everything collected from the notice files of one run.
#[derive(Debug, Default)]
struct NoticeSet {
    paragraphs: IndexSet<String>,
    organizations: IndexMap<String, BTreeSet<String>>,
    copyright: Option<String>,
}

impl NoticeSet {
    fn add(&mut self, paragraph: String, organization: Option<&str>) {
        if paragraph.is_empty() {
            return;
        }
        match organization {
            Some(org) => {
                self.organizations
                    .entry(org.to_string())
                    .or_default()
                    .insert(paragraph);
            }
            None => {
                self.paragraphs.insert(paragraph);
            }
        }
    }

    /// Splits one notice file into paragraphs. `//` lines are ignored, a
    /// single line containing [`ORGANIZATION_MARKER`] followed by `- ` items
    /// opens a per-organization section.
    fn read(&mut self, text: &str, project_name: &str) {
        let mut paragraph = String::new();
        let mut organization: Option<String> = None;
        let mut line_count = 0;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if trimmed.is_empty() {
                let finished = std::mem::take(&mut paragraph);
                if !project_name.is_empty()
                    && finished.starts_with(project_name)
                    && finished.contains("Copyright ")
                {
                    self.copyright = Some(finished.clone());
                }
                self.add(finished, organization.as_deref());
                organization = None;
                line_count = 0;
                continue;
            }

            if trimmed.starts_with("- ") {
                if line_count == 1 && paragraph.contains(ORGANIZATION_MARKER) {
                    let org = paragraph.trim().to_string();
                    self.organizations.entry(org.clone()).or_default();
                    organization = Some(org);
                    paragraph.clear();
                } else if !paragraph.is_empty() && organization.is_some() {
                    let item = std::mem::take(&mut paragraph);
                    self.add(item, organization.as_deref());
                }
            }
            paragraph.push_str(line);
            paragraph.push('\n');
            line_count += 1;
        }

        self.add(paragraph, organization.as_deref());
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let mut organizations_written = false;
        for (i, paragraph) in self.paragraphs.iter().enumerate() {
            let position = i + 1;
            if self.copyright.as_ref() == Some(paragraph) && position != 2 {
                continue;
            }
            match (&self.copyright, position) {
                (Some(copyright), 2) => out.push_str(copyright),
                _ => out.push_str(paragraph),
            }
            out.push('\n');
            if position == 3 {
                self.render_organizations(&mut out);
                organizations_written = true;
            }
        }
        if !organizations_written {
            self.render_organizations(&mut out);
        }
        out
    }

    fn render_organizations(&self, out: &mut String) {
        for (organization, items) in &self.organizations {
            out.push_str(organization);
            out.push('\n');
            for item in items {
                out.push_str(item);
            }
            out.push('\n');
        }
    }
}

/// Merges every `META-INF/NOTICE` and `META-INF/NOTICE.txt` (any case) into
/// a single `META-INF/NOTICE`.
#[derive(Debug, Clone, Default)]
pub struct NoticeAggregator {
    settings: NoticeSettings,
    year: Option<String>,
}

impl NoticeAggregator {
    pub fn new(settings: NoticeSettings) -> Self {
        Self {
            settings,
            year: None,
        }
    }

    /// Pins the current year used by the generated copyright line.
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    fn header(&self) -> Vec<String> {
        if let Some(notices) = &self.settings.notices {
            return notices.clone();
        }
        let s = &self.settings;
        let current = self
            .year
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y").to_string());
        let years = if current == s.inception_year {
            current
        } else {
            format!("{}-{current}", s.inception_year)
        };
        vec![
            format!(
                "// ------------------------------------------------------------------\n\
                 // NOTICE file corresponding to the section 4d of The Apache License,\n\
                 // Version 2.0, in this case for {}\n\
                 // ------------------------------------------------------------------\n",
                s.project_name
            ),
            format!("{}\nCopyright {years} {}\n", s.project_name, s.organization_name),
            format!(
                "This product includes software developed at\n{} ({}).\n",
                s.organization_name, s.organization_url
            ),
        ]
    }

    fn collect(&self, sources: &[&Path]) -> Result<NoticeSet> {
        let mut set = NoticeSet {
            copyright: self.settings.copyright.clone(),
            ..NoticeSet::default()
        };
        for paragraph in self.header() {
            set.add(paragraph, None);
        }
        for source in sources {
            let text = String::from_utf8_lossy(&fs::read(source)?).into_owned();
            set.read(&text, &self.settings.project_name);
        }
        Ok(set)
    }
}

impl Transformer for NoticeAggregator {
    fn describe(&self) -> String {
        format!("aggregate notices ({NOTICE_PATH})")
    }

    fn process(&self, ctx: &mut TransformContext<'_>, index: &mut EntryIndex) -> Result<()> {
        let matched: Vec<String> = index
            .paths()
            .into_iter()
            .filter(|p| is_notice_path(p))
            .collect();

        let mut previous = Vec::new();
        let mut sources = Vec::new();
        for path in &matched {
            if let Some(entry) = index.get(path) {
                previous.push(entry.id());
                sources.extend(entry.sources().iter().cloned());
            }
        }
        let source_refs: Vec<&Path> = sources.iter().map(|p| p.as_path()).collect();
        let merged = self.collect(&source_refs)?.render();

        let target = ctx.prepare_file(NOTICE_PATH)?;
        fs::write(&target, merged)?;
        for path in &matched {
            if path != NOTICE_PATH {
                index.remove(path);
            }
        }
        index.supersede(NOTICE_PATH, previous, vec![target]);
        debug!("Aggregated {} notice files", sources.len());
        Ok(())
    }
}
