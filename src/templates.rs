//! Detection templates: small JSON rules that flag interesting responses.
//!
//! A template file holds either one object or an array of objects:
//!
//! ```json
//! {
//!   "id": "spring-actuator",
//!   "name": "Spring Boot actuator",
//!   "status_codes": [200],
//!   "headers": { "content-type": "actuator" },
//!   "content_length": null
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status_codes: BTreeSet<u16>,
    /// Header name to expected substring of its value.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub content_length: Option<u64>,
}

impl Template {
    /// True when any one of the template's conditions holds.
    pub fn matches(&self, status: u16, headers: &HeaderMap, content_length: u64) -> bool {
        if self.status_codes.contains(&status) {
            return true;
        }
        let header_hit = self.headers.iter().any(|(name, expected)| {
            headers
                .get_all(name.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok())
                .any(|v| v.contains(expected.as_str()))
        });
        if header_hit {
            return true;
        }
        self.content_length == Some(content_length)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateFile {
    Many(Vec<Template>),
    One(Template),
}

/// First template in `templates` that matches the response.
pub fn match_template<'a>(
    status: u16,
    headers: &HeaderMap,
    content_length: u64,
    templates: &'a [Template],
) -> Option<&'a Template> {
    templates
        .iter()
        .find(|t| t.matches(status, headers, content_length))
}

/// Ordered set of templates loaded from disk.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<Template>,
}

impl TemplateSet {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// Load every `*.json` file in `dir`, sorted by file name. Files that
    /// fail to parse are skipped with a warning.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read templates dir: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut templates = Vec::new();
        for file in files {
            match load_file(&file) {
                Ok(mut loaded) => {
                    debug!(file = %file.display(), count = loaded.len(), "loaded templates");
                    templates.append(&mut loaded);
                }
                Err(e) => warn!(file = %file.display(), error = %e, "skipping malformed template"),
            }
        }
        Ok(Self { templates })
    }

    pub fn find_match(&self, status: u16, headers: &HeaderMap, content_length: u64) -> Option<&Template> {
        match_template(status, headers, content_length, &self.templates)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn as_slice(&self) -> &[Template] {
        &self.templates
    }
}

fn load_file(path: &Path) -> Result<Vec<Template>> {
    let content = fs::read_to_string(path)?;
    let parsed: TemplateFile = serde_json::from_str(&content)?;
    Ok(match parsed {
        TemplateFile::Many(v) => v,
        TemplateFile::One(t) => vec![t],
    })
}
