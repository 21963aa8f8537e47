use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::models::SnippetDraft;

/// Category for templates that do not name one
pub const DEFAULT_CATEGORY: &str = "Other";

const BUNDLED_TEMPLATES: &str = include_str!("../../templates/templates.json");

/// A named starter bundle. Fields left out do not touch the draft a
/// template is applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub js: Option<String>,
}

impl Template {
    pub fn category(&self) -> &str {
        self.category
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }

    /// Copy the fields this template defines onto `draft`
    pub fn apply_to(&self, mut draft: SnippetDraft) -> SnippetDraft {
        if let Some(html) = &self.html {
            draft.html = Some(html.clone());
        }
        if let Some(css) = &self.css {
            draft.css = Some(css.clone());
        }
        if let Some(js) = &self.js {
            draft.js = Some(js.clone());
        }
        draft
    }

    /// A fresh draft named after the template
    pub fn to_draft(&self) -> SnippetDraft {
        self.apply_to(SnippetDraft::new(self.name.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// The catalog shipped with the binary
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_TEMPLATES)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let templates: Vec<Template> =
            serde_json::from_str(content).map_err(|e| StoreError::Format(e.to_string()))?;
        Ok(Self { templates })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, name: &str) -> Option<&Template> {
        let name = name.to_lowercase();
        self.templates
            .iter()
            .find(|t| t.name.to_lowercase() == name)
    }

    /// Templates grouped by category, categories in alphabetical order and
    /// templates in catalog order within each
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&Template>> {
        let mut groups: BTreeMap<&str, Vec<&Template>> = BTreeMap::new();
        for template in &self.templates {
            groups.entry(template.category()).or_default().push(template);
        }
        groups
    }
}
