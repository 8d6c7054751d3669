//! Public URL layout of the map database.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::RepoConfigError;

const ASSET_URL_TEMPLATES_KEY: &str = "asset-url-templates";

/// Asset URL templates plus the data root's relative URL.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDbUrls {
    asset_url_templates: Value,
    data_root_components: Vec<String>,
}

impl MapDbUrls {
    /// Load the URLs config file.
    ///
    /// `data_root_relurl` is the data root's path under the site root; empty
    /// components are dropped.
    pub fn load(path: &Path, data_root_relurl: &str) -> Result<Self, RepoConfigError> {
        let text = fs::read_to_string(path).map_err(|source| RepoConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let json: Map<String, Value> =
            serde_json::from_str(&text).map_err(|source| RepoConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(json, data_root_relurl).ok_or_else(|| {
            RepoConfigError::Invalid(format!(
                "Invalid / unexpected contents in: {}",
                path.display()
            ))
        })
    }

    /// Build from a parsed config. Returns `None` without asset URL templates.
    pub fn from_json(mut json: Map<String, Value>, data_root_relurl: &str) -> Option<Self> {
        let asset_url_templates = json.remove(ASSET_URL_TEMPLATES_KEY)?;
        Some(Self {
            asset_url_templates,
            data_root_components: data_root_relurl
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn asset_url_templates(&self) -> &Value {
        &self.asset_url_templates
    }

    /// Absolute link to a file under the data root.
    pub fn link(&self, components: &[&str]) -> String {
        let parts: Vec<&str> = self
            .data_root_components
            .iter()
            .map(String::as_str)
            .chain(components.iter().copied())
            .collect();
        format!("/{}", parts.join("/"))
    }
}
