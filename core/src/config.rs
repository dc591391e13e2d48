/// Configuration for the rendering pipeline
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Markdown grammar extensions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkdownOptions {
    /// Render single newlines as `<br />`
    pub breaks: bool,
    /// Turn bare URLs into links
    pub autolink: bool,
    pub tables: bool,
    pub strikethrough: bool,
    pub tasklists: bool,
    pub footnotes: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            breaks: true,
            autolink: true,
            tables: true,
            strikethrough: true,
            tasklists: true,
            footnotes: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlightOptions {
    pub enabled: bool,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Markup used for search matches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchMarkers {
    pub marker_class: String,
    pub active_class: String,
    pub active_id: String,
}

impl Default for SearchMarkers {
    fn default() -> Self {
        Self {
            marker_class: "search-highlight".to_string(),
            active_class: "active".to_string(),
            active_id: "active-search-match".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintOptions {
    /// Number of print files kept in the print directory, including the new one
    pub retain_files: usize,
    /// Directory created under the system temp dir
    pub directory_name: String,
    /// Embed the KaTeX/Mermaid client scripts in printed documents
    pub client_renderers: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            retain_files: 10,
            directory_name: ".markdown_preview_print".to_string(),
            client_renderers: true,
        }
    }
}

impl PrintOptions {
    pub fn directory(&self) -> PathBuf {
        std::env::temp_dir().join(&self.directory_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
    /// Fence language rendered by the diagram collaborator instead of the highlighter
    #[serde(default = "default_diagram_language")]
    pub diagram_language: String,
    #[serde(default)]
    pub markdown: MarkdownOptions,
    #[serde(default)]
    pub highlight: HighlightOptions,
    #[serde(default)]
    pub search: SearchMarkers,
    #[serde(default)]
    pub print: PrintOptions,
}

fn default_diagram_language() -> String {
    "mermaid".to_string()
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            diagram_language: default_diagram_language(),
            markdown: MarkdownOptions::default(),
            highlight: HighlightOptions::default(),
            search: SearchMarkers::default(),
            print: PrintOptions::default(),
        }
    }
}

impl RendererConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load from JSON string (for host integration)
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file, picked by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Self::from_yaml_file(path),
        }
    }
}
