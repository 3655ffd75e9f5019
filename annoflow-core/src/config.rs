use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AnnoflowError, Result};

/// Options for one export call.
///
/// Loaded from `~/.annoflow/export.toml` or built in code; every field has a default:
///
/// ```toml
/// single_files = true
/// max_datapoints = 100
/// save_image = true
/// save_image_in_json = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// One JSON file per datapoint instead of a single JSONL file
    pub single_files: bool,
    /// Name of the JSONL file; required when `single_files` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Stop after this many datapoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_datapoints: Option<usize>,
    /// Keep the encoded image in the exported document
    pub save_image: bool,
    /// Leave the image inside the JSON; otherwise write it to `image/<base>.png`
    pub save_image_in_json: bool,
    /// Drop image attributes nested in annotations
    pub highest_hierarchy_only: bool,
    /// Show a progress spinner while exporting
    pub show_progress: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            single_files: false,
            file_name: None,
            max_datapoints: None,
            save_image: false,
            save_image_in_json: true,
            highest_hierarchy_only: false,
            show_progress: false,
        }
    }
}

impl ExportConfig {
    /// Aggregate (JSONL) layout writing to `file_name`
    pub fn jsonl(file_name: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            ..Default::default()
        }
    }

    /// Per-datapoint layout
    pub fn single_files() -> Self {
        Self {
            single_files: true,
            ..Default::default()
        }
    }

    pub fn with_max_datapoints(mut self, max: usize) -> Self {
        self.max_datapoints = Some(max);
        self
    }

    /// Keep images, either embedded (`in_json`) or as PNG side files.
    pub fn with_images(mut self, in_json: bool) -> Self {
        self.save_image = true;
        self.save_image_in_json = in_json;
        self
    }

    pub fn with_highest_hierarchy_only(mut self, enabled: bool) -> Self {
        self.highest_hierarchy_only = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Checks the layout options before anything touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        if !self.single_files {
            match self.file_name.as_deref() {
                Some(name) if !name.is_empty() => {}
                _ => {
                    return Err(AnnoflowError::configuration(
                        "a file name for the .jsonl output is required when single_files is false",
                    ))
                }
            }
        }
        Ok(())
    }

    /// Whether image payloads are split into `image/<base>.png` side files.
    pub fn extracts_images(&self) -> bool {
        self.single_files && self.save_image && !self.save_image_in_json
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|err| AnnoflowError::configuration(format!("invalid TOML: {}", err)))
    }

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnnoflowError::path_not_found(path));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Default config file path: ~/.annoflow/export.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".annoflow/export.toml")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| AnnoflowError::configuration(format!("failed to serialize config: {}", err)))
    }
}
