//! On-disk configuration (`annotate.toml` by default).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::BatchMode;
use crate::error::{AnnotateError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "annotate.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub output: OutputConfig,
    pub batch: BatchSection,
    pub keys: KeyBindings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory of images to annotate. Asked for interactively when unset.
    pub raw_img_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub record_dir: PathBuf,
    pub preview_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            record_dir: PathBuf::from("annotations"),
            preview_dir: PathBuf::from("annotations_img"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub mode: BatchMode,
}

/// Key names as understood by `egui::Key::from_name`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub undo: String,
    pub save: String,
    pub quit: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            undo: "D".to_string(),
            save: "Space".to_string(),
            quit: "Q".to_string(),
        }
    }
}

impl Config {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| AnnotateError::io(path, e))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        toml::from_str(data).map_err(|e| AnnotateError::Config(e.to_string()))
    }
}
