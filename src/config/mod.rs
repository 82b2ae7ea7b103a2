//! Configuration for the export pipeline.
//!
//! Every path and hyperparameter of the conversion is threaded through an
//! explicit [`ExportConfig`] rather than embedded as a literal, so each stage
//! can be pointed at temporary files under test. The config can be loaded
//! from and saved to a TOML file.
//!
//! # Examples
//!
//! ```no_run
//! use esrgan_export::config::{self, ExportConfig};
//!
//! // Defaults reproduce the documented conversion exactly.
//! let mut config = ExportConfig::default();
//! config.skip_validation = true;
//!
//! config::save_to_path(&config, "export.toml".as_ref()).expect("failed to save config");
//! let loaded = config::load_from_path("export.toml".as_ref()).expect("failed to load config");
//! assert!(loaded.skip_validation);
//! ```

pub mod defaults;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::converter::ConverterConfig;
use crate::error::Result;
use crate::model::ArchConfig;

/// Shape of the synthetic example input used to record the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            batch: defaults::DEFAULT_TRACE_BATCH,
            channels: defaults::DEFAULT_TRACE_CHANNELS,
            height: defaults::DEFAULT_TRACE_HEIGHT,
            width: defaults::DEFAULT_TRACE_WIDTH,
        }
    }
}

impl TraceConfig {
    /// Shape as `[batch, channels, height, width]`.
    #[must_use]
    pub fn dims(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Total number of elements in the example input.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }
}

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Path of the pretrained checkpoint (`.pth` or `.safetensors`).
    pub weights_path: PathBuf,
    /// Path of the ONNX artifact to write. Overwritten if present.
    pub artifact_path: PathBuf,
    /// RRDBNet hyperparameters.
    #[serde(default)]
    pub arch: ArchConfig,
    /// Example input shape recorded in the artifact's input metadata.
    #[serde(default)]
    pub trace: TraceConfig,
    /// ONNX operator-set version to stamp on the artifact.
    #[serde(default = "default_opset")]
    pub opset_version: i64,
    /// Skip the artifact validation stage.
    #[serde(default)]
    pub skip_validation: bool,
    /// External converter invocation settings.
    #[serde(default)]
    pub converter: ConverterConfig,
}

fn default_opset() -> i64 {
    defaults::DEFAULT_OPSET_VERSION
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from(defaults::DEFAULT_WEIGHTS_PATH),
            artifact_path: PathBuf::from(defaults::DEFAULT_ARTIFACT_PATH),
            arch: ArchConfig::default(),
            trace: TraceConfig::default(),
            opset_version: defaults::DEFAULT_OPSET_VERSION,
            skip_validation: false,
            converter: ConverterConfig::default(),
        }
    }
}

pub fn load_from_path(path: &Path) -> Result<ExportConfig> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn save_to_path(config: &ExportConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_reproduce_the_documented_conversion() {
        let config = ExportConfig::default();
        assert_eq!(
            config.weights_path,
            PathBuf::from("weights/RealESRGAN_x4.pth")
        );
        assert_eq!(config.artifact_path, PathBuf::from("model.onnx"));
        assert_eq!(config.opset_version, 11);
        assert!(!config.skip_validation);
        assert_eq!(config.trace.dims(), [1, 3, 64, 64]);
    }

    #[test]
    fn save_and_load_round_trip_preserves_overrides() {
        let mut config = ExportConfig::default();
        config.weights_path = PathBuf::from("fixtures/tiny.safetensors");
        config.arch.num_block = 2;
        config.skip_validation = true;

        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("export.toml");

        save_to_path(&config, &config_path).expect("failed to save config");
        let loaded = load_from_path(&config_path).expect("failed to load config");

        assert_eq!(loaded.weights_path, config.weights_path);
        assert_eq!(loaded.arch.num_block, 2);
        assert!(loaded.skip_validation);
    }

    #[test]
    fn load_from_path_rejects_invalid_toml() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("export.toml");
        fs::write(&config_path, "not = valid = toml").expect("failed to write invalid toml");

        assert!(load_from_path(&config_path).is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("export.toml");
        fs::write(
            &config_path,
            "weights_path = \"w.pth\"\nartifact_path = \"m.onnx\"\n",
        )
        .expect("failed to write config");

        let loaded = load_from_path(&config_path).expect("failed to load config");
        assert_eq!(loaded.opset_version, 11);
        assert_eq!(loaded.arch.num_feat, 64);
        assert_eq!(loaded.converter.program, "tensorflowjs_converter");
    }

    #[test]
    fn trace_element_count_multiplies_dims() {
        let trace = TraceConfig::default();
        assert_eq!(trace.element_count(), 3 * 64 * 64);
    }
}
