// SPDX-License-Identifier: MPL-2.0
//! External `tensorflowjs_converter` invocation.
//!
//! The last pipeline stage shells out to the TensorFlow.js converter to turn
//! the interchange artifact into a browser-deployable graph model. The exit
//! status and captured output are recorded in a [`ConverterOutcome`], and a
//! launch failure or non-zero exit propagates to the caller.
//!
//! The composed argument list reproduces the documented invocation verbatim,
//! including `--input_format=tf_saved_model`. That flag is dubious for an
//! ONNX payload, which is why it is configurable rather than a literal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::defaults;

/// Result type for converter operations.
pub type ConverterResult<T> = Result<T, ConverterError>;

/// Errors from the external converter stage.
#[derive(Debug, Clone)]
pub enum ConverterError {
    /// The converter process could not be spawned (missing binary, no
    /// execute permission).
    Launch { program: String, message: String },
    /// The converter ran but exited unsuccessfully.
    Failed {
        status: Option<i32>,
        stderr: String,
    },
}

impl fmt::Display for ConverterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterError::Launch { program, message } => {
                write!(f, "failed to launch {program}: {message}")
            }
            ConverterError::Failed { status, stderr } => {
                let stderr = stderr.trim();
                match status {
                    Some(code) => write!(f, "converter exited with status {code}: {stderr}"),
                    None => write!(f, "converter terminated by signal: {stderr}"),
                }
            }
        }
    }
}

impl std::error::Error for ConverterError {}

/// Settings for the converter invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Converter binary, resolved via `PATH`.
    pub program: String,
    /// `--input_format` value.
    pub input_format: String,
    /// `--output_format` value.
    pub output_format: String,
    /// `--signature_name` value.
    pub signature_name: String,
    /// `--saved_model_tags` value.
    pub saved_model_tags: String,
    /// Directory the graph-model files are written to.
    pub output_dir: PathBuf,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: defaults::DEFAULT_CONVERTER_PROGRAM.to_string(),
            input_format: defaults::DEFAULT_CONVERTER_INPUT_FORMAT.to_string(),
            output_format: defaults::DEFAULT_CONVERTER_OUTPUT_FORMAT.to_string(),
            signature_name: defaults::DEFAULT_CONVERTER_SIGNATURE_NAME.to_string(),
            saved_model_tags: defaults::DEFAULT_CONVERTER_SAVED_MODEL_TAGS.to_string(),
            output_dir: PathBuf::from(defaults::DEFAULT_TFJS_OUTPUT_DIR),
        }
    }
}

/// Captured result of a converter run.
#[derive(Debug, Clone)]
pub struct ConverterOutcome {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// The argument list handed to the converter binary.
#[must_use]
pub fn command_args(config: &ConverterConfig, artifact_path: &Path) -> Vec<String> {
    vec![
        format!("--input_format={}", config.input_format),
        format!("--output_format={}", config.output_format),
        format!("--signature_name={}", config.signature_name),
        format!("--saved_model_tags={}", config.saved_model_tags),
        artifact_path.display().to_string(),
        config.output_dir.display().to_string(),
    ]
}

/// Runs the converter, blocking until it exits. No timeout, no retry.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned or exits unsuccessfully;
/// the captured stderr is carried in the error.
pub fn run(config: &ConverterConfig, artifact_path: &Path) -> ConverterResult<ConverterOutcome> {
    let args = command_args(config, artifact_path);
    info!(program = %config.program, ?args, "invoking external converter");

    let output = Command::new(&config.program)
        .args(&args)
        .output()
        .map_err(|e| ConverterError::Launch {
            program: config.program.clone(),
            message: e.to_string(),
        })?;

    let outcome = ConverterOutcome {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.status.success() {
        warn!(status = ?outcome.status, stderr = %outcome.stderr, "converter failed");
        return Err(ConverterError::Failed {
            status: outcome.status,
            stderr: outcome.stderr,
        });
    }

    info!(status = ?outcome.status, "converter finished");
    Ok(outcome)
}
