// SPDX-License-Identifier: MPL-2.0
//! The conversion pipeline.
//!
//! Strictly sequential, single-threaded, blocking: build the architecture,
//! bind the checkpoint, switch to inference mode, export the interchange
//! artifact, optionally validate it by re-execution, then invoke the external
//! converter. There is no retry, no parallelism, and no cleanup of a
//! partially written artifact if the process is interrupted.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use crate::config::{ExportConfig, TraceConfig};
use crate::converter::{self, ConverterOutcome};
use crate::error::{Error, Result};
use crate::model::{Model, StateDict};
use crate::onnx::{self, ExportSummary};
use crate::validate::{self, ValidationReport};

/// The synthetic input that records the trace shape and drives validation.
#[derive(Debug, Clone)]
pub struct ExampleInput {
    pub dims: [usize; 4],
    pub data: Vec<f32>,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// BLAKE3 digest of the checkpoint that was bound.
    pub weights_digest: String,
    /// Path of the interchange artifact.
    pub artifact_path: PathBuf,
    /// BLAKE3 digest of the interchange artifact.
    pub artifact_digest: String,
    pub export: ExportSummary,
    /// Present unless validation was skipped.
    pub validation: Option<ValidationReport>,
    pub converter: ConverterOutcome,
}

/// Runs the full conversion.
///
/// # Errors
///
/// Returns the first stage error encountered; later stages never run after a
/// failure. A converter failure is an error too, with the captured stderr
/// carried in it.
pub fn run(config: &ExportConfig) -> Result<PipelineReport> {
    info!(
        weights = %config.weights_path.display(),
        artifact = %config.artifact_path.display(),
        "starting conversion"
    );

    let mut model = Model::new(&config.arch);
    debug!(parameters = model.scalar_count(), "architecture instantiated");

    let state_dict = StateDict::load(&config.weights_path)?;
    debug!(tensors = state_dict.len(), "checkpoint read");
    model.load_state_dict(&state_dict)?;
    model.eval();
    let weights_digest = digest_file(&config.weights_path)?;
    info!(digest = %weights_digest, "checkpoint bound, model in inference mode");

    let example = synthesize_example(&config.trace);
    let export = onnx::export(&model, &config.trace, config.opset_version, &config.artifact_path)?;
    let artifact_digest = digest_file(&config.artifact_path)?;
    info!(digest = %artifact_digest, bytes = export.file_size, "artifact exported");

    let validation = if config.skip_validation {
        debug!("validation skipped");
        None
    } else {
        let report = validate::validate_artifact(
            &config.artifact_path,
            &example.dims,
            &example.data,
            &config.arch,
        )?;
        info!(output_shape = ?report.output_shape, "artifact validated");
        Some(report)
    };

    let converter = converter::run(&config.converter, &config.artifact_path)?;
    info!(output_dir = %config.converter.output_dir.display(), "conversion finished");

    Ok(PipelineReport {
        weights_digest,
        artifact_path: config.artifact_path.clone(),
        artifact_digest,
        export,
        validation,
        converter,
    })
}

/// Fills the example input with uniform random values.
#[must_use]
pub fn synthesize_example(trace: &TraceConfig) -> ExampleInput {
    let mut rng = rand::thread_rng();
    let data = (0..trace.element_count()).map(|_| rng.gen::<f32>()).collect();
    ExampleInput {
        dims: trace.dims(),
        data,
    }
}

/// BLAKE3 digest of a file's contents.
fn digest_file(path: &Path) -> Result<String> {
    let data = fs::read(path).map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    Ok(blake3::hash(&data).to_hex().to_string())
}
