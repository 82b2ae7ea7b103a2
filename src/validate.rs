// SPDX-License-Identifier: MPL-2.0
//! Artifact validation by re-execution.
//!
//! After export, the interchange file is loaded back with tract and run on
//! the synthetic example input. Three properties are checked: the run is
//! deterministic (two executions produce bitwise-identical output), the
//! output is exactly 4x the spatial input with the configured channel count,
//! and the graph accepts a second input size through its dynamic axes.
//!
//! Validation is the only place this crate executes the network, and it does
//! so through tract rather than any hand-rolled math. The stage can be
//! skipped with `--skip-validate`.

use std::fmt;
use std::path::Path;

use rand::Rng;
use tract_onnx::prelude::*;

use crate::config::defaults;
use crate::model::ArchConfig;

/// Result type for validation operations.
pub type ValidateResult<T> = Result<T, ValidateError>;

/// Errors from the validation stage.
#[derive(Debug, Clone)]
pub enum ValidateError {
    /// The artifact could not be loaded or optimized.
    Load(String),
    /// Running the artifact failed.
    Inference(String),
    /// Two identical runs disagreed.
    NonDeterministic,
    /// The output shape is not 4x the spatial input.
    OutputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidateError::Load(msg) => write!(f, "failed to load artifact: {msg}"),
            ValidateError::Inference(msg) => write!(f, "failed to run artifact: {msg}"),
            ValidateError::NonDeterministic => {
                write!(f, "artifact produced different output for identical input")
            }
            ValidateError::OutputShape { expected, actual } => {
                write!(f, "artifact output shape {actual:?}, expected {expected:?}")
            }
        }
    }
}

impl std::error::Error for ValidateError {}

/// Shapes observed during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Output shape for the example input.
    pub output_shape: Vec<usize>,
    /// Output shape for the second, differently sized input.
    pub alternate_output_shape: Vec<usize>,
}

/// Validates the exported artifact against the example input.
///
/// # Errors
///
/// Returns an error if the artifact fails to load, a run fails, runs are
/// non-deterministic, or an output shape is wrong.
pub fn validate_artifact(
    path: &Path,
    dims: &[usize; 4],
    data: &[f32],
    arch: &ArchConfig,
) -> ValidateResult<ValidationReport> {
    let output_shape = check_at_size(path, dims, data, arch)?;

    // A second size exercises the dynamic spatial axes.
    let alternate = [dims[0], dims[1], dims[2] + 16, dims[3] + 8];
    let mut rng = rand::thread_rng();
    let alternate_data: Vec<f32> = (0..alternate.iter().product::<usize>())
        .map(|_| rng.gen::<f32>())
        .collect();
    let alternate_output_shape = check_at_size(path, &alternate, &alternate_data, arch)?;

    Ok(ValidationReport {
        output_shape,
        alternate_output_shape,
    })
}

/// Loads the artifact at one input size, runs it twice, and checks the
/// output shape and determinism. Returns the output shape.
fn check_at_size(
    path: &Path,
    dims: &[usize; 4],
    data: &[f32],
    arch: &ArchConfig,
) -> ValidateResult<Vec<usize>> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|m| {
            m.with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(dims[0], dims[1], dims[2], dims[3]),
                ),
            )
        })
        .and_then(|m| m.into_optimized())
        .and_then(|m| m.into_runnable())
        .map_err(|e| ValidateError::Load(e.to_string()))?;

    let mut previous: Option<Vec<f32>> = None;
    let mut shape = Vec::new();

    for _ in 0..2 {
        let input = Tensor::from_shape(&dims[..], data)
            .map_err(|e| ValidateError::Inference(e.to_string()))?;
        let result = model
            .run(tvec!(input.into()))
            .map_err(|e| ValidateError::Inference(e.to_string()))?;
        let view = result[0]
            .to_array_view::<f32>()
            .map_err(|e| ValidateError::Inference(e.to_string()))?;

        shape = view.shape().to_vec();
        let values: Vec<f32> = view.iter().copied().collect();
        if let Some(first) = &previous {
            if first != &values {
                return Err(ValidateError::NonDeterministic);
            }
        }
        previous = Some(values);
    }

    let expected = vec![
        dims[0],
        arch.num_out_ch,
        dims[2] * defaults::UPSCALE_FACTOR,
        dims[3] * defaults::UPSCALE_FACTOR,
    ];
    if shape != expected {
        return Err(ValidateError::OutputShape {
            expected,
            actual: shape,
        });
    }
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_a_load_error() {
        let err = validate_artifact(
            Path::new("does/not/exist.onnx"),
            &[1, 3, 8, 8],
            &[0.0; 3 * 64],
            &ArchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidateError::Load(_)));
    }

    #[test]
    fn output_shape_error_carries_both_shapes() {
        let err = ValidateError::OutputShape {
            expected: vec![1, 3, 256, 256],
            actual: vec![1, 3, 64, 64],
        };
        let message = err.to_string();
        assert!(message.contains("[1, 3, 256, 256]"));
        assert!(message.contains("[1, 3, 64, 64]"));
    }
}
