// SPDX-License-Identifier: MPL-2.0
//! Checkpoint loading.
//!
//! Reads a serialized parameter-name-to-tensor mapping from disk. PyTorch
//! `.pth`/`.pt` checkpoints are read through candle's pickle reader,
//! `.safetensors` through its safetensors reader; every tensor is converted
//! to `f32` ndarray storage. Real-ESRGAN releases sometimes nest the state
//! dict under a `params`/`params_ema` key; that prefix is stripped on load so
//! the keys line up with the architecture manifest.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use ndarray::{ArrayD, IxDyn};

/// Result type for checkpoint operations.
pub type WeightsResult<T> = Result<T, WeightsError>;

/// Errors that can occur while reading or binding a checkpoint.
#[derive(Debug, Clone)]
pub enum WeightsError {
    /// Checkpoint file not found at the given path.
    NotFound(String),
    /// File extension is not a recognized checkpoint format.
    UnsupportedFormat(String),
    /// Deserialization failed.
    Read(String),
    /// A tensor has a dtype that cannot be converted to `f32`.
    UnsupportedDtype { name: String, dtype: String },
    /// The architecture expects a parameter the checkpoint lacks.
    MissingParameter(String),
    /// The checkpoint carries a parameter the architecture does not declare.
    UnexpectedParameter(String),
    /// Parameter shapes disagree.
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

impl fmt::Display for WeightsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightsError::NotFound(path) => write!(f, "checkpoint not found: {path}"),
            WeightsError::UnsupportedFormat(ext) => {
                write!(f, "unsupported checkpoint format: {ext}")
            }
            WeightsError::Read(msg) => write!(f, "failed to read checkpoint: {msg}"),
            WeightsError::UnsupportedDtype { name, dtype } => {
                write!(f, "parameter {name} has unsupported dtype {dtype}")
            }
            WeightsError::MissingParameter(name) => {
                write!(f, "checkpoint is missing parameter {name}")
            }
            WeightsError::UnexpectedParameter(name) => {
                write!(f, "checkpoint carries unexpected parameter {name}")
            }
            WeightsError::ShapeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "parameter {name} has shape {actual:?}, expected {expected:?}"
            ),
        }
    }
}

impl std::error::Error for WeightsError {}

/// Key prefixes Real-ESRGAN releases nest their state dicts under.
const RELEASE_PREFIXES: [&str; 2] = ["params_ema.", "params."];

/// An immutable name-to-tensor mapping read from a checkpoint file.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl StateDict {
    /// Reads a checkpoint from disk, dispatching on the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, the extension is not
    /// `.pth`/`.pt`/`.safetensors`, deserialization fails, or a tensor has a
    /// non-float dtype.
    pub fn load(path: &Path) -> WeightsResult<Self> {
        if !path.exists() {
            return Err(WeightsError::NotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let tensors: Vec<(String, Tensor)> = match extension.as_str() {
            "pth" | "pt" => {
                candle_core::pickle::read_all(path).map_err(|e| WeightsError::Read(e.to_string()))?
            }
            "safetensors" => candle_core::safetensors::load(path, &Device::Cpu)
                .map_err(|e| WeightsError::Read(e.to_string()))?
                .into_iter()
                .collect(),
            other => return Err(WeightsError::UnsupportedFormat(other.to_string())),
        };

        let mut map = BTreeMap::new();
        for (name, tensor) in &tensors {
            map.insert(name.clone(), tensor_to_array(name, tensor)?);
        }
        Ok(Self::from_arrays(map))
    }

    /// Builds a state dict from in-memory tensors, applying the same release
    /// prefix stripping as [`StateDict::load`].
    #[must_use]
    pub fn from_arrays(tensors: BTreeMap<String, ArrayD<f32>>) -> Self {
        Self {
            tensors: strip_release_prefix(tensors),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Parameter names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}

/// Strips a uniform `params.`/`params_ema.` prefix if every key carries one.
fn strip_release_prefix(tensors: BTreeMap<String, ArrayD<f32>>) -> BTreeMap<String, ArrayD<f32>> {
    if tensors.is_empty() {
        return tensors;
    }
    for prefix in RELEASE_PREFIXES {
        if tensors.keys().all(|k| k.starts_with(prefix)) {
            return tensors
                .into_iter()
                .map(|(k, v)| (k[prefix.len()..].to_string(), v))
                .collect();
        }
    }
    tensors
}

/// Converts a candle tensor to `f32` ndarray storage.
fn tensor_to_array(name: &str, tensor: &Tensor) -> WeightsResult<ArrayD<f32>> {
    let tensor = match tensor.dtype() {
        DType::F32 => tensor.clone(),
        DType::F16 | DType::BF16 | DType::F64 => tensor
            .to_dtype(DType::F32)
            .map_err(|e| WeightsError::Read(e.to_string()))?,
        other => {
            return Err(WeightsError::UnsupportedDtype {
                name: name.to_string(),
                dtype: format!("{other:?}"),
            })
        }
    };

    let dims = tensor.dims().to_vec();
    let data = tensor
        .flatten_all()
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| WeightsError::Read(e.to_string()))?;

    ArrayD::from_shape_vec(IxDyn(&dims), data)
        .map_err(|e| WeightsError::Read(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(shape: &[usize]) -> ArrayD<f32> {
        ArrayD::zeros(IxDyn(shape))
    }

    #[test]
    fn load_reports_missing_file() {
        let err = StateDict::load(Path::new("does/not/exist.pth")).unwrap_err();
        assert!(matches!(err, WeightsError::NotFound(_)));
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("weights.bin");
        std::fs::write(&path, b"not a checkpoint").expect("failed to write file");

        let err = StateDict::load(&path).unwrap_err();
        assert!(matches!(err, WeightsError::UnsupportedFormat(ext) if ext == "bin"));
    }

    #[test]
    fn release_prefix_is_stripped_when_uniform() {
        let mut tensors = BTreeMap::new();
        tensors.insert("params_ema.conv_first.weight".to_string(), array(&[4]));
        tensors.insert("params_ema.conv_first.bias".to_string(), array(&[4]));

        let dict = StateDict::from_arrays(tensors);
        assert!(dict.get("conv_first.weight").is_some());
        assert!(dict.get("params_ema.conv_first.weight").is_none());
    }

    #[test]
    fn mixed_prefixes_are_left_alone() {
        let mut tensors = BTreeMap::new();
        tensors.insert("params.conv_first.weight".to_string(), array(&[4]));
        tensors.insert("conv_first.bias".to_string(), array(&[4]));

        let dict = StateDict::from_arrays(tensors);
        assert!(dict.get("params.conv_first.weight").is_some());
        assert!(dict.get("conv_first.bias").is_some());
    }

    #[test]
    fn shape_mismatch_display_names_the_parameter() {
        let err = WeightsError::ShapeMismatch {
            name: "conv_first.weight".to_string(),
            expected: vec![64, 3, 3, 3],
            actual: vec![64, 1, 3, 3],
        };
        let message = err.to_string();
        assert!(message.contains("conv_first.weight"));
        assert!(message.contains("[64, 3, 3, 3]"));
    }
}
