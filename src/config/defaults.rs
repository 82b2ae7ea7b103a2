// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for the export pipeline.
//!
//! This module is the single source of truth for the constants the
//! conversion is pinned to. Constants are organized by category.
//!
//! # Categories
//!
//! - **Paths**: checkpoint input, interchange artifact, converter output
//! - **Architecture**: RRDBNet hyperparameters for the x4 model
//! - **Trace**: synthetic example input shape
//! - **Interchange**: ONNX version tags
//! - **Converter**: `tensorflowjs_converter` invocation defaults

// ==========================================================================
// Path Defaults
// ==========================================================================

/// Default location of the pretrained checkpoint, relative to the working
/// directory.
pub const DEFAULT_WEIGHTS_PATH: &str = "weights/RealESRGAN_x4.pth";

/// Default path of the exported ONNX artifact.
pub const DEFAULT_ARTIFACT_PATH: &str = "model.onnx";

/// Default output directory for the TensorFlow.js graph model.
pub const DEFAULT_TFJS_OUTPUT_DIR: &str = "../public/models/real-esrgan";

// ==========================================================================
// Architecture Defaults (RRDBNet x4)
// ==========================================================================

/// Input channel count (RGB).
pub const DEFAULT_NUM_IN_CH: usize = 3;

/// Output channel count (RGB).
pub const DEFAULT_NUM_OUT_CH: usize = 3;

/// Base feature width of the trunk convolutions.
pub const DEFAULT_NUM_FEAT: usize = 64;

/// Number of residual-in-residual dense blocks in the trunk.
pub const DEFAULT_NUM_BLOCK: usize = 23;

/// Growth channel count inside each dense block.
pub const DEFAULT_NUM_GROW_CH: usize = 32;

/// Fixed spatial upscale factor of the x4 architecture (two 2x upsamples).
pub const UPSCALE_FACTOR: usize = 4;

/// Residual scaling applied to dense-block and block outputs.
pub const RESIDUAL_SCALE: f32 = 0.2;

/// Negative slope of the leaky ReLU activations.
pub const LEAKY_RELU_SLOPE: f32 = 0.2;

// ==========================================================================
// Trace Defaults
// ==========================================================================

/// Batch size of the synthetic example input.
pub const DEFAULT_TRACE_BATCH: usize = 1;

/// Channel count of the synthetic example input.
pub const DEFAULT_TRACE_CHANNELS: usize = 3;

/// Height of the synthetic example input.
pub const DEFAULT_TRACE_HEIGHT: usize = 64;

/// Width of the synthetic example input.
pub const DEFAULT_TRACE_WIDTH: usize = 64;

// ==========================================================================
// Interchange Defaults
// ==========================================================================

/// ONNX operator-set version the artifact targets.
pub const DEFAULT_OPSET_VERSION: i64 = 11;

/// ONNX intermediate-representation version paired with opset 11.
pub const IR_VERSION: i64 = 6;

/// Name of the graph input tensor.
pub const GRAPH_INPUT_NAME: &str = "input";

/// Name of the graph output tensor.
pub const GRAPH_OUTPUT_NAME: &str = "output";

/// Symbolic name of the dynamic height axis.
pub const DYNAMIC_HEIGHT: &str = "height";

/// Symbolic name of the dynamic width axis.
pub const DYNAMIC_WIDTH: &str = "width";

// ==========================================================================
// Converter Defaults
// ==========================================================================

/// Name of the external converter binary, resolved via `PATH`.
pub const DEFAULT_CONVERTER_PROGRAM: &str = "tensorflowjs_converter";

/// Input format flag handed to the converter. Kept verbatim from the
/// documented invocation even though it is dubious for an ONNX payload;
/// overridable through `ConverterConfig`.
pub const DEFAULT_CONVERTER_INPUT_FORMAT: &str = "tf_saved_model";

/// Output format flag handed to the converter.
pub const DEFAULT_CONVERTER_OUTPUT_FORMAT: &str = "tfjs_graph_model";

/// Serving signature name handed to the converter.
pub const DEFAULT_CONVERTER_SIGNATURE_NAME: &str = "serving_default";

/// Saved-model tags handed to the converter.
pub const DEFAULT_CONVERTER_SAVED_MODEL_TAGS: &str = "serve";

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    // Architecture validation
    assert!(DEFAULT_NUM_IN_CH > 0);
    assert!(DEFAULT_NUM_OUT_CH > 0);
    assert!(DEFAULT_NUM_FEAT > 0);
    assert!(DEFAULT_NUM_BLOCK > 0);
    assert!(DEFAULT_NUM_GROW_CH > 0);

    // The trace shape must match what the architecture consumes
    assert!(DEFAULT_TRACE_BATCH == 1);
    assert!(DEFAULT_TRACE_CHANNELS == DEFAULT_NUM_IN_CH);
    assert!(DEFAULT_TRACE_HEIGHT > 0);
    assert!(DEFAULT_TRACE_WIDTH > 0);

    // Two nearest-neighbor 2x upsamples
    assert!(UPSCALE_FACTOR == 4);
    assert!(DEFAULT_OPSET_VERSION == 11);
};
