// SPDX-License-Identifier: MPL-2.0
//! `esrgan_export` converts the pretrained Real-ESRGAN x4 checkpoint into a
//! web-deployable TensorFlow.js graph model.
//!
//! The conversion runs as one linear pipeline: instantiate the RRDBNet
//! architecture description, bind the checkpoint's parameters, serialize the
//! computation graph to an ONNX interchange file with dynamic spatial axes,
//! optionally validate the artifact by re-running it, then invoke the
//! external `tensorflowjs_converter` on the result.

pub mod config;
pub mod converter;
pub mod error;
pub mod model;
pub mod onnx;
pub mod pipeline;
pub mod validate;
