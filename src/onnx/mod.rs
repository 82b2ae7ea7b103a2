// SPDX-License-Identifier: MPL-2.0
//! ONNX interchange serialization.
//!
//! This module provides the export half of the pipeline:
//!
//! - [`pb`]: the written subset of the `onnx.proto` schema as prost messages
//! - [`graph`]: incremental builder for nodes, initializers, and value infos
//! - [`export`]: walks the model and writes `model.onnx`
//!
//! Re-loading and executing the artifact lives in [`crate::validate`].

pub mod graph;
pub mod pb;

mod export;

pub use export::{export, ExportError, ExportResult, ExportSummary};
