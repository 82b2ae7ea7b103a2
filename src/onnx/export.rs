// SPDX-License-Identifier: MPL-2.0
//! Serializes a bound model into the ONNX interchange artifact.
//!
//! Walks the topology description, emits the RRDBNet dataflow as graph nodes
//! with every bound parameter embedded as an initializer, and writes the
//! encoded `ModelProto` in one call. The two spatial axes of the graph input
//! and output are declared symbolic so the artifact accepts images of other
//! sizes; batch and channel axes stay fixed. An existing file at the output
//! path is overwritten without confirmation.

use std::fmt;
use std::fs;
use std::path::Path;

use prost::Message;
use tracing::{debug, info};

use crate::config::defaults;
use crate::config::TraceConfig;
use crate::model::arch::{ConvSpec, DenseBlock, ResidualBlock};
use crate::model::Model;
use crate::onnx::graph::{Dim, GraphBuilder};
use crate::onnx::pb::{GraphProto, ModelProto, OperatorSetIdProto};

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while serializing the artifact.
#[derive(Debug, Clone)]
pub enum ExportError {
    /// The model has no checkpoint bound.
    UnboundModel,
    /// The model is still in training mode.
    TrainingMode,
    /// A manifest parameter has no bound value.
    ParameterUnavailable(String),
    /// Writing the artifact failed.
    Write(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::UnboundModel => write!(f, "model has no checkpoint bound"),
            ExportError::TrainingMode => {
                write!(f, "model must be in inference mode before export")
            }
            ExportError::ParameterUnavailable(name) => {
                write!(f, "parameter {name} has no bound value")
            }
            ExportError::Write(msg) => write!(f, "failed to write artifact: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}

/// What was written, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub node_count: usize,
    pub initializer_count: usize,
    pub file_size: u64,
}

/// Shared initializer names for the residual scaling and the upsample inputs.
const RESIDUAL_SCALE_NAME: &str = "residual_scale";
const UPSAMPLE_ROI_NAME: &str = "upsample.roi";
const UPSAMPLE_SCALES_NAME: &str = "upsample.scales";

/// Serializes the model to `path`.
///
/// # Errors
///
/// Returns an error if the model is unbound or still in training mode, or if
/// the file cannot be written (missing directory, no permission). A write
/// failure happens before any external process is invoked by the pipeline.
pub fn export(
    model: &Model,
    trace: &TraceConfig,
    opset_version: i64,
    path: &Path,
) -> ExportResult<ExportSummary> {
    if !model.has_weights() {
        return Err(ExportError::UnboundModel);
    }
    if model.is_training() {
        return Err(ExportError::TrainingMode);
    }

    let graph = build_graph(model, trace)?;
    let node_count = graph.node.len();
    let initializer_count = graph.initializer.len();

    let proto = ModelProto {
        ir_version: defaults::IR_VERSION,
        producer_name: env!("CARGO_PKG_NAME").to_string(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        graph: Some(graph),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: opset_version,
        }],
        ..Default::default()
    };

    let bytes = proto.encode_to_vec();
    fs::write(path, &bytes).map_err(|e| ExportError::Write(format!("{}: {e}", path.display())))?;

    info!(
        path = %path.display(),
        nodes = node_count,
        initializers = initializer_count,
        bytes = bytes.len(),
        "artifact written"
    );

    Ok(ExportSummary {
        node_count,
        initializer_count,
        file_size: bytes.len() as u64,
    })
}

/// Emits the full RRDBNet dataflow into a graph.
fn build_graph(model: &Model, trace: &TraceConfig) -> ExportResult<GraphProto> {
    let arch = model.arch();
    let mut g = GraphBuilder::new();

    g.add_input(
        defaults::GRAPH_INPUT_NAME,
        &[
            Dim::Fixed(trace.batch as i64),
            Dim::Fixed(arch.config.num_in_ch as i64),
            Dim::symbolic(defaults::DYNAMIC_HEIGHT),
            Dim::symbolic(defaults::DYNAMIC_WIDTH),
        ],
    );
    // The output reuses the input's symbolic axis names even though the
    // actual spatial extent is 4x.
    g.add_output(
        defaults::GRAPH_OUTPUT_NAME,
        &[
            Dim::Fixed(trace.batch as i64),
            Dim::Fixed(arch.config.num_out_ch as i64),
            Dim::symbolic(defaults::DYNAMIC_HEIGHT),
            Dim::symbolic(defaults::DYNAMIC_WIDTH),
        ],
    );

    g.scalar_initializer(RESIDUAL_SCALE_NAME, defaults::RESIDUAL_SCALE);
    g.float_initializer(UPSAMPLE_ROI_NAME, &[0], &[]);
    g.float_initializer(UPSAMPLE_SCALES_NAME, &[4], &[1.0, 1.0, 2.0, 2.0]);

    // Shallow feature extraction.
    emit_conv(&mut g, model, &arch.conv_first, defaults::GRAPH_INPUT_NAME, "conv_first.out")?;

    // Trunk of residual-in-residual dense blocks.
    let mut cursor = "conv_first.out".to_string();
    for (index, block) in arch.body.iter().enumerate() {
        cursor = emit_residual_block(&mut g, model, block, &format!("body.{index}"), &cursor)?;
    }
    emit_conv(&mut g, model, &arch.conv_body, &cursor, "conv_body.out")?;
    g.add("conv_body.out", "conv_first.out", "trunk.out");

    // Two nearest-neighbor 2x upsamples, then reconstruction.
    g.resize_nearest("trunk.out", UPSAMPLE_ROI_NAME, UPSAMPLE_SCALES_NAME, "upsample1.out");
    emit_conv(&mut g, model, &arch.conv_up1, "upsample1.out", "conv_up1.out")?;
    g.leaky_relu("conv_up1.out", "conv_up1.act", defaults::LEAKY_RELU_SLOPE);

    g.resize_nearest("conv_up1.act", UPSAMPLE_ROI_NAME, UPSAMPLE_SCALES_NAME, "upsample2.out");
    emit_conv(&mut g, model, &arch.conv_up2, "upsample2.out", "conv_up2.out")?;
    g.leaky_relu("conv_up2.out", "conv_up2.act", defaults::LEAKY_RELU_SLOPE);

    emit_conv(&mut g, model, &arch.conv_hr, "conv_up2.act", "conv_hr.out")?;
    g.leaky_relu("conv_hr.out", "conv_hr.act", defaults::LEAKY_RELU_SLOPE);
    emit_conv(&mut g, model, &arch.conv_last, "conv_hr.act", defaults::GRAPH_OUTPUT_NAME)?;

    debug!(nodes = g.node_count(), "graph emitted");
    Ok(g.finish("rrdbnet_x4"))
}

/// One residual-in-residual dense block; returns the block output name.
fn emit_residual_block(
    g: &mut GraphBuilder,
    model: &Model,
    block: &ResidualBlock,
    prefix: &str,
    input: &str,
) -> ExportResult<String> {
    let mut cursor = input.to_string();
    for (k, dense) in block.dense.iter().enumerate() {
        cursor = emit_dense_block(g, model, dense, &format!("{prefix}.rdb{}", k + 1), &cursor)?;
    }

    let scaled = format!("{prefix}.scaled");
    let output = format!("{prefix}.out");
    g.mul(&cursor, RESIDUAL_SCALE_NAME, &scaled);
    g.add(&scaled, input, &output);
    Ok(output)
}

/// One five-convolution dense block; returns the block output name.
fn emit_dense_block(
    g: &mut GraphBuilder,
    model: &Model,
    dense: &DenseBlock,
    prefix: &str,
    input: &str,
) -> ExportResult<String> {
    let mut features = vec![input.to_string()];

    for (j, conv) in dense.convs.iter().take(4).enumerate() {
        let conv_input = if features.len() == 1 {
            features[0].clone()
        } else {
            let cat = format!("{prefix}.cat{j}");
            g.concat(&features, &cat);
            cat
        };
        let conv_out = format!("{prefix}.conv{}.out", j + 1);
        emit_conv(g, model, conv, &conv_input, &conv_out)?;
        let act = format!("{prefix}.conv{}.act", j + 1);
        g.leaky_relu(&conv_out, &act, defaults::LEAKY_RELU_SLOPE);
        features.push(act);
    }

    let cat = format!("{prefix}.cat4");
    g.concat(&features, &cat);
    let conv5_out = format!("{prefix}.conv5.out");
    emit_conv(g, model, &dense.convs[4], &cat, &conv5_out)?;

    let scaled = format!("{prefix}.scaled");
    let output = format!("{prefix}.out");
    g.mul(&conv5_out, RESIDUAL_SCALE_NAME, &scaled);
    g.add(&scaled, input, &output);
    Ok(output)
}

/// Emits one convolution node and registers its parameters as initializers.
fn emit_conv(
    g: &mut GraphBuilder,
    model: &Model,
    conv: &ConvSpec,
    input: &str,
    output: &str,
) -> ExportResult<()> {
    let weight_name = conv.weight_name();
    let bias_name = conv.bias_name();

    let weight = model
        .parameter(&weight_name)
        .ok_or_else(|| ExportError::ParameterUnavailable(weight_name.clone()))?;
    let bias = model
        .parameter(&bias_name)
        .ok_or_else(|| ExportError::ParameterUnavailable(bias_name.clone()))?;

    let weight_data: Vec<f32> = weight.iter().copied().collect();
    let bias_data: Vec<f32> = bias.iter().copied().collect();
    g.float_initializer(&weight_name, weight.shape(), &weight_data);
    g.float_initializer(&bias_name, bias.shape(), &bias_data);

    g.conv(input, &weight_name, &bias_name, output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchConfig, RrdbNet, StateDict};
    use crate::onnx::pb::tensor_shape_proto;
    use ndarray::{ArrayD, IxDyn};
    use tempfile::tempdir;

    fn tiny() -> ArchConfig {
        ArchConfig {
            num_in_ch: 3,
            num_out_ch: 3,
            num_feat: 8,
            num_block: 1,
            num_grow_ch: 4,
        }
    }

    fn bound_model(config: &ArchConfig) -> Model {
        let mut model = Model::new(config);
        let tensors = RrdbNet::new(config)
            .parameters()
            .into_iter()
            .map(|p| (p.name, ArrayD::from_elem(IxDyn(&p.shape), 0.01_f32)))
            .collect();
        model
            .load_state_dict(&StateDict::from_arrays(tensors))
            .expect("matching dict should bind");
        model.eval();
        model
    }

    #[test]
    fn export_rejects_unbound_model() {
        let model = Model::new(&tiny());
        let err = export(&model, &TraceConfig::default(), 11, Path::new("x.onnx")).unwrap_err();
        assert!(matches!(err, ExportError::UnboundModel));
    }

    #[test]
    fn export_rejects_training_mode() {
        let config = tiny();
        let mut model = Model::new(&config);
        let tensors = RrdbNet::new(&config)
            .parameters()
            .into_iter()
            .map(|p| (p.name, ArrayD::zeros(IxDyn(&p.shape))))
            .collect();
        model
            .load_state_dict(&StateDict::from_arrays(tensors))
            .expect("matching dict should bind");

        let err = export(&model, &TraceConfig::default(), 11, Path::new("x.onnx")).unwrap_err();
        assert!(matches!(err, ExportError::TrainingMode));
    }

    #[test]
    fn export_writes_a_decodable_artifact() {
        let config = tiny();
        let model = bound_model(&config);
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.onnx");

        let summary =
            export(&model, &TraceConfig::default(), 11, &path).expect("export should succeed");

        let bytes = fs::read(&path).expect("artifact should exist");
        assert!(!bytes.is_empty());
        assert_eq!(summary.file_size, bytes.len() as u64);

        let decoded = ModelProto::decode(bytes.as_slice()).expect("artifact should decode");
        assert_eq!(decoded.ir_version, 6);
        assert_eq!(decoded.opset_import[0].version, 11);
        assert_eq!(decoded.producer_name, "esrgan-export");

        let graph = decoded.graph.expect("graph present");
        assert_eq!(graph.node.len(), summary.node_count);
        // One weight and bias per convolution, plus the three shared constants.
        let conv_count = 6 + 15 * config.num_block;
        assert_eq!(graph.initializer.len(), 2 * conv_count + 3);
        assert_eq!(graph.output[0].name, "output");
    }

    #[test]
    fn artifact_declares_dynamic_spatial_axes() {
        let config = tiny();
        let model = bound_model(&config);
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.onnx");
        export(&model, &TraceConfig::default(), 11, &path).expect("export should succeed");

        let bytes = fs::read(&path).expect("artifact should exist");
        let decoded = ModelProto::decode(bytes.as_slice()).expect("artifact should decode");
        let graph = decoded.graph.expect("graph present");

        for value_info in graph.input.iter().chain(graph.output.iter()) {
            let shape = value_info
                .r#type
                .as_ref()
                .and_then(|t| t.value.as_ref())
                .map(|crate::onnx::pb::type_proto::Value::TensorType(t)| {
                    t.shape.as_ref().expect("shape present")
                })
                .expect("tensor type present");

            assert_eq!(
                shape.dim[0].value,
                Some(tensor_shape_proto::dimension::Value::DimValue(1))
            );
            assert_eq!(
                shape.dim[2].value,
                Some(tensor_shape_proto::dimension::Value::DimParam(
                    "height".to_string()
                ))
            );
            assert_eq!(
                shape.dim[3].value,
                Some(tensor_shape_proto::dimension::Value::DimParam(
                    "width".to_string()
                ))
            );
        }
    }

    #[test]
    fn export_overwrites_an_existing_artifact() {
        let config = tiny();
        let model = bound_model(&config);
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.onnx");
        fs::write(&path, b"stale").expect("failed to seed file");

        export(&model, &TraceConfig::default(), 11, &path).expect("export should succeed");
        let bytes = fs::read(&path).expect("artifact should exist");
        assert!(bytes.len() > 5);
    }

    #[test]
    fn export_fails_when_the_target_directory_is_missing() {
        let config = tiny();
        let model = bound_model(&config);
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("missing").join("model.onnx");

        let err = export(&model, &TraceConfig::default(), 11, &path).unwrap_err();
        assert!(matches!(err, ExportError::Write(_)));
    }
}
