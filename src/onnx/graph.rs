// SPDX-License-Identifier: MPL-2.0
//! Incremental builder for the exported computation graph.
//!
//! Thin, typed helpers over the protobuf messages: one method per operator
//! the RRDBNet dataflow uses, plus initializer and value-info construction.
//! Node names are derived from the operator type and insertion index, the way
//! tracing exporters number their nodes.

use crate::onnx::pb::{
    tensor_shape_proto, type_proto, AttributeProto, AttributeType, GraphProto, NodeProto,
    TensorDataType, TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
};

/// A graph i/o dimension: fixed size or symbolic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    Fixed(i64),
    Symbolic(String),
}

impl Dim {
    #[must_use]
    pub fn symbolic(name: &str) -> Self {
        Dim::Symbolic(name.to_string())
    }
}

/// Builds nodes, initializers, and value infos into a [`GraphProto`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeProto>,
    initializers: Vec<TensorProto>,
    inputs: Vec<ValueInfoProto>,
    outputs: Vec<ValueInfoProto>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn initializer_count(&self) -> usize {
        self.initializers.len()
    }

    /// Registers an `f32` constant tensor, stored as little-endian raw data.
    pub fn float_initializer(&mut self, name: &str, dims: &[usize], data: &[f32]) {
        let mut raw = Vec::with_capacity(data.len() * 4);
        for value in data {
            raw.extend_from_slice(&value.to_le_bytes());
        }
        self.initializers.push(TensorProto {
            dims: dims.iter().map(|&d| d as i64).collect(),
            data_type: TensorDataType::Float as i32,
            name: name.to_string(),
            raw_data: raw,
            ..Default::default()
        });
    }

    /// Registers a scalar `f32` constant.
    pub fn scalar_initializer(&mut self, name: &str, value: f32) {
        self.float_initializer(name, &[], &[value]);
    }

    /// Declares a graph input with the given dimensions.
    pub fn add_input(&mut self, name: &str, dims: &[Dim]) {
        self.inputs.push(value_info(name, dims));
    }

    /// Declares a graph output with the given dimensions.
    pub fn add_output(&mut self, name: &str, dims: &[Dim]) {
        self.outputs.push(value_info(name, dims));
    }

    /// 3x3 convolution with padding 1 and stride 1.
    pub fn conv(&mut self, input: &str, weight: &str, bias: &str, output: &str) {
        let attributes = vec![
            attr_ints("dilations", &[1, 1]),
            attr_int("group", 1),
            attr_ints("kernel_shape", &[3, 3]),
            attr_ints("pads", &[1, 1, 1, 1]),
            attr_ints("strides", &[1, 1]),
        ];
        self.push_node(
            "Conv",
            vec![input.to_string(), weight.to_string(), bias.to_string()],
            output,
            attributes,
        );
    }

    pub fn leaky_relu(&mut self, input: &str, output: &str, alpha: f32) {
        self.push_node(
            "LeakyRelu",
            vec![input.to_string()],
            output,
            vec![attr_float("alpha", alpha)],
        );
    }

    /// Channel-axis concatenation.
    pub fn concat(&mut self, inputs: &[String], output: &str) {
        self.push_node("Concat", inputs.to_vec(), output, vec![attr_int("axis", 1)]);
    }

    pub fn mul(&mut self, a: &str, b: &str, output: &str) {
        self.push_node("Mul", vec![a.to_string(), b.to_string()], output, vec![]);
    }

    pub fn add(&mut self, a: &str, b: &str, output: &str) {
        self.push_node("Add", vec![a.to_string(), b.to_string()], output, vec![]);
    }

    /// Nearest-neighbor resize, as a tracing exporter writes
    /// `interpolate(scale_factor=2, mode="nearest")` at opset 11.
    ///
    /// `roi` and `scales` name previously registered initializers.
    pub fn resize_nearest(&mut self, input: &str, roi: &str, scales: &str, output: &str) {
        let attributes = vec![
            attr_string("coordinate_transformation_mode", "asymmetric"),
            attr_string("mode", "nearest"),
            attr_string("nearest_mode", "floor"),
        ];
        self.push_node(
            "Resize",
            vec![input.to_string(), roi.to_string(), scales.to_string()],
            output,
            attributes,
        );
    }

    fn push_node(
        &mut self,
        op_type: &str,
        inputs: Vec<String>,
        output: &str,
        attributes: Vec<AttributeProto>,
    ) {
        let name = format!("{}_{}", op_type, self.nodes.len());
        self.nodes.push(NodeProto {
            input: inputs,
            output: vec![output.to_string()],
            name,
            op_type: op_type.to_string(),
            attribute: attributes,
            ..Default::default()
        });
    }

    #[must_use]
    pub fn finish(self, name: &str) -> GraphProto {
        GraphProto {
            node: self.nodes,
            name: name.to_string(),
            initializer: self.initializers,
            input: self.inputs,
            output: self.outputs,
            ..Default::default()
        }
    }
}

fn value_info(name: &str, dims: &[Dim]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|d| tensor_shape_proto::Dimension {
            value: Some(match d {
                Dim::Fixed(v) => tensor_shape_proto::dimension::Value::DimValue(*v),
                Dim::Symbolic(s) => tensor_shape_proto::dimension::Value::DimParam(s.clone()),
            }),
        })
        .collect();

    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: TensorDataType::Float as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
        }),
        ..Default::default()
    }
}

fn attr_float(name: &str, value: f32) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        f: value,
        r#type: AttributeType::Float as i32,
        ..Default::default()
    }
}

fn attr_int(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        i: value,
        r#type: AttributeType::Int as i32,
        ..Default::default()
    }
}

fn attr_ints(name: &str, values: &[i64]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        ints: values.to_vec(),
        r#type: AttributeType::Ints as i32,
        ..Default::default()
    }
}

fn attr_string(name: &str, value: &str) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        s: value.as_bytes().to_vec(),
        r#type: AttributeType::String as i32,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conv_node_carries_kernel_geometry() {
        let mut builder = GraphBuilder::new();
        builder.conv("x", "w", "b", "y");
        let graph = builder.finish("g");

        let node = &graph.node[0];
        assert_eq!(node.op_type, "Conv");
        assert_eq!(node.input, vec!["x", "w", "b"]);
        assert_eq!(node.output, vec!["y"]);

        let pads = node
            .attribute
            .iter()
            .find(|a| a.name == "pads")
            .expect("pads attribute");
        assert_eq!(pads.ints, vec![1, 1, 1, 1]);
    }

    #[test]
    fn node_names_are_numbered_by_insertion() {
        let mut builder = GraphBuilder::new();
        builder.leaky_relu("a", "b", 0.2);
        builder.leaky_relu("b", "c", 0.2);
        let graph = builder.finish("g");

        assert_eq!(graph.node[0].name, "LeakyRelu_0");
        assert_eq!(graph.node[1].name, "LeakyRelu_1");
    }

    #[test]
    fn float_initializer_encodes_little_endian() {
        let mut builder = GraphBuilder::new();
        builder.float_initializer("w", &[2], &[1.0, -2.0]);
        let graph = builder.finish("g");

        let tensor = &graph.initializer[0];
        assert_eq!(tensor.dims, vec![2]);
        assert_eq!(tensor.raw_data.len(), 8);
        assert_eq!(&tensor.raw_data[0..4], &1.0_f32.to_le_bytes());
        assert_eq!(&tensor.raw_data[4..8], &(-2.0_f32).to_le_bytes());
    }

    #[test]
    fn symbolic_dims_become_dim_params() {
        let mut builder = GraphBuilder::new();
        builder.add_input(
            "input",
            &[
                Dim::Fixed(1),
                Dim::Fixed(3),
                Dim::symbolic("height"),
                Dim::symbolic("width"),
            ],
        );
        let graph = builder.finish("g");

        let shape = graph.input[0]
            .r#type
            .as_ref()
            .and_then(|t| t.value.as_ref())
            .map(|type_proto::Value::TensorType(t)| t.shape.as_ref().unwrap())
            .expect("tensor shape");

        assert_eq!(shape.dim.len(), 4);
        assert_eq!(
            shape.dim[2].value,
            Some(tensor_shape_proto::dimension::Value::DimParam(
                "height".to_string()
            ))
        );
    }

    #[test]
    fn resize_node_uses_the_tracing_exporter_attributes() {
        let mut builder = GraphBuilder::new();
        builder.resize_nearest("x", "roi", "scales", "y");
        let graph = builder.finish("g");

        let node = &graph.node[0];
        assert_eq!(node.op_type, "Resize");
        assert_eq!(node.input, vec!["x", "roi", "scales"]);
        let mode = node
            .attribute
            .iter()
            .find(|a| a.name == "mode")
            .expect("mode attribute");
        assert_eq!(mode.s, b"nearest".to_vec());
    }
}
