// SPDX-License-Identifier: MPL-2.0
//! Static description of the RRDBNet x4 topology.
//!
//! The architecture is carried as data: an ordered set of named 3x3
//! convolutions with their channel counts. That is enough to derive the exact
//! parameter manifest a matching PyTorch state dict contains, and to walk the
//! dataflow during ONNX emission. The network is never executed here.

use serde::{Deserialize, Serialize};

use crate::config::defaults;

/// RRDBNet hyperparameters. Defaults reproduce the x4 checkpoint
/// (`in=3, out=3, feat=64, blocks=23, growth=32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchConfig {
    pub num_in_ch: usize,
    pub num_out_ch: usize,
    pub num_feat: usize,
    pub num_block: usize,
    pub num_grow_ch: usize,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            num_in_ch: defaults::DEFAULT_NUM_IN_CH,
            num_out_ch: defaults::DEFAULT_NUM_OUT_CH,
            num_feat: defaults::DEFAULT_NUM_FEAT,
            num_block: defaults::DEFAULT_NUM_BLOCK,
            num_grow_ch: defaults::DEFAULT_NUM_GROW_CH,
        }
    }
}

/// One named parameter of the architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

/// A named 3x3 convolution with padding 1 and stride 1.
///
/// Every convolution in RRDBNet has this kernel geometry; only the channel
/// counts vary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvSpec {
    pub name: String,
    pub in_channels: usize,
    pub out_channels: usize,
}

impl ConvSpec {
    fn new(name: impl Into<String>, in_channels: usize, out_channels: usize) -> Self {
        Self {
            name: name.into(),
            in_channels,
            out_channels,
        }
    }

    /// State-dict key of the kernel tensor.
    #[must_use]
    pub fn weight_name(&self) -> String {
        format!("{}.weight", self.name)
    }

    /// State-dict key of the bias tensor.
    #[must_use]
    pub fn bias_name(&self) -> String {
        format!("{}.bias", self.name)
    }

    /// Kernel shape, `[out, in, 3, 3]`.
    #[must_use]
    pub fn weight_shape(&self) -> Vec<usize> {
        vec![self.out_channels, self.in_channels, 3, 3]
    }

    /// Bias shape, `[out]`.
    #[must_use]
    pub fn bias_shape(&self) -> Vec<usize> {
        vec![self.out_channels]
    }
}

/// A five-convolution dense block (`conv1`..`conv5`).
///
/// `conv{j}` for j in 1..=4 consumes the concatenation of the block input and
/// all previous activations (`num_feat + (j-1) * num_grow_ch` channels) and
/// produces `num_grow_ch`; `conv5` fuses everything back to `num_feat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBlock {
    pub convs: Vec<ConvSpec>,
}

impl DenseBlock {
    fn new(prefix: &str, num_feat: usize, num_grow_ch: usize) -> Self {
        let mut convs = Vec::with_capacity(5);
        for j in 1..=4 {
            convs.push(ConvSpec::new(
                format!("{prefix}.conv{j}"),
                num_feat + (j - 1) * num_grow_ch,
                num_grow_ch,
            ));
        }
        convs.push(ConvSpec::new(
            format!("{prefix}.conv5"),
            num_feat + 4 * num_grow_ch,
            num_feat,
        ));
        Self { convs }
    }
}

/// A residual-in-residual dense block: three dense blocks chained, with the
/// scaled result added back onto the block input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualBlock {
    pub dense: Vec<DenseBlock>,
}

impl ResidualBlock {
    fn new(prefix: &str, num_feat: usize, num_grow_ch: usize) -> Self {
        let dense = (1..=3)
            .map(|k| DenseBlock::new(&format!("{prefix}.rdb{k}"), num_feat, num_grow_ch))
            .collect();
        Self { dense }
    }
}

/// The full RRDBNet x4 topology description.
///
/// Field order matches the state-dict key order of the pretrained checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrdbNet {
    pub config: ArchConfig,
    pub conv_first: ConvSpec,
    pub body: Vec<ResidualBlock>,
    pub conv_body: ConvSpec,
    pub conv_up1: ConvSpec,
    pub conv_up2: ConvSpec,
    pub conv_hr: ConvSpec,
    pub conv_last: ConvSpec,
}

impl RrdbNet {
    #[must_use]
    pub fn new(config: &ArchConfig) -> Self {
        let feat = config.num_feat;
        let body = (0..config.num_block)
            .map(|i| ResidualBlock::new(&format!("body.{i}"), feat, config.num_grow_ch))
            .collect();

        Self {
            config: *config,
            conv_first: ConvSpec::new("conv_first", config.num_in_ch, feat),
            body,
            conv_body: ConvSpec::new("conv_body", feat, feat),
            conv_up1: ConvSpec::new("conv_up1", feat, feat),
            conv_up2: ConvSpec::new("conv_up2", feat, feat),
            conv_hr: ConvSpec::new("conv_hr", feat, feat),
            conv_last: ConvSpec::new("conv_last", feat, config.num_out_ch),
        }
    }

    /// All convolutions in definition order.
    #[must_use]
    pub fn convolutions(&self) -> Vec<&ConvSpec> {
        let mut convs = vec![&self.conv_first];
        for block in &self.body {
            for dense in &block.dense {
                convs.extend(dense.convs.iter());
            }
        }
        convs.push(&self.conv_body);
        convs.push(&self.conv_up1);
        convs.push(&self.conv_up2);
        convs.push(&self.conv_hr);
        convs.push(&self.conv_last);
        convs
    }

    /// The parameter manifest: every `.weight` and `.bias` key with its shape,
    /// in state-dict order.
    #[must_use]
    pub fn parameters(&self) -> Vec<ParamSpec> {
        let mut params = Vec::new();
        for conv in self.convolutions() {
            params.push(ParamSpec {
                name: conv.weight_name(),
                shape: conv.weight_shape(),
            });
            params.push(ParamSpec {
                name: conv.bias_name(),
                shape: conv.bias_shape(),
            });
        }
        params
    }

    /// Total scalar parameter count.
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.parameters()
            .iter()
            .map(|p| p.shape.iter().product::<usize>())
            .sum()
    }
}
