// SPDX-License-Identifier: MPL-2.0
//! The in-memory model: topology description plus a mutable parameter set.
//!
//! A [`Model`] starts with placeholder parameter values; binding a checkpoint
//! replaces them all at once. Binding is strict: every manifest entry must be
//! present with the exact shape and no extra keys may remain, so a mismatched
//! checkpoint aborts before anything is exported. After binding,
//! [`Model::eval`] switches the model to inference mode.

pub mod arch;
pub mod weights;

pub use arch::{ArchConfig, ConvSpec, ParamSpec, RrdbNet};
pub use weights::{StateDict, WeightsError, WeightsResult};

use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn};

/// A fixed-topology model with a mutable parameter set and a training flag.
#[derive(Debug, Clone)]
pub struct Model {
    arch: RrdbNet,
    parameters: BTreeMap<String, ArrayD<f32>>,
    training: bool,
    bound: bool,
}

impl Model {
    /// Instantiates the architecture with placeholder (zero) parameters.
    ///
    /// The model starts in training mode, mirroring a freshly constructed
    /// network; the pipeline switches it to inference mode once a checkpoint
    /// is bound.
    #[must_use]
    pub fn new(config: &ArchConfig) -> Self {
        let arch = RrdbNet::new(config);
        let parameters = arch
            .parameters()
            .into_iter()
            .map(|p| (p.name, ArrayD::zeros(IxDyn(&p.shape))))
            .collect();

        Self {
            arch,
            parameters,
            training: true,
            bound: false,
        }
    }

    #[must_use]
    pub fn arch(&self) -> &RrdbNet {
        &self.arch
    }

    /// Binds a checkpoint into the model, replacing every parameter.
    ///
    /// Verification runs over the whole manifest before any value is
    /// assigned, so a failed load leaves the model untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if any manifest parameter is missing from the state
    /// dict, any state-dict key is not in the manifest, or shapes disagree.
    pub fn load_state_dict(&mut self, state_dict: &StateDict) -> WeightsResult<()> {
        let manifest = self.arch.parameters();

        for spec in &manifest {
            let tensor = state_dict
                .get(&spec.name)
                .ok_or_else(|| WeightsError::MissingParameter(spec.name.clone()))?;
            if tensor.shape() != spec.shape.as_slice() {
                return Err(WeightsError::ShapeMismatch {
                    name: spec.name.clone(),
                    expected: spec.shape.clone(),
                    actual: tensor.shape().to_vec(),
                });
            }
        }

        for name in state_dict.names() {
            if !self.parameters.contains_key(name) {
                return Err(WeightsError::UnexpectedParameter(name.to_string()));
            }
        }

        for spec in &manifest {
            // Presence was verified above.
            if let Some(tensor) = state_dict.get(&spec.name) {
                self.parameters.insert(spec.name.clone(), tensor.clone());
            }
        }
        self.bound = true;
        Ok(())
    }

    /// Switches the model to inference mode, disabling training-only
    /// behavior so output is a deterministic function of input.
    pub fn eval(&mut self) {
        self.training = false;
    }

    #[must_use]
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Whether a checkpoint has been bound.
    #[must_use]
    pub fn has_weights(&self) -> bool {
        self.bound
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.parameters.get(name)
    }

    /// Total scalar parameter count.
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.arch.scalar_count()
    }
}
