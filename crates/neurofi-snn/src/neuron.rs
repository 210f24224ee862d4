//! The spiking neuron response model.
//!
//! Every injectable stage applies the same deterministic response to its
//! raw (synaptic) output: a scaled postsynaptic potential thresholded into
//! a binary spike.  The model's scalar parameters are addressable by name
//! so that parametric faults can perturb them without touching tensor data.

use crate::error::NetError;
use crate::Tensor;
use serde::{Deserialize, Serialize};

/// Parameter names supported by [`NeuronModel`].
pub const PARAM_NAMES: &[&str] = &["theta", "tau", "gain"];

/// Deterministic spiking response with named scalar parameters.
///
/// The response is `spike(x) = 1.0 if x * gain / tau >= theta else 0.0`,
/// applied element-wise.  Binary outputs make exact reconvergence with the
/// golden computation common, which is what the evaluation engine's early
/// stop exploits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronModel {
    /// Firing threshold.
    pub theta: f32,
    /// Membrane time constant; scales the postsynaptic potential down.
    pub tau: f32,
    /// Synaptic gain; scales the postsynaptic potential up.
    pub gain: f32,
}

impl Default for NeuronModel {
    fn default() -> Self {
        Self {
            theta: 1.0,
            tau: 2.0,
            gain: 2.0,
        }
    }
}

impl NeuronModel {
    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<f32> {
        match name {
            "theta" => Some(self.theta),
            "tau" => Some(self.tau),
            "gain" => Some(self.gain),
            _ => None,
        }
    }

    /// Set a parameter by name.
    pub fn set_param(&mut self, name: &str, value: f32) -> Result<(), NetError> {
        match name {
            "theta" => self.theta = value,
            "tau" => self.tau = value,
            "gain" => self.gain = value,
            _ => return Err(NetError::UnknownParam(name.to_string())),
        }
        Ok(())
    }

    /// Whether a parameter name is addressable on this model.
    pub fn supports(&self, name: &str) -> bool {
        PARAM_NAMES.contains(&name)
    }

    /// The postsynaptic potential of a raw synaptic value.
    pub fn psp(&self, x: f32) -> f32 {
        x * self.gain / self.tau
    }

    /// Element-wise spike response over a raw stage output.
    pub fn respond(&self, raw: &Tensor) -> Tensor {
        raw.mapv(|x| if self.psp(x) >= self.theta { 1.0 } else { 0.0 })
    }
}
