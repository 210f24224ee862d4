//! Fault models — how a value at a site is transformed.
//!
//! Each variant is one perturbation family.  Synaptic models mutate shared
//! weight memory in place and are therefore reverted after every forward
//! pass; neuronal models are transient overwrites of freshly produced
//! activations; the parametric model recomputes a stage's response under a
//! perturbed neuron parameter.

use std::fmt;

/// What kind of state a fault perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    /// A stage's neuronal output activation.
    Output,
    /// A per-connection synaptic weight.
    Weight,
    /// A named scalar parameter of the neuron model.  Parametric faults
    /// share the neuronal addressing space.
    Parameter,
}

impl fmt::Display for FaultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultTarget::Output => write!(f, "neuronal"),
            FaultTarget::Weight => write!(f, "synaptic"),
            FaultTarget::Parameter => write!(f, "parametric"),
        }
    }
}

/// A perturbation family plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultModel {
    // ── Neuronal models ─────────────────────────────────────────
    /// Output stuck at zero.
    DeadNeuron,
    /// Output stuck at a saturation value.
    SaturatedNeuron(f32),
    /// Additive drift on the output.
    DriftedNeuron(f32),
    /// Flip one bit of the output's f32 pattern.
    BitflippedOutput(u8),

    // ── Synaptic models ─────────────────────────────────────────
    /// Weight stuck at zero.
    DeadSynapse,
    /// Weight stuck at a saturation value.
    SaturatedSynapse(f32),
    /// Additive drift on the weight.
    DriftedSynapse(f32),
    /// Flip one bit of the weight's f32 pattern.
    BitflippedSynapse(u8),
    /// Multiplicative scaling of the weight.
    PerturbedSynapse(f32),

    // ── Parametric model ────────────────────────────────────────
    /// Recompute the stage output with `param` scaled to
    /// `scale * nominal`, then copy the recomputed values into the fault
    /// sites.
    ParametricNeuron {
        /// Neuron-model parameter name, e.g. `"theta"`.
        param: String,
        /// Multiplier on the nominal parameter value.
        scale: f32,
    },
}

impl FaultModel {
    /// The state this model perturbs.
    pub fn target(&self) -> FaultTarget {
        match self {
            FaultModel::DeadNeuron
            | FaultModel::SaturatedNeuron(_)
            | FaultModel::DriftedNeuron(_)
            | FaultModel::BitflippedOutput(_) => FaultTarget::Output,

            FaultModel::DeadSynapse
            | FaultModel::SaturatedSynapse(_)
            | FaultModel::DriftedSynapse(_)
            | FaultModel::BitflippedSynapse(_)
            | FaultModel::PerturbedSynapse(_) => FaultTarget::Weight,

            FaultModel::ParametricNeuron { .. } => FaultTarget::Parameter,
        }
    }

    /// Whether this model perturbs synaptic weights.
    pub fn is_synaptic(&self) -> bool {
        self.target() == FaultTarget::Weight
    }

    /// Whether this model perturbs neuronal outputs (parametric included —
    /// parametric faults address the same space).
    pub fn is_neuronal(&self) -> bool {
        matches!(self.target(), FaultTarget::Output | FaultTarget::Parameter)
    }

    /// Whether this model perturbs a neuron parameter.
    pub fn is_parametric(&self) -> bool {
        self.target() == FaultTarget::Parameter
    }

    /// The referenced parameter name, for parametric models.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            FaultModel::ParametricNeuron { param, .. } => Some(param),
            _ => None,
        }
    }

    /// Transform one value at a fault site.
    ///
    /// The parametric model is the identity here; its effect is delivered
    /// through the recomputed-output store instead.
    pub fn perturb(&self, value: f32) -> f32 {
        match self {
            FaultModel::DeadNeuron | FaultModel::DeadSynapse => 0.0,
            FaultModel::SaturatedNeuron(v) | FaultModel::SaturatedSynapse(v) => *v,
            FaultModel::DriftedNeuron(d) | FaultModel::DriftedSynapse(d) => value + d,
            FaultModel::BitflippedOutput(bit) | FaultModel::BitflippedSynapse(bit) => {
                f32::from_bits(value.to_bits() ^ (1u32 << (bit % 32)))
            }
            FaultModel::PerturbedSynapse(k) => value * k,
            FaultModel::ParametricNeuron { .. } => value,
        }
    }
}

impl fmt::Display for FaultModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultModel::DeadNeuron => write!(f, "dead-neuron"),
            FaultModel::SaturatedNeuron(v) => write!(f, "saturated-neuron({v})"),
            FaultModel::DriftedNeuron(d) => write!(f, "drifted-neuron({d:+})"),
            FaultModel::BitflippedOutput(b) => write!(f, "bitflipped-output(bit={b})"),
            FaultModel::DeadSynapse => write!(f, "dead-synapse"),
            FaultModel::SaturatedSynapse(v) => write!(f, "saturated-synapse({v})"),
            FaultModel::DriftedSynapse(d) => write!(f, "drifted-synapse({d:+})"),
            FaultModel::BitflippedSynapse(b) => write!(f, "bitflipped-synapse(bit={b})"),
            FaultModel::PerturbedSynapse(k) => write!(f, "perturbed-synapse(x{k})"),
            FaultModel::ParametricNeuron { param, scale } => {
                write!(f, "parametric-neuron({param}, x{scale})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_classification() {
        assert_eq!(FaultModel::DeadNeuron.target(), FaultTarget::Output);
        assert_eq!(FaultModel::DeadSynapse.target(), FaultTarget::Weight);
        assert_eq!(
            FaultModel::ParametricNeuron {
                param: "theta".into(),
                scale: 0.5
            }
            .target(),
            FaultTarget::Parameter
        );
    }

    #[test]
    fn parametric_is_neuronal_but_not_synaptic() {
        let m = FaultModel::ParametricNeuron {
            param: "tau".into(),
            scale: 2.0,
        };
        assert!(m.is_neuronal());
        assert!(m.is_parametric());
        assert!(!m.is_synaptic());
        assert_eq!(m.param_name(), Some("tau"));
    }

    #[test]
    fn stuck_value_perturbations() {
        assert_eq!(FaultModel::DeadNeuron.perturb(0.7), 0.0);
        assert_eq!(FaultModel::SaturatedSynapse(1.5).perturb(-3.0), 1.5);
        assert_eq!(FaultModel::DriftedSynapse(0.25).perturb(1.0), 1.25);
        assert_eq!(FaultModel::PerturbedSynapse(2.0).perturb(0.5), 1.0);
    }

    #[test]
    fn bitflip_is_involutive() {
        let m = FaultModel::BitflippedSynapse(31); // sign bit
        let v = 0.75f32;
        assert_eq!(m.perturb(v), -0.75);
        assert_eq!(m.perturb(m.perturb(v)), v);
    }

    #[test]
    fn display_format() {
        assert_eq!(FaultModel::DeadNeuron.to_string(), "dead-neuron");
        assert_eq!(
            FaultModel::BitflippedSynapse(7).to_string(),
            "bitflipped-synapse(bit=7)"
        );
        assert_eq!(
            FaultModel::ParametricNeuron {
                param: "theta".into(),
                scale: 0.5
            }
            .to_string(),
            "parametric-neuron(theta, x0.5)"
        );
        assert_eq!(FaultTarget::Weight.to_string(), "synaptic");
    }
}
