//! Layered spiking-network numeric backend for NeuroFI.
//!
//! This crate provides the tensor/model layer that the fault-injection
//! engine evaluates against:
//!
//! 1. **[`neuron`]** — the deterministic spiking response model with
//!    named scalar parameters (targeted by parametric faults)
//! 2. **[`layer`]** / **[`network`]** — ordered computation stages with
//!    pre/post hook registration, sub-range forward, and structural cloning
//! 3. **[`topology`]** — the layer topology registry inferred from one
//!    recorded reference pass
//! 4. **[`data`]** / **[`stats`]** — dataset batches, prediction and loss
//!    metrics, and the per-round performance accumulator
//!
//! # Architecture
//!
//! ```text
//! Campaign                 Network                  Hooks
//! ────────                 ───────                  ─────
//! forward_range(x, s, e) ─→ stage s..=e:      ┌──→ pre-hooks (input)
//!                            raw op ──────────┘ ┌→ post-hooks (raw out)
//!                            neuron response ───┘
//! ```
//!
//! Activations are `Array4<f32>` shaped `(batch, channels, height, width)`;
//! weights are `Array4<f32>` shaped `(out_ch, in_ch, height, width)`.

pub mod data;
pub mod error;
pub mod layer;
pub mod network;
pub mod neuron;
pub mod stats;
pub mod topology;

pub use data::{predict_classes, Batch, Dataset, LossFn, SpikeCountLoss};
pub use error::NetError;
pub use layer::{Layer, LayerKind};
pub use network::{Hook, HookHandle, HookKind, Network};
pub use neuron::NeuronModel;
pub use stats::RoundStats;
pub use topology::LayerTopology;

/// Activation / weight tensor type used throughout NeuroFI.
pub type Tensor = ndarray::Array4<f32>;
