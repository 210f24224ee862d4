//! Fault entity model for NeuroFI.
//!
//! This crate provides the pure-data side of the fault-injection engine:
//!
//! 1. **[`site`]** — [`FaultSite`]: a (layer, 4-axis coordinate) address
//!    with wildcard and negative-index semantics
//! 2. **[`model`]** — [`FaultModel`]: the perturbation families (stuck
//!    values, bit corruption, drift, parametric) and their targets
//! 3. **[`fault`]** — [`Fault`]: one model paired with a unique site set
//! 4. **[`round`]** — [`FaultRound`]: one simultaneous-fault scenario, and
//!    its derived [`OptimizedFaultRound`] view (earliest/latest affected
//!    layer, output-affecting flag)
//! 5. **[`define`]** — seeded random completion of partial faults and
//!    validation against a layer topology
//!
//! No evaluation happens here; the campaign crate consumes these types.

pub mod define;
pub mod fault;
pub mod model;
pub mod round;
pub mod site;

pub use define::{define_random, validate};
pub use fault::Fault;
pub use model::{FaultModel, FaultTarget};
pub use round::{FaultRound, OptimizedFaultRound};
pub use site::{Coord, FaultSite};
