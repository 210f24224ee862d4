//! Fault-injection campaign orchestration for layered spiking networks.
//!
//! This crate drives reliability experiments end to end: it derives the
//! optimized evaluation plan from a set of fault rounds, installs
//! injection hooks on a faulty clone of the golden network, evaluates
//! every round against a dataset with golden-prefix reuse and early stop,
//! and reports per-round accuracy and loss.
//!
//! The fault entities themselves live in `neurofi-fault`; the network
//! backend in `neurofi-snn`.

pub mod campaign;
pub mod progress;
pub mod summary;

pub use campaign::{Campaign, CampaignConfig, CampaignError};
pub use progress::{spawn_reporter, CampaignProgress, ProgressReporter};
pub use summary::{CampaignSummary, RoundSummary};
