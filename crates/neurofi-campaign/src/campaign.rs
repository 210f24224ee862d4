//! The fault-injection campaign — the central orchestrator.
//!
//! A [`Campaign`] owns a read-only golden network and, for the duration of
//! one `run`, a structurally cloned faulty network.  Faults are grouped
//! into rounds (simultaneous-fault scenarios); each `run` derives the
//! optimized view of every round, groups rounds by their earliest affected
//! layer, installs injection hooks on the faulty clone, and evaluates every
//! round against every dataset batch.
//!
//! The multi-round path computes the golden activations once per batch and
//! seeds each round's faulty computation from the cached activation at its
//! earliest affected layer, so rounds sharing a prefix never recompute it.
//! A round whose faulty suffix reconverges exactly with the golden
//! activations stops early and reuses the golden final output.

use crate::progress::{spawn_reporter, CampaignProgress};
use log::{debug, info};
use neurofi_fault::{define_random, validate, Coord, Fault, FaultModel, FaultRound, FaultSite, OptimizedFaultRound};
use neurofi_snn::{
    predict_classes, Dataset, Hook, LayerTopology, LossFn, NetError, Network, RoundStats, Tensor,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from campaign orchestration.
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Round index {index} out of range for {len} rounds")]
    RoundIndex { index: isize, len: usize },

    #[error("Network error: {0}")]
    Net(#[from] NetError),
}

/// Configuration for a campaign.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Campaign name, carried into summaries and logs.
    pub name: String,
    /// Seed for random fault definition.
    pub seed: u64,
    /// Progress reporting interval in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            name: "campaign".to_string(),
            seed: 42,
            progress_interval_ms: 100,
        }
    }
}

/// A synaptic weight original retained for restoration.
#[derive(Debug, Clone, Copy)]
struct RestoreEntry {
    stage: usize,
    index: [usize; 4],
    value: f32,
}

/// State shared between the campaign's evaluation loop and the hook
/// closures installed on the faulty network.
#[derive(Default)]
struct InjectionState {
    /// Index of the round currently being evaluated.
    r_idx: usize,
    /// Optimized rounds, as derived by the last `pre_run`.
    orounds: Vec<OptimizedFaultRound>,
    /// Recomputed activations for parametric faults, keyed by
    /// (stage, element index).
    param_values: HashMap<(usize, [usize; 4]), f32>,
    /// Perturbed synaptic originals awaiting restoration.
    restore_log: Vec<RestoreEntry>,
}

/// Hook handles installed per layer, one slot per target and side.
/// Slots make installation idempotent across rounds.
#[derive(Debug, Default)]
struct HookSlots {
    neuronal_pre: Option<neurofi_snn::HookHandle>,
    parametric_post: Option<neurofi_snn::HookHandle>,
    synaptic_pre: Option<neurofi_snn::HookHandle>,
    synaptic_post: Option<neurofi_snn::HookHandle>,
}

/// The fault-injection campaign orchestrator.
pub struct Campaign {
    config: CampaignConfig,
    golden: Network,
    topology: LayerTopology,
    rounds: Vec<FaultRound>,
    orounds: Vec<OptimizedFaultRound>,
    /// Round indices grouped by earliest affected layer index
    /// (-1 = golden rounds), in ascending topological order.
    rgroups: BTreeMap<i64, Vec<usize>>,
    handles: HashMap<String, HookSlots>,
    performance: Vec<RoundStats>,
    duration: Option<Duration>,
    rng: ChaCha8Rng,
    state: Rc<RefCell<InjectionState>>,
}

impl Campaign {
    /// Create a campaign around a golden network.
    ///
    /// Runs one reference pass over `shape_in`-shaped input to infer the
    /// layer topology registry.  The campaign starts with a single empty
    /// round (the golden baseline).
    pub fn new(
        mut network: Network,
        shape_in: (usize, usize, usize),
        config: CampaignConfig,
    ) -> Result<Self, CampaignError> {
        let topology = LayerTopology::infer(&mut network, shape_in)?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            golden: network,
            topology,
            rounds: vec![FaultRound::new()],
            orounds: Vec::new(),
            rgroups: BTreeMap::new(),
            handles: HashMap::new(),
            performance: Vec::new(),
            duration: None,
            rng,
            state: Rc::new(RefCell::new(InjectionState::default())),
        })
    }

    /// The campaign name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The layer topology registry.
    pub fn topology(&self) -> &LayerTopology {
        &self.topology
    }

    /// The golden network.
    pub fn golden(&self) -> &Network {
        &self.golden
    }

    /// The fault rounds.
    pub fn rounds(&self) -> &[FaultRound] {
        &self.rounds
    }

    /// Optimized round views derived by the last `run`.
    pub fn optimized_rounds(&self) -> &[OptimizedFaultRound] {
        &self.orounds
    }

    /// Per-round statistics accumulated by the last `run`.
    pub fn stats(&self) -> &[RoundStats] {
        &self.performance
    }

    /// Wall-clock duration of the last `run`.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Serializable snapshot of the campaign's rounds and results.
    pub fn summary(&self) -> crate::summary::CampaignSummary {
        crate::summary::CampaignSummary::of(self)
    }

    // ── Round management ────────────────────────────────────────

    /// Randomize, validate, and insert faults into the round at
    /// `round_idx` (negative indices count from the end).  Returns the
    /// faults actually inserted, which may be fewer than requested.
    pub fn inject(
        &mut self,
        faults: Vec<Fault>,
        round_idx: isize,
    ) -> Result<Vec<Fault>, CampaignError> {
        let r = self.resolve_round_idx(round_idx)?;

        let mut faults = faults;
        define_random(&mut faults, &self.topology, &mut self.rng);
        let valid = validate(faults, &self.topology, self.golden.neuron());

        self.rounds[r].insert_many(valid.iter().cloned());
        Ok(valid)
    }

    /// Append a new empty round and inject into it.
    pub fn then_inject(&mut self, faults: Vec<Fault>) -> Result<Vec<Fault>, CampaignError> {
        self.rounds.push(FaultRound::new());
        self.inject(faults, -1)
    }

    /// Remove faults and/or rounds.
    ///
    /// With `round_idx`, ejects from that round only (round 0 is a valid
    /// target); the round itself is removed when no faults are given or
    /// when it ends up empty.  Without `round_idx`, ejects the given
    /// faults from every round (dropping emptied rounds), or clears all
    /// rounds when no faults are given.  A campaign always keeps at least
    /// one (possibly empty) round.
    pub fn eject(
        &mut self,
        faults: Option<&[Fault]>,
        round_idx: Option<isize>,
    ) -> Result<(), CampaignError> {
        match round_idx {
            Some(idx) => {
                let r = self.resolve_round_idx(idx)?;
                match faults {
                    Some(faults) => {
                        self.rounds[r].extract_many(faults);
                        if self.rounds[r].is_empty() {
                            self.rounds.remove(r);
                        }
                    }
                    None => {
                        self.rounds.remove(r);
                    }
                }
            }
            None => match faults {
                Some(faults) => {
                    for round in &mut self.rounds {
                        round.extract_many(faults);
                    }
                    self.rounds.retain(|r| !r.is_empty());
                }
                None => self.rounds.clear(),
            },
        }

        if self.rounds.is_empty() {
            self.rounds.push(FaultRound::new());
        }
        Ok(())
    }

    fn resolve_round_idx(&self, idx: isize) -> Result<usize, CampaignError> {
        let len = self.rounds.len() as isize;
        if idx >= -len && idx < len {
            Ok(((idx + len) % len) as usize)
        } else {
            Err(CampaignError::RoundIndex {
                index: idx,
                len: self.rounds.len(),
            })
        }
    }

    // ── Evaluation ──────────────────────────────────────────────

    /// Evaluate every round against the dataset, accumulating per-round
    /// accuracy and loss statistics.
    pub fn run(
        &mut self,
        dataset: &Dataset,
        loss: Option<&dyn LossFn>,
    ) -> Result<(), CampaignError> {
        let started = Instant::now();
        let mut faulty = self.pre_run()?;
        info!(
            "Campaign '{}': evaluating {} rounds over {} batches",
            self.config.name,
            self.rounds.len(),
            dataset.len()
        );

        let progress = Arc::new(Mutex::new(CampaignProgress::new(
            dataset.len(),
            self.rounds.len(),
        )));
        let reporter = spawn_reporter(
            Arc::clone(&progress),
            Duration::from_millis(self.config.progress_interval_ms),
        );

        let result = if self.rounds.len() <= 1 {
            self.evaluate_single(&mut faulty, dataset, loss, &progress)
        } else {
            self.evaluate_optimized(&mut faulty, dataset, loss, &progress)
        };
        reporter.finish();

        for stats in &mut self.performance {
            stats.update();
        }
        self.duration = Some(started.elapsed());
        info!(
            "Campaign '{}' finished in {:.2}s",
            self.config.name,
            started.elapsed().as_secs_f64()
        );
        result
    }

    /// Exhaustive single-site sensitivity sweep: one round per addressable
    /// coordinate of the given layers (all injectable layers when `None`),
    /// each round holding one singleton fault with the same model.
    pub fn run_complete(
        &mut self,
        dataset: &Dataset,
        fault_model: FaultModel,
        layer_names: Option<&[&str]>,
        loss: Option<&dyn LossFn>,
    ) -> Result<(), CampaignError> {
        let layers: Vec<String> = match layer_names {
            Some(names) => names
                .iter()
                .filter(|n| self.topology.is_injectable(n))
                .map(|n| n.to_string())
                .collect(),
            None => self
                .topology
                .injectables()
                .iter()
                .map(|n| n.to_string())
                .collect(),
        };

        let is_syn = fault_model.is_synaptic();
        self.rounds.clear();

        for name in &layers {
            let shape = self.topology.shape(is_syn, name)?.to_vec();
            if is_syn {
                for k in 0..shape[0] {
                    for i in 0..shape[1] {
                        for m in 0..shape[2] {
                            for n in 0..shape[3] {
                                self.then_inject(vec![Fault::single(
                                    fault_model.clone(),
                                    FaultSite::new(
                                        name.clone(),
                                        [
                                            Coord::Idx(k as isize),
                                            Coord::Idx(i as isize),
                                            Coord::Idx(m as isize),
                                            Coord::Idx(n as isize),
                                        ],
                                    ),
                                )])?;
                            }
                        }
                    }
                }
            } else {
                for c in 0..shape[0] {
                    for y in 0..shape[1] {
                        for x in 0..shape[2] {
                            self.then_inject(vec![Fault::single(
                                fault_model.clone(),
                                FaultSite::new(
                                    name.clone(),
                                    [
                                        Coord::All,
                                        Coord::Idx(c as isize),
                                        Coord::Idx(y as isize),
                                        Coord::Idx(x as isize),
                                    ],
                                ),
                            )])?;
                        }
                    }
                }
            }
        }

        self.run(dataset, loss)
    }

    /// Recompute everything a `run` depends on: a fresh faulty clone,
    /// optimized rounds, the round grouping, hook installation, and
    /// zeroed statistics.  Idempotent re-derivation; the previous run's
    /// hooks die with its faulty network.
    fn pre_run(&mut self) -> Result<Network, CampaignError> {
        if self.rounds.is_empty() {
            self.rounds.push(FaultRound::new());
        }

        self.orounds.clear();
        self.rgroups.clear();
        self.handles.clear();
        self.performance.clear();
        {
            let mut st = self.state.borrow_mut();
            st.r_idx = 0;
            st.orounds.clear();
            st.param_values.clear();
            st.restore_log.clear();
        }

        let mut faulty = self.golden.clone_structure();

        for (r, round) in self.rounds.iter().enumerate() {
            let oround = round.optimized(&self.topology)?;
            let key = oround.early_idx().map_or(-1, |i| i as i64);
            self.rgroups.entry(key).or_default().push(r);
            self.performance.push(RoundStats::default());
            self.orounds.push(oround);
        }
        self.state.borrow_mut().orounds = self.orounds.clone();
        debug!(
            "Derived {} optimized rounds in {} prefix groups",
            self.orounds.len(),
            self.rgroups.len()
        );

        self.install_hooks(&mut faulty)?;
        Ok(faulty)
    }

    /// Install at most one hook per (layer, target, side) on the faulty
    /// network, covering every round's faults.
    fn install_hooks(&mut self, faulty: &mut Network) -> Result<(), CampaignError> {
        for name in self.topology.injectables() {
            let name = name.to_string();
            let stage = self.topology.position(&name)?;
            let any_neu = self.orounds.iter().any(|o| o.any_neuronal(&name));
            let any_par = self.orounds.iter().any(|o| o.any_parametric(&name));
            let any_syn = self.orounds.iter().any(|o| o.any_synaptic(&name));
            let slots = self.handles.entry(name.clone()).or_default();

            // Neuronal faults perturb the layer's just-produced output, so
            // the hook lives on the *following* stage's input.  The output
            // stage has no following stage; its faults are applied to the
            // finished output by the evaluation loop.
            if any_neu && !self.topology.is_output(&name) && slots.neuronal_pre.is_none() {
                if let Some(next) = self.topology.following(&name)? {
                    let next_stage = self.topology.position(next)?;
                    let hook = neuron_hook(Rc::clone(&self.state), name.clone(), stage);
                    slots.neuronal_pre = Some(faulty.register_pre_hook(next_stage, hook)?);
                }
            }

            if any_par && slots.parametric_post.is_none() {
                let hook = parametric_hook(
                    Rc::clone(&self.state),
                    name.clone(),
                    stage,
                    self.golden.neuron().clone(),
                );
                slots.parametric_post = Some(faulty.register_post_hook(stage, hook)?);
            }

            if any_syn && slots.synaptic_pre.is_none() {
                let pre = synaptic_pre_hook(Rc::clone(&self.state), name.clone(), stage);
                slots.synaptic_pre = Some(faulty.register_pre_hook(stage, pre)?);
                let post = synaptic_post_hook(Rc::clone(&self.state), stage);
                slots.synaptic_post = Some(faulty.register_post_hook(stage, post)?);
            }
        }
        Ok(())
    }

    /// Single-round fast path: the faulty network runs end-to-end per
    /// batch with hooks active throughout.
    fn evaluate_single(
        &mut self,
        faulty: &mut Network,
        dataset: &Dataset,
        loss: Option<&dyn LossFn>,
        progress: &Arc<Mutex<CampaignProgress>>,
    ) -> Result<(), CampaignError> {
        self.set_round(0);
        let is_out_faulty = self
            .orounds
            .first()
            .map(OptimizedFaultRound::is_out_faulty)
            .unwrap_or(false);
        let end = self.topology.len() - 1;

        for (b, batch) in dataset.batches().enumerate() {
            let mut output = self.forward_faulty(faulty, &batch.input, 0, end)?;
            if is_out_faulty {
                self.apply_output_faults(&mut output);
            }
            self.record(0, &output, batch, loss);

            if let Ok(mut p) = progress.lock() {
                p.step();
                p.set_batch(b);
            }
        }
        Ok(())
    }

    /// Multi-round optimized path: cache golden activations per batch,
    /// then evaluate each round's faulty sub-range seeded from the cached
    /// activation at its earliest affected layer, with early stop on exact
    /// reconvergence.
    fn evaluate_optimized(
        &mut self,
        faulty: &mut Network,
        dataset: &Dataset,
        loss: Option<&dyn LossFn>,
        progress: &Arc<Mutex<CampaignProgress>>,
    ) -> Result<(), CampaignError> {
        let len = self.topology.len();
        let groups: Vec<Vec<usize>> = self.rgroups.values().cloned().collect();

        for (b, batch) in dataset.batches().enumerate() {
            // golden_spikes[0] is the input; golden_spikes[i] the output of
            // stage i-1.  Computed once per batch, shared by every round.
            let mut golden_spikes: Vec<Tensor> = Vec::with_capacity(len + 1);
            golden_spikes.push(batch.input.clone());
            for l in 0..len {
                let next = self.golden.forward_range(&golden_spikes[l], l, l)?;
                golden_spikes.push(next);
            }

            for group in &groups {
                for &r in group {
                    self.set_round(r);
                    let (early, late, is_out_faulty) = {
                        let o = &self.orounds[r];
                        (o.early_idx(), o.late_idx(), o.is_out_faulty())
                    };

                    let output = match (early, late) {
                        (Some(early), Some(late)) => {
                            let late_out =
                                self.forward_faulty(faulty, &golden_spikes[early], early, late)?;
                            if is_out_faulty {
                                let mut out = late_out;
                                self.apply_output_faults(&mut out);
                                out
                            } else if late + 1 >= len {
                                // Synaptic fault on the output stage:
                                // nothing follows to compare against.
                                late_out
                            } else {
                                let next =
                                    self.forward_faulty(faulty, &late_out, late + 1, late + 1)?;
                                if next == golden_spikes[late + 2] {
                                    // Reconverged: divergence cannot
                                    // reappear in a deterministic suffix.
                                    golden_spikes[len].clone()
                                } else if late + 2 >= len {
                                    next
                                } else {
                                    self.forward_faulty(faulty, &next, late + 2, len - 1)?
                                }
                            }
                        }
                        // Golden round: the cached final output, no faulty
                        // computation at all.
                        _ => golden_spikes[len].clone(),
                    };

                    self.record(r, &output, batch, loss);
                    if let Ok(mut p) = progress.lock() {
                        p.step();
                    }
                }
            }

            if let Ok(mut p) = progress.lock() {
                p.set_batch(b);
            }
        }
        Ok(())
    }

    fn set_round(&self, r: usize) {
        let mut st = self.state.borrow_mut();
        st.r_idx = r;
        st.param_values.clear();
    }

    /// Run the faulty network over a stage sub-range, then drain any
    /// synaptic originals the post-hooks did not restore.  The drain also
    /// covers the error path: an interrupted pass must not leave corrupted
    /// weights for subsequent rounds.
    fn forward_faulty(
        &self,
        faulty: &mut Network,
        input: &Tensor,
        start: usize,
        end: usize,
    ) -> Result<Tensor, CampaignError> {
        let result = faulty.forward_range(input, start, end);
        self.drain_restore(faulty)?;
        Ok(result?)
    }

    fn drain_restore(&self, faulty: &mut Network) -> Result<(), CampaignError> {
        let entries: Vec<RestoreEntry> = self.state.borrow_mut().restore_log.drain(..).collect();
        for entry in entries.into_iter().rev() {
            faulty.layer_mut(entry.stage)?.weight[entry.index] = entry.value;
        }
        Ok(())
    }

    /// Apply the current round's neuronal faults on the output stage
    /// directly to the finished output tensor.
    fn apply_output_faults(&self, output: &mut Tensor) {
        if let Some(name) = self.topology.output_name() {
            let stage = self.topology.len() - 1;
            let st = self.state.borrow();
            apply_neuronal(&st, name, stage, output);
        }
    }

    fn record(&mut self, r: usize, output: &Tensor, batch: &neurofi_snn::Batch, loss: Option<&dyn LossFn>) {
        let predicted = predict_classes(output);
        let correct = predicted
            .iter()
            .zip(&batch.labels)
            .filter(|(p, l)| p == l)
            .count() as u64;
        let loss_value = loss.map(|l| l.loss(output, &batch.target));
        self.performance[r].record(correct, batch.labels.len() as u64, loss_value);
    }
}

impl std::fmt::Display for Campaign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "FI campaign '{}': {} stages, {} rounds",
            self.config.name,
            self.topology.len(),
            self.rounds.len()
        )?;
        for (i, round) in self.rounds.iter().enumerate() {
            write!(f, "  #{i}: {round}")?;
        }
        Ok(())
    }
}

// ── Hook closures ───────────────────────────────────────────────

/// Overwrite the addressed coordinates of `tensor` with the current
/// round's neuronal perturbations for `layer_name`.  Parametric faults
/// read their recomputed values from the shared store.
fn apply_neuronal(st: &InjectionState, layer_name: &str, stage: usize, tensor: &mut Tensor) {
    let Some(oround) = st.orounds.get(st.r_idx) else {
        return;
    };
    for fault in oround.search_neuronal(layer_name) {
        for site in fault.sites().iter().filter(|s| s.layer == layer_name) {
            for idx in site.resolve_output(tensor.dim()) {
                let value = tensor[idx];
                tensor[idx] = if fault.model().is_parametric() {
                    st.param_values.get(&(stage, idx)).copied().unwrap_or(value)
                } else {
                    fault.model().perturb(value)
                };
            }
        }
    }
}

/// Pre-hook for the stage *after* `layer_name`: perturbs that layer's
/// just-produced output in place.
fn neuron_hook(state: Rc<RefCell<InjectionState>>, layer_name: String, stage: usize) -> Hook {
    Box::new(move |_layer, spikes| {
        let st = state.borrow();
        apply_neuronal(&st, &layer_name, stage, spikes);
    })
}

/// Post-hook on the targeted stage: recomputes the raw output under the
/// perturbed neuron parameter and stores the values for the addressed
/// sites, to be copied in by the following stage's pre-hook (or by the
/// output-fault application).
fn parametric_hook(
    state: Rc<RefCell<InjectionState>>,
    layer_name: String,
    stage: usize,
    neuron: neurofi_snn::NeuronModel,
) -> Hook {
    Box::new(move |_layer, raw| {
        let mut st = state.borrow_mut();
        let st = &mut *st;
        let Some(oround) = st.orounds.get(st.r_idx) else {
            return;
        };

        for fault in oround.search_parametric(&layer_name) {
            let FaultModel::ParametricNeuron { param, scale } = fault.model() else {
                continue;
            };
            let mut perturbed = neuron.clone();
            let Some(nominal) = perturbed.param(param) else {
                continue;
            };
            if perturbed.set_param(param, nominal * scale).is_err() {
                continue;
            }
            let recomputed = perturbed.respond(raw);

            for site in fault.sites().iter().filter(|s| s.layer == layer_name) {
                for idx in site.resolve_output(raw.dim()) {
                    st.param_values.insert((stage, idx), recomputed[idx]);
                }
            }
        }
    })
}

/// Pre-hook on the targeted stage: perturbs weights in place, retaining
/// originals in the restore log.
fn synaptic_pre_hook(state: Rc<RefCell<InjectionState>>, layer_name: String, stage: usize) -> Hook {
    Box::new(move |layer, _input| {
        let mut st = state.borrow_mut();
        let st = &mut *st;
        let Some(oround) = st.orounds.get(st.r_idx) else {
            return;
        };

        let weight_shape = layer.weight_shape();
        for fault in oround.search_synaptic(&layer_name) {
            for site in fault.sites().iter().filter(|s| s.layer == layer_name) {
                for idx in site.resolve_weight(&weight_shape) {
                    let original = layer.weight[idx];
                    st.restore_log.push(RestoreEntry {
                        stage,
                        index: idx,
                        value: original,
                    });
                    layer.weight[idx] = fault.model().perturb(original);
                }
            }
        }
    })
}

/// Post-hook on the targeted stage: restores this stage's weight
/// originals in reverse perturbation order, returning the shared weight
/// memory to its pre-fault state before anything else reuses it.
fn synaptic_post_hook(state: Rc<RefCell<InjectionState>>, stage: usize) -> Hook {
    Box::new(move |layer, _raw| {
        let mut st = state.borrow_mut();
        let mut mine = Vec::new();
        st.restore_log.retain(|e| {
            if e.stage == stage {
                mine.push(*e);
                false
            } else {
                true
            }
        });
        for entry in mine.into_iter().rev() {
            layer.weight[entry.index] = entry.value;
        }
    })
}
