//! Fault rounds — simultaneous-fault scenarios — and their optimized views.
//!
//! A [`FaultRound`] is an unordered collection of faults evaluated together
//! as one what-if experiment.  Before evaluation the campaign derives an
//! [`OptimizedFaultRound`]: a read-only view that knows the earliest and
//! latest layers the round touches, which bounds the sub-range of faulty
//! recomputation, and whether the output stage itself is targeted.

use crate::fault::Fault;
use crate::model::FaultTarget;
use neurofi_snn::{LayerTopology, NetError};
use std::collections::BTreeSet;
use std::fmt;

/// One simultaneous-fault scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultRound {
    faults: Vec<Fault>,
}

impl FaultRound {
    /// An empty round — equivalent to the golden baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one fault.
    pub fn insert(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    /// Insert several faults.
    pub fn insert_many(&mut self, faults: impl IntoIterator<Item = Fault>) {
        self.faults.extend(faults);
    }

    /// Remove every fault equal to the given one; returns whether any was
    /// removed.
    pub fn extract(&mut self, fault: &Fault) -> bool {
        let before = self.faults.len();
        self.faults.retain(|f| f != fault);
        self.faults.len() != before
    }

    /// Remove every fault equal to any of the given ones.
    pub fn extract_many<'a>(&mut self, faults: impl IntoIterator<Item = &'a Fault>) {
        for fault in faults {
            self.extract(fault);
        }
    }

    /// The faults in insertion order.
    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    /// Whether the round holds no faults.
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Number of faults.
    pub fn len(&self) -> usize {
        self.faults.len()
    }

    /// Names of all layers addressed by the round's defined sites.
    pub fn layer_names(&self) -> BTreeSet<String> {
        self.faults
            .iter()
            .flat_map(|f| f.sites().iter().map(|s| s.layer.clone()))
            .collect()
    }

    /// Derive the optimized, read-only view of this round.
    pub fn optimized(&self, topology: &LayerTopology) -> Result<OptimizedFaultRound, NetError> {
        let mut early: Option<usize> = None;
        let mut late: Option<usize> = None;
        for fault in &self.faults {
            for site in fault.sites() {
                let idx = topology.position(&site.layer)?;
                early = Some(early.map_or(idx, |e| e.min(idx)));
                late = Some(late.map_or(idx, |l| l.max(idx)));
            }
        }

        let early_name = early.map(|i| topology.layers()[i].name.clone());
        let is_out_faulty = match topology.output_name() {
            Some(out) => self
                .faults
                .iter()
                .any(|f| f.model().is_neuronal() && f.sites().iter().any(|s| s.layer == out)),
            None => false,
        };

        Ok(OptimizedFaultRound {
            faults: self.faults.clone(),
            early_idx: early,
            early_name,
            late_idx: late,
            is_out_faulty,
        })
    }
}

impl fmt::Display for FaultRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "round ({} faults):", self.faults.len())?;
        for fault in &self.faults {
            writeln!(f, "  {fault}")?;
        }
        Ok(())
    }
}

/// Read-only, topology-aware view of one round.
#[derive(Debug, Clone)]
pub struct OptimizedFaultRound {
    faults: Vec<Fault>,
    early_idx: Option<usize>,
    early_name: Option<String>,
    late_idx: Option<usize>,
    is_out_faulty: bool,
}

impl OptimizedFaultRound {
    /// Index of the earliest layer touched by any site; `None` for the
    /// golden (empty) round.
    pub fn early_idx(&self) -> Option<usize> {
        self.early_idx
    }

    /// Name of the earliest touched layer.
    pub fn early_name(&self) -> Option<&str> {
        self.early_name.as_deref()
    }

    /// Index of the latest touched layer.
    pub fn late_idx(&self) -> Option<usize> {
        self.late_idx
    }

    /// Whether the output stage itself carries a neuronal/parametric fault.
    pub fn is_out_faulty(&self) -> bool {
        self.is_out_faulty
    }

    /// Whether the round has no faults and behaves as the golden baseline.
    pub fn is_golden(&self) -> bool {
        self.early_idx.is_none()
    }

    /// The faults in this round.
    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    fn search(
        &self,
        layer: &str,
        matches: impl Fn(&Fault) -> bool + 'static,
    ) -> impl Iterator<Item = &Fault> {
        let layer = layer.to_string();
        self.faults
            .iter()
            .filter(move |f| matches(f) && f.sites().iter().any(|s| s.layer == layer))
    }

    /// Faults perturbing the given layer's neuronal output (parametric
    /// included).
    pub fn search_neuronal(&self, layer: &str) -> impl Iterator<Item = &Fault> {
        self.search(layer, |f| f.model().is_neuronal())
    }

    /// Faults perturbing the given layer's synaptic weights.
    pub fn search_synaptic(&self, layer: &str) -> impl Iterator<Item = &Fault> {
        self.search(layer, |f| f.model().is_synaptic())
    }

    /// Parametric faults on the given layer.
    pub fn search_parametric(&self, layer: &str) -> impl Iterator<Item = &Fault> {
        self.search(layer, |f| f.model().target() == FaultTarget::Parameter)
    }

    /// Whether any neuronal/parametric fault addresses the layer.
    pub fn any_neuronal(&self, layer: &str) -> bool {
        self.search_neuronal(layer).next().is_some()
    }

    /// Whether any synaptic fault addresses the layer.
    pub fn any_synaptic(&self, layer: &str) -> bool {
        self.search_synaptic(layer).next().is_some()
    }

    /// Whether any parametric fault addresses the layer.
    pub fn any_parametric(&self, layer: &str) -> bool {
        self.search_parametric(layer).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FaultModel;
    use crate::site::{Coord, FaultSite};
    use ndarray::Array4;
    use neurofi_snn::{Layer, Network, NeuronModel};

    fn topology() -> LayerTopology {
        let conv = Layer::conv("sc1", Array4::from_elem((2, 1, 1, 1), 1.0));
        let drop = Layer::dropout("sd1");
        let dense = Layer::dense("sf1", Array4::from_elem((2, 2 * 2 * 2, 1, 1), 1.0));
        let mut net = Network::new(vec![conv, drop, dense], NeuronModel::default());
        LayerTopology::infer(&mut net, (1, 2, 2)).unwrap()
    }

    fn neuronal(layer: &str) -> Fault {
        Fault::single(
            FaultModel::DeadNeuron,
            FaultSite::new(layer, [Coord::All, Coord::Idx(0), Coord::Idx(0), Coord::Idx(0)]),
        )
    }

    fn synaptic(layer: &str) -> Fault {
        Fault::single(
            FaultModel::DeadSynapse,
            FaultSite::new(
                layer,
                [Coord::Idx(0), Coord::Idx(0), Coord::Idx(0), Coord::Idx(0)],
            ),
        )
    }

    #[test]
    fn empty_round_is_golden() {
        let round = FaultRound::new();
        let oround = round.optimized(&topology()).unwrap();
        assert!(oround.is_golden());
        assert_eq!(oround.early_idx(), None);
        assert_eq!(oround.late_idx(), None);
        assert!(!oround.is_out_faulty());
    }

    #[test]
    fn early_and_late_span_the_touched_layers() {
        let mut round = FaultRound::new();
        round.insert(neuronal("sf1"));
        round.insert(synaptic("sc1"));
        let oround = round.optimized(&topology()).unwrap();
        assert_eq!(oround.early_idx(), Some(0));
        assert_eq!(oround.early_name(), Some("sc1"));
        assert_eq!(oround.late_idx(), Some(2));
        assert!(oround.early_idx().unwrap() <= oround.late_idx().unwrap());
    }

    #[test]
    fn out_faulty_only_for_neuronal_on_output() {
        let mut round = FaultRound::new();
        round.insert(synaptic("sf1"));
        let oround = round.optimized(&topology()).unwrap();
        assert!(!oround.is_out_faulty());

        let mut round = FaultRound::new();
        round.insert(neuronal("sf1"));
        assert!(round.optimized(&topology()).unwrap().is_out_faulty());
    }

    #[test]
    fn unknown_layer_aborts_optimization() {
        let mut round = FaultRound::new();
        round.insert(neuronal("missing"));
        assert!(round.optimized(&topology()).is_err());
    }

    #[test]
    fn search_filters_by_target() {
        let mut round = FaultRound::new();
        round.insert(neuronal("sc1"));
        round.insert(synaptic("sc1"));
        let oround = round.optimized(&topology()).unwrap();
        assert_eq!(oround.search_neuronal("sc1").count(), 1);
        assert_eq!(oround.search_synaptic("sc1").count(), 1);
        assert_eq!(oround.search_parametric("sc1").count(), 0);
        assert!(oround.any_neuronal("sc1"));
        assert!(!oround.any_neuronal("sf1"));
    }

    #[test]
    fn extract_removes_matching_faults() {
        let mut round = FaultRound::new();
        let f = neuronal("sc1");
        round.insert(f.clone());
        round.insert(synaptic("sc1"));
        assert!(round.extract(&f));
        assert_eq!(round.len(), 1);
        assert!(!round.extract(&f));
    }
}
