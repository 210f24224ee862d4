//! A fault: one model applied at a set of sites.

use crate::model::FaultModel;
use crate::site::FaultSite;
use std::fmt;

/// One fault model paired with the sites it perturbs.
///
/// Sites are unique within a fault.  Sites that are not yet fully defined
/// (missing layer or coordinate components) wait in a pending list until
/// [`define_random`](crate::define::define_random) assigns them and
/// [`Fault::refresh`] promotes them into the site set.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    model: FaultModel,
    sites: Vec<FaultSite>,
    pending: Vec<FaultSite>,
}

impl Fault {
    /// A fault with no sites yet.
    pub fn new(model: FaultModel) -> Self {
        Self {
            model,
            sites: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// A fault over the given sites.  Fully defined sites enter the site
    /// set directly (exact duplicates collapse); partial sites wait as
    /// pending.
    pub fn with_sites(model: FaultModel, sites: impl IntoIterator<Item = FaultSite>) -> Self {
        let mut fault = Self::new(model);
        fault.add_sites(sites);
        fault
    }

    /// Convenience constructor for a single-site fault.
    pub fn single(model: FaultModel, site: FaultSite) -> Self {
        Self::with_sites(model, [site])
    }

    /// Add one site (defined or partial).
    pub fn add_site(&mut self, site: FaultSite) {
        if site.is_defined() {
            if !self.sites.contains(&site) {
                self.sites.push(site);
            }
        } else {
            self.pending.push(site);
        }
    }

    /// Add several sites.
    pub fn add_sites(&mut self, sites: impl IntoIterator<Item = FaultSite>) {
        for site in sites {
            self.add_site(site);
        }
    }

    /// The fault model.
    pub fn model(&self) -> &FaultModel {
        &self.model
    }

    /// The defined, unique sites.
    pub fn sites(&self) -> &[FaultSite] {
        &self.sites
    }

    /// Sites still awaiting definition.
    pub fn pending(&self) -> &[FaultSite] {
        &self.pending
    }

    /// Mutable access to the pending sites, for random definition.
    pub fn pending_mut(&mut self) -> &mut [FaultSite] {
        &mut self.pending
    }

    /// Promote now-defined pending sites into the site set.
    ///
    /// A promoted site that collides with an existing one stays pending:
    /// duplicates are detected and reported by the caller, never silently
    /// merged away.  Returns `true` when any collision remained.
    pub fn refresh(&mut self) -> bool {
        let mut still_pending = Vec::new();
        for site in self.pending.drain(..) {
            if !site.is_defined() {
                still_pending.push(site);
            } else if self.sites.contains(&site) {
                still_pending.push(site);
            } else {
                self.sites.push(site);
            }
        }
        let collided = still_pending.iter().any(|s| s.is_defined());
        self.pending = still_pending;
        collided
    }

    /// Keep only the defined sites satisfying `keep`.
    pub fn retain_sites(&mut self, keep: impl FnMut(&FaultSite) -> bool) {
        self.sites.retain(keep);
    }

    /// Rewrite every defined site in place, then collapse duplicates the
    /// rewrite produced.  Used to canonicalize negative indices so that
    /// two spellings of one physical coordinate count as one site.
    pub fn canonicalize_sites(&mut self, mut rewrite: impl FnMut(&mut FaultSite)) {
        for site in &mut self.sites {
            rewrite(site);
        }
        let mut seen: Vec<FaultSite> = Vec::with_capacity(self.sites.len());
        self.sites.retain(|s| {
            if seen.contains(s) {
                false
            } else {
                seen.push(s.clone());
                true
            }
        });
    }

    /// Whether the fault addresses no defined sites (a void fault).
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Number of defined sites.
    pub fn breadth(&self) -> usize {
        self.sites.len()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ [", self.model)?;
        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{site}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::Coord;

    fn site(layer: &str, c: isize) -> FaultSite {
        FaultSite::new(layer, [Coord::All, Coord::Idx(c), Coord::Idx(0), Coord::Idx(0)])
    }

    #[test]
    fn defined_sites_deduplicate_on_construction() {
        let f = Fault::with_sites(FaultModel::DeadNeuron, [site("a", 0), site("a", 0)]);
        assert_eq!(f.breadth(), 1);
        assert!(f.pending().is_empty());
    }

    #[test]
    fn partial_sites_wait_as_pending() {
        let f = Fault::with_sites(FaultModel::DeadNeuron, [FaultSite::for_layer("a")]);
        assert!(f.is_empty());
        assert_eq!(f.pending().len(), 1);
    }

    #[test]
    fn refresh_promotes_and_reports_collisions() {
        let mut f = Fault::with_sites(FaultModel::DeadNeuron, [site("a", 0)]);
        f.add_site(FaultSite::for_layer("a"));
        // Define the pending site so it collides with the existing one.
        f.pending_mut()[0].position = [Coord::All, Coord::Idx(0), Coord::Idx(0), Coord::Idx(0)];
        assert!(f.refresh());
        assert_eq!(f.breadth(), 1);
        assert_eq!(f.pending().len(), 1);

        // A non-colliding definition promotes cleanly.
        f.pending_mut()[0].position = [Coord::All, Coord::Idx(1), Coord::Idx(0), Coord::Idx(0)];
        assert!(!f.refresh());
        assert_eq!(f.breadth(), 2);
        assert!(f.pending().is_empty());
    }

    #[test]
    fn canonicalize_collapses_rewritten_duplicates() {
        let mut f = Fault::with_sites(
            FaultModel::DriftedNeuron(1.0),
            [site("a", -1), site("a", 1)],
        );
        assert_eq!(f.breadth(), 2);

        // Rewriting -1 to 1 (axis length 2) makes the sites identical.
        f.canonicalize_sites(|s| {
            if s.position[1] == Coord::Idx(-1) {
                s.position[1] = Coord::Idx(1);
            }
        });
        assert_eq!(f.breadth(), 1);
        assert_eq!(f.sites()[0].position[1], Coord::Idx(1));
    }

    #[test]
    fn display_format() {
        let f = Fault::single(FaultModel::DeadSynapse, site("sf1", 2));
        assert_eq!(f.to_string(), "dead-synapse @ [sf1[*, 2, 0, 0]]");
    }
}
