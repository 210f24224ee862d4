//! Random completion and validation of fault definitions.
//!
//! `define_random` fills in the unassigned parts of partially specified
//! faults from an explicit seeded RNG, so campaigns are reproducible from
//! their seed.  `validate` reduces a fault collection to the faults a
//! topology actually accepts; rejections are diagnostics, not errors.

use crate::fault::Fault;
use crate::site::{Coord, FaultSite};
use log::warn;
use neurofi_snn::{LayerTopology, NeuronModel};
use rand::Rng;

/// Fill unassigned layers and coordinate axes uniformly at random.
///
/// Layers are drawn from the topology's injectable stages; coordinates are
/// drawn within the layer's relevant shape (weight axes for synaptic
/// faults, output axes with a batch-wildcard axis 0 otherwise).  Wildcard
/// axes are left alone.  Returns `true` when a newly defined site collided
/// with an existing site of the same fault — reported, not fatal.
pub fn define_random<R: Rng>(
    faults: &mut [Fault],
    topology: &LayerTopology,
    rng: &mut R,
) -> bool {
    let injectables = topology.injectables();
    let mut collided = false;

    for fault in faults.iter_mut() {
        let is_syn = fault.model().is_synaptic();

        for site in fault.pending_mut() {
            if site.layer.is_empty() {
                if injectables.is_empty() {
                    continue;
                }
                site.layer = injectables[rng.gen_range(0..injectables.len())].to_string();
            }

            let shape = match topology.shape(is_syn, &site.layer) {
                Ok(shape) => shape,
                Err(err) => {
                    warn!("Skipping random definition of {site}: {err}");
                    continue;
                }
            };

            if matches!(site.position[0], Coord::Undefined) {
                site.position[0] = if is_syn {
                    Coord::Idx(rng.gen_range(0..shape[0]) as isize)
                } else {
                    Coord::All
                };
            }
            for i in 1..4 {
                if matches!(site.position[i], Coord::Undefined) {
                    // Weight shapes index axes 1..4 directly; output shapes
                    // are offset by the batch-wildcard axis.
                    let si = if is_syn { i } else { i - 1 };
                    site.position[i] = Coord::Idx(rng.gen_range(0..shape[si]) as isize);
                }
            }
        }

        if fault.refresh() {
            collided = true;
        }
    }

    if collided {
        warn!("Some newly defined random fault sites already existed in their fault");
    }
    collided
}

/// Reduce a fault collection to the faults the topology accepts.
///
/// Drops parametric faults referencing a parameter the neuron model does
/// not support, drops sites that are out of range or address a
/// non-injectable layer, and drops faults left without sites.  Returns the
/// survivors.
pub fn validate(
    faults: Vec<Fault>,
    topology: &LayerTopology,
    neuron: &NeuronModel,
) -> Vec<Fault> {
    let mut valid = Vec::with_capacity(faults.len());

    for mut fault in faults {
        if let Some(param) = fault.model().param_name() {
            if !neuron.supports(param) {
                warn!(
                    "Dropping {}: parameter '{param}' is not supported by the neuron model",
                    fault.model()
                );
                continue;
            }
        }

        let is_syn = fault.model().is_synaptic();
        fault.retain_sites(|site| {
            let ok = site_in_range(site, is_syn, topology);
            if !ok {
                warn!("Dropping out-of-range or non-injectable fault site {site}");
            }
            ok
        });
        fault.canonicalize_sites(|site| normalize_site(site, is_syn, topology));

        if fault.is_empty() {
            warn!("Dropping void fault ({})", fault.model());
            continue;
        }
        valid.push(fault);
    }

    valid
}

/// Rewrite negative indices to their non-negative equivalent so that two
/// spellings of one physical coordinate compare equal afterwards.  The
/// neuronal batch axis has no known extent here and is left alone.
fn normalize_site(site: &mut FaultSite, is_syn: bool, topology: &LayerTopology) {
    let Ok(shape) = topology.shape(is_syn, &site.layer) else {
        return;
    };
    for i in 0..4 {
        if !is_syn && i == 0 {
            continue;
        }
        let si = if is_syn { i } else { i - 1 };
        if let Coord::Idx(v) = site.position[i] {
            if v < 0 {
                if let Some(n) = site.position[i].normalize(shape[si]) {
                    site.position[i] = Coord::Idx(n as isize);
                }
            }
        }
    }
}

fn site_in_range(site: &FaultSite, is_syn: bool, topology: &LayerTopology) -> bool {
    if !topology.is_injectable(&site.layer) {
        return false;
    }
    let shape = match topology.shape(is_syn, &site.layer) {
        Ok(shape) => shape,
        Err(_) => return false,
    };

    if is_syn && !site.position[0].in_range(shape[0]) {
        return false;
    }
    for i in 1..4 {
        let si = if is_syn { i } else { i - 1 };
        if !site.position[i].in_range(shape[si]) {
            return false;
        }
    }
    true
}
