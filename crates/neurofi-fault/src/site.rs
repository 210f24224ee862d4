//! Fault sites — exact tensor coordinates a fault addresses.
//!
//! A site is a layer name plus a 4-axis coordinate.  Synaptic sites address
//! the 4-axis weight tensor directly.  Neuronal (and parametric) sites
//! address the 3-axis output shape `(C, H, W)`: coordinate axis 0 spans the
//! batch axis (conventionally a wildcard) and axes 1..4 map to shape axes
//! 0..3.  Concrete indices use slice-style negative indexing and are valid
//! within `[-dim, dim)`.

use std::fmt;

/// One coordinate component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coord {
    /// Concrete index; negative values count from the end of the axis.
    Idx(isize),
    /// Wildcard: every position along the axis.  Never randomized.
    All,
    /// Not yet assigned; filled in by
    /// [`define_random`](crate::define::define_random).
    Undefined,
}

impl Coord {
    /// Normalize against an axis length; `None` when out of range.
    pub fn normalize(self, dim: usize) -> Option<usize> {
        match self {
            Coord::Idx(i) if i >= 0 && (i as usize) < dim => Some(i as usize),
            Coord::Idx(i) if i < 0 && i >= -(dim as isize) => Some((i + dim as isize) as usize),
            _ => None,
        }
    }

    /// Whether a concrete index lies within `[-dim, dim)`.  Wildcards are
    /// always in range; undefined components never are.
    pub fn in_range(self, dim: usize) -> bool {
        match self {
            Coord::All => true,
            Coord::Undefined => false,
            Coord::Idx(_) => self.normalize(dim).is_some(),
        }
    }

    fn indices(self, dim: usize) -> Vec<usize> {
        match self {
            Coord::All => (0..dim).collect(),
            _ => self.normalize(dim).into_iter().collect(),
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coord::Idx(i) => write!(f, "{i}"),
            Coord::All => write!(f, "*"),
            Coord::Undefined => write!(f, "?"),
        }
    }
}

/// A (layer, coordinate) fault address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaultSite {
    /// Layer name; empty means "layer not yet assigned".
    pub layer: String,
    /// 4-axis coordinate; interpretation depends on the fault target.
    pub position: [Coord; 4],
}

impl FaultSite {
    /// A site with every component assigned by the caller.
    pub fn new(layer: impl Into<String>, position: [Coord; 4]) -> Self {
        Self {
            layer: layer.into(),
            position,
        }
    }

    /// A fully unassigned site (layer and coordinates randomized later).
    pub fn undefined() -> Self {
        Self {
            layer: String::new(),
            position: [Coord::Undefined; 4],
        }
    }

    /// A site pinned to a layer with unassigned coordinates.
    pub fn for_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            position: [Coord::Undefined; 4],
        }
    }

    /// Whether the layer and every coordinate component are assigned.
    pub fn is_defined(&self) -> bool {
        !self.layer.is_empty()
            && self
                .position
                .iter()
                .all(|c| !matches!(c, Coord::Undefined))
    }

    /// Concrete weight-tensor indices addressed by this site.
    pub fn resolve_weight(&self, weight_shape: &[usize; 4]) -> Vec<[usize; 4]> {
        Self::cartesian([
            self.position[0].indices(weight_shape[0]),
            self.position[1].indices(weight_shape[1]),
            self.position[2].indices(weight_shape[2]),
            self.position[3].indices(weight_shape[3]),
        ])
    }

    /// Concrete activation-tensor indices addressed by this site, given
    /// the batched output shape `(batch, c, h, w)`.
    pub fn resolve_output(&self, out_dim: (usize, usize, usize, usize)) -> Vec<[usize; 4]> {
        Self::cartesian([
            self.position[0].indices(out_dim.0),
            self.position[1].indices(out_dim.1),
            self.position[2].indices(out_dim.2),
            self.position[3].indices(out_dim.3),
        ])
    }

    fn cartesian(axes: [Vec<usize>; 4]) -> Vec<[usize; 4]> {
        let mut out = Vec::with_capacity(axes.iter().map(Vec::len).product());
        for &a in &axes[0] {
            for &b in &axes[1] {
                for &c in &axes[2] {
                    for &d in &axes[3] {
                        out.push([a, b, c, d]);
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for FaultSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layer = if self.layer.is_empty() {
            "?"
        } else {
            &self.layer
        };
        write!(
            f,
            "{layer}[{}, {}, {}, {}]",
            self.position[0], self.position[1], self.position[2], self.position[3]
        )
    }
}
