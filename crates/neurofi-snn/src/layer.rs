//! Computation stages: convolution, dense, and dropout layers.
//!
//! Stage outputs here are the *raw* synaptic responses; the spiking
//! activation is applied by the owning [`Network`](crate::network::Network)
//! after the stage's post-hooks have fired.

use crate::error::NetError;
use crate::Tensor;
use ndarray::Array4;
use std::fmt;

/// The kind of a computation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// 2-D cross-correlation (valid padding) with a 4-axis weight
    /// `(out_ch, in_ch, kh, kw)`.
    Conv,
    /// Fully connected layer over the flattened input; weight
    /// `(out_ch, in_ch * h * w, 1, 1)`.
    Dense,
    /// Identity at evaluation time.  Dropout stages carry no weights,
    /// apply no spiking response, and are never injectable.
    Dropout,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Conv => write!(f, "conv"),
            LayerKind::Dense => write!(f, "dense"),
            LayerKind::Dropout => write!(f, "dropout"),
        }
    }
}

/// One named computation stage of a layered network.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Stage name, unique within a network.
    pub name: String,
    /// What this stage computes.
    pub kind: LayerKind,
    /// Synaptic weight tensor.  Empty (all dims zero) for dropout stages.
    pub weight: Tensor,
}

impl Layer {
    /// Create a convolution stage.
    pub fn conv(name: impl Into<String>, weight: Tensor) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Conv,
            weight,
        }
    }

    /// Create a dense stage.
    pub fn dense(name: impl Into<String>, weight: Tensor) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Dense,
            weight,
        }
    }

    /// Create a dropout stage (identity at evaluation time).
    pub fn dropout(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Dropout,
            weight: Array4::zeros((0, 0, 0, 0)),
        }
    }

    /// Whether faults may address this stage.
    pub fn is_injectable(&self) -> bool {
        self.kind != LayerKind::Dropout
    }

    /// The weight tensor shape as a fixed 4-array.
    pub fn weight_shape(&self) -> [usize; 4] {
        let d = self.weight.dim();
        [d.0, d.1, d.2, d.3]
    }

    /// Apply the stage's raw synaptic computation.
    pub fn apply(&self, input: &Tensor) -> Result<Tensor, NetError> {
        match self.kind {
            LayerKind::Conv => self.apply_conv(input),
            LayerKind::Dense => self.apply_dense(input),
            LayerKind::Dropout => Ok(input.clone()),
        }
    }

    fn apply_conv(&self, input: &Tensor) -> Result<Tensor, NetError> {
        let (b, ic, ih, iw) = input.dim();
        let (oc, wic, kh, kw) = self.weight.dim();
        if wic != ic || kh > ih || kw > iw {
            return Err(self.shape_mismatch(input));
        }

        let (oh, ow) = (ih - kh + 1, iw - kw + 1);
        let mut out = Array4::zeros((b, oc, oh, ow));
        for n in 0..b {
            for o in 0..oc {
                for y in 0..oh {
                    for x in 0..ow {
                        let mut acc = 0.0;
                        for i in 0..ic {
                            for dy in 0..kh {
                                for dx in 0..kw {
                                    acc += self.weight[[o, i, dy, dx]]
                                        * input[[n, i, y + dy, x + dx]];
                                }
                            }
                        }
                        out[[n, o, y, x]] = acc;
                    }
                }
            }
        }
        Ok(out)
    }

    fn apply_dense(&self, input: &Tensor) -> Result<Tensor, NetError> {
        let (b, ic, ih, iw) = input.dim();
        let (oc, flat, _, _) = self.weight.dim();
        if flat != ic * ih * iw {
            return Err(self.shape_mismatch(input));
        }

        let mut out = Array4::zeros((b, oc, 1, 1));
        for n in 0..b {
            for o in 0..oc {
                let mut acc = 0.0;
                let mut i = 0;
                for c in 0..ic {
                    for y in 0..ih {
                        for x in 0..iw {
                            acc += self.weight[[o, i, 0, 0]] * input[[n, c, y, x]];
                            i += 1;
                        }
                    }
                }
                out[[n, o, 0, 0]] = acc;
            }
        }
        Ok(out)
    }

    fn shape_mismatch(&self, input: &Tensor) -> NetError {
        NetError::ShapeMismatch {
            stage: self.name.clone(),
            expected: format!("weight {:?}", self.weight.dim()),
            got: format!("input {:?}", input.dim()),
        }
    }
}
