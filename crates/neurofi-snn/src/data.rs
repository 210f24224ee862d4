//! Dataset batches and evaluation metrics.

use crate::Tensor;

/// One evaluation batch: input activations, the desired per-class spike
/// targets, and ground-truth class labels.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Input tensor `(batch, channels, h, w)`.
    pub input: Tensor,
    /// Target tensor `(batch, classes, 1, 1)` of desired spike counts.
    pub target: Tensor,
    /// Ground-truth class label per sample.
    pub labels: Vec<usize>,
}

/// A finite, restartable sequence of batches.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    batches: Vec<Batch>,
}

impl Dataset {
    /// Create a dataset from ordered batches.
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the dataset holds no batches.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Iterate the batches in order.  Each call restarts from the first
    /// batch, so one dataset serves any number of evaluation runs.
    pub fn batches(&self) -> std::slice::Iter<'_, Batch> {
        self.batches.iter()
    }
}

/// Predicted class per sample: the channel with the largest summed
/// activation.  Ties break to the lower class index.
pub fn predict_classes(output: &Tensor) -> Vec<usize> {
    let (b, c, h, w) = output.dim();
    let mut classes = Vec::with_capacity(b);
    for n in 0..b {
        let mut best = 0;
        let mut best_sum = f32::NEG_INFINITY;
        for ch in 0..c {
            let mut sum = 0.0;
            for y in 0..h {
                for x in 0..w {
                    sum += output[[n, ch, y, x]];
                }
            }
            if sum > best_sum {
                best_sum = sum;
                best = ch;
            }
        }
        classes.push(best);
    }
    classes
}

/// A numeric loss over a batch output.
pub trait LossFn {
    /// Loss of `output` against `target`, summed over the batch.
    fn loss(&self, output: &Tensor, target: &Tensor) -> f32;
}

/// Squared difference of per-class spike counts, the usual metric for
/// spike-count-coded classifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpikeCountLoss;

impl LossFn for SpikeCountLoss {
    fn loss(&self, output: &Tensor, target: &Tensor) -> f32 {
        let (b, c, h, w) = output.dim();
        let tc = target.dim().1;
        let mut total = 0.0;
        for n in 0..b {
            for ch in 0..c {
                let mut count = 0.0;
                for y in 0..h {
                    for x in 0..w {
                        count += output[[n, ch, y, x]];
                    }
                }
                // A channel without a target counts as a zero-spike target.
                let want = if tc == 0 {
                    0.0
                } else {
                    target[[n, ch.min(tc - 1), 0, 0]]
                };
                let diff = count - want;
                total += diff * diff;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn predict_argmax_of_channel_sums() {
        let mut out = Array4::zeros((2, 3, 1, 2));
        // Sample 0: channel 1 dominates; sample 1: channel 2.
        out[[0, 1, 0, 0]] = 1.0;
        out[[0, 1, 0, 1]] = 1.0;
        out[[1, 2, 0, 0]] = 1.0;
        assert_eq!(predict_classes(&out), vec![1, 2]);
    }

    #[test]
    fn predict_ties_break_low() {
        let out = Array4::zeros((1, 3, 1, 1));
        assert_eq!(predict_classes(&out), vec![0]);
    }

    #[test]
    fn spike_count_loss_zero_on_match() {
        let mut out = Array4::zeros((1, 2, 1, 2));
        out[[0, 0, 0, 0]] = 1.0;
        out[[0, 0, 0, 1]] = 1.0;
        let mut target = Array4::zeros((1, 2, 1, 1));
        target[[0, 0, 0, 0]] = 2.0;
        assert_eq!(SpikeCountLoss.loss(&out, &target), 0.0);

        target[[0, 0, 0, 0]] = 0.0;
        assert_eq!(SpikeCountLoss.loss(&out, &target), 4.0);
    }

    #[test]
    fn spike_count_loss_tolerates_empty_target() {
        let mut out = Array4::zeros((1, 1, 1, 1));
        out[[0, 0, 0, 0]] = 1.0;
        let target = Array4::zeros((1, 0, 1, 1));
        assert_eq!(SpikeCountLoss.loss(&out, &target), 1.0);
    }

    #[test]
    fn dataset_iteration_restarts() {
        let batch = Batch {
            input: Array4::zeros((1, 1, 1, 1)),
            target: Array4::zeros((1, 1, 1, 1)),
            labels: vec![0],
        };
        let ds = Dataset::new(vec![batch.clone(), batch]);
        assert_eq!(ds.batches().count(), 2);
        assert_eq!(ds.batches().count(), 2);
    }
}
