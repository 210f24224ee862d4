//! Per-round performance accumulators.

use serde::{Deserialize, Serialize};

/// Running accuracy/loss statistics for one fault round.
///
/// A campaign owns one accumulator per round, feeds it after every batch,
/// and calls [`RoundStats::update`] once a run completes to fold the run's
/// accuracy into `best_accuracy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Samples evaluated.
    pub samples: u64,
    /// Correctly classified samples.
    pub correct: u64,
    /// Accumulated loss.
    pub loss_sum: f32,
    /// Best accuracy seen across completed runs.
    pub best_accuracy: f32,
}

impl RoundStats {
    /// Record one batch's contribution.
    pub fn record(&mut self, correct: u64, samples: u64, loss: Option<f32>) {
        self.correct += correct;
        self.samples += samples;
        if let Some(loss) = loss {
            self.loss_sum += loss;
        }
    }

    /// Current accuracy; zero before any sample is recorded.
    pub fn accuracy(&self) -> f32 {
        if self.samples == 0 {
            0.0
        } else {
            self.correct as f32 / self.samples as f32
        }
    }

    /// Mean loss per sample; zero before any sample is recorded.
    pub fn mean_loss(&self) -> f32 {
        if self.samples == 0 {
            0.0
        } else {
            self.loss_sum / self.samples as f32
        }
    }

    /// Fold the current accuracy into the best-seen accuracy.
    pub fn update(&mut self) {
        let acc = self.accuracy();
        if acc > self.best_accuracy {
            self.best_accuracy = acc;
        }
    }
}
