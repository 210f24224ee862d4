//! Serializable campaign results.

use crate::campaign::Campaign;
use neurofi_snn::RoundStats;
use serde::{Deserialize, Serialize};

/// One fault round's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Human-readable fault descriptions, one per fault in the round.
    pub faults: Vec<String>,
    /// Earliest affected layer, `None` for golden rounds.
    pub early_layer: Option<String>,
    /// Whether the output stage itself carries a neuronal fault.
    pub is_out_faulty: bool,
    pub accuracy: f32,
    pub mean_loss: f32,
    pub samples: u64,
}

/// A full campaign result, suitable for JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub name: String,
    /// Layer names in topological order.
    pub layers: Vec<String>,
    pub rounds: Vec<RoundSummary>,
    /// Wall-clock seconds of the producing run.
    pub duration_secs: f64,
}

impl CampaignSummary {
    /// Snapshot a campaign after a `run`.
    ///
    /// Rounds without statistics (the campaign was never run, or rounds
    /// were added afterwards) report zero samples.
    pub fn of(campaign: &Campaign) -> Self {
        let stats_of = |r: usize| -> RoundStats {
            campaign.stats().get(r).cloned().unwrap_or_default()
        };

        let rounds = campaign
            .rounds()
            .iter()
            .enumerate()
            .map(|(r, round)| {
                let stats = stats_of(r);
                let oround = campaign.optimized_rounds().get(r);
                RoundSummary {
                    faults: round.faults().iter().map(ToString::to_string).collect(),
                    early_layer: oround.and_then(|o| o.early_name().map(str::to_string)),
                    is_out_faulty: oround.map(|o| o.is_out_faulty()).unwrap_or(false),
                    accuracy: stats.accuracy(),
                    mean_loss: stats.mean_loss(),
                    samples: stats.samples,
                }
            })
            .collect();

        Self {
            name: campaign.name().to_string(),
            layers: campaign.topology().names().map(str::to_string).collect(),
            rounds,
            duration_secs: campaign
                .duration()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        }
    }

    /// Best accuracy across all rounds, `None` when no round has data.
    pub fn best_accuracy(&self) -> Option<f32> {
        self.rounds
            .iter()
            .filter(|r| r.samples > 0)
            .map(|r| r.accuracy)
            .fold(None, |best, a| Some(best.map_or(a, |b: f32| b.max(a))))
    }
}
