//! End-to-end campaign evaluation on small deterministic networks.
//!
//! All scenarios use identity dense layers and the default neuron model,
//! whose postsynaptic potential is the identity and whose threshold is 1,
//! so a golden pass reproduces its binary input exactly.  Labels are the
//! golden network's own predictions; every accuracy drop below 1.0 is
//! therefore caused by the injected fault.

use ndarray::Array4;
use neurofi_campaign::{Campaign, CampaignConfig, CampaignSummary};
use neurofi_fault::{Coord, Fault, FaultModel, FaultSite};
use neurofi_snn::{
    predict_classes, Batch, Dataset, Layer, Network, NeuronModel, SpikeCountLoss, Tensor,
};
use std::cell::RefCell;
use std::rc::Rc;

fn identity_dense(name: &str, ch: usize) -> Layer {
    let mut w = Array4::zeros((ch, ch, 1, 1));
    for i in 0..ch {
        w[[i, i, 0, 0]] = 1.0;
    }
    Layer::dense(name, w)
}

/// Identity chain sf1..sfN over `ch` channels.
fn identity_net(stages: usize, ch: usize) -> Network {
    let layers = (1..=stages)
        .map(|i| identity_dense(&format!("sf{i}"), ch))
        .collect();
    Network::new(layers, NeuronModel::default())
}

/// One batch of binary spike rows, labelled by the golden network.
fn dataset_of(net: &mut Network, rows: &[&[f32]]) -> Dataset {
    let ch = rows[0].len();
    let mut input = Tensor::zeros((rows.len(), ch, 1, 1));
    for (s, row) in rows.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            input[[s, c, 0, 0]] = v;
        }
    }
    let target = net.forward(&input).unwrap();
    let labels = predict_classes(&target);
    Dataset::new(vec![Batch {
        input,
        target,
        labels,
    }])
}

fn neuron_site(layer: &str, channel: isize) -> FaultSite {
    FaultSite::new(
        layer,
        [Coord::All, Coord::Idx(channel), Coord::Idx(0), Coord::Idx(0)],
    )
}

fn weight_site(layer: &str, out: isize, inp: isize) -> FaultSite {
    FaultSite::new(
        layer,
        [Coord::Idx(out), Coord::Idx(inp), Coord::Idx(0), Coord::Idx(0)],
    )
}

const ROWS: &[&[f32]] = &[&[1.0, 0.0], &[0.0, 1.0], &[1.0, 1.0], &[0.0, 0.0]];

fn two_stage_setup() -> (Campaign, Dataset) {
    let mut net = identity_net(2, 2);
    let dataset = dataset_of(&mut net, ROWS);
    let campaign = Campaign::new(net, (2, 1, 1), CampaignConfig::default()).unwrap();
    (campaign, dataset)
}

#[test]
fn golden_baseline_is_perfect() {
    let (mut campaign, dataset) = two_stage_setup();

    campaign.run(&dataset, Some(&SpikeCountLoss)).unwrap();

    let stats = &campaign.stats()[0];
    assert_eq!(stats.samples, 4);
    assert_eq!(stats.accuracy(), 1.0);
    assert_eq!(stats.mean_loss(), 0.0);
    assert!(campaign.duration().is_some());
}

#[test]
fn dead_neuron_disables_one_channel() {
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .inject(
            vec![Fault::single(FaultModel::DeadNeuron, neuron_site("sf1", 0))],
            0,
        )
        .unwrap();

    campaign.run(&dataset, None).unwrap();

    // Only the (1,1) row misclassifies: its channel-0 spike is lost and the
    // argmax moves to channel 1.
    assert_eq!(campaign.stats()[0].accuracy(), 0.75);
}

#[test]
fn output_layer_faults_reach_the_final_output() {
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .inject(
            vec![Fault::single(FaultModel::DeadNeuron, neuron_site("sf2", 0))],
            0,
        )
        .unwrap();

    campaign.run(&dataset, None).unwrap();
    assert_eq!(campaign.stats()[0].accuracy(), 0.75);
}

#[test]
fn optimized_rounds_match_single_round_results() {
    // Same faults, one per round, alongside a golden round: the optimized
    // multi-round path must reproduce the single-round accuracies.
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadNeuron,
            neuron_site("sf1", 0),
        )])
        .unwrap();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadNeuron,
            neuron_site("sf2", 0),
        )])
        .unwrap();

    campaign.run(&dataset, None).unwrap();

    assert_eq!(campaign.stats()[0].accuracy(), 1.0);
    assert_eq!(campaign.stats()[1].accuracy(), 0.75);
    assert_eq!(campaign.stats()[2].accuracy(), 0.75);
}

#[test]
fn synaptic_weights_are_restored_between_rounds() {
    // Round 1 kills the (0,0) weight of sf1; round 2 adds a (1,0) weight.
    // If round 1's perturbation leaked, round 2 would also lose channel 0
    // and drop to 0.75 instead of staying perfect.
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadSynapse,
            weight_site("sf1", 0, 0),
        )])
        .unwrap();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::SaturatedSynapse(1.0),
            weight_site("sf1", 1, 0),
        )])
        .unwrap();

    campaign.run(&dataset, None).unwrap();

    assert_eq!(campaign.stats()[0].accuracy(), 1.0);
    assert_eq!(campaign.stats()[1].accuracy(), 0.75);
    assert_eq!(campaign.stats()[2].accuracy(), 1.0);
}

#[test]
fn golden_network_is_never_perturbed() {
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadSynapse,
            weight_site("sf1", 0, 0),
        )])
        .unwrap();

    campaign.run(&dataset, None).unwrap();

    assert_eq!(campaign.golden().layers()[0].weight[[0, 0, 0, 0]], 1.0);
}

#[test]
fn golden_prefix_is_computed_once_per_batch() {
    // Counting hooks on the golden network (the faulty clone drops them)
    // observe every golden stage evaluation.  Three rounds share the same
    // earliest layer; the golden activations must still be computed exactly
    // once per batch, not once per round.
    let mut net = identity_net(3, 2);
    let dataset = dataset_of(&mut net, ROWS);

    let stage_evals = Rc::new(RefCell::new(0u32));
    for stage in 0..net.len() {
        let stage_evals = Rc::clone(&stage_evals);
        net.register_pre_hook(
            stage,
            Box::new(move |_, _| {
                *stage_evals.borrow_mut() += 1;
            }),
        )
        .unwrap();
    }

    let mut campaign = Campaign::new(net, (2, 1, 1), CampaignConfig::default()).unwrap();
    for _ in 0..3 {
        campaign
            .then_inject(vec![Fault::single(
                FaultModel::DeadNeuron,
                neuron_site("sf1", 0),
            )])
            .unwrap();
    }

    let after_setup = *stage_evals.borrow();
    campaign.run(&dataset, None).unwrap();

    // 3 stages, 1 batch, 4 rounds (golden + 3 faulty): 3 evaluations.
    assert_eq!(*stage_evals.borrow() - after_setup, 3);
}

#[test]
fn masked_fault_reconverges_with_golden() {
    // Channel 0 is silent in every input, so killing it changes nothing;
    // the faulty suffix reconverges immediately and the round stays
    // indistinguishable from golden.
    let mut net = identity_net(3, 2);
    let dataset = dataset_of(&mut net, &[&[0.0, 1.0], &[0.0, 0.0]]);
    let mut campaign = Campaign::new(net, (2, 1, 1), CampaignConfig::default()).unwrap();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadNeuron,
            neuron_site("sf1", 0),
        )])
        .unwrap();

    campaign.run(&dataset, None).unwrap();

    assert_eq!(campaign.stats()[0].accuracy(), 1.0);
    assert_eq!(campaign.stats()[1].accuracy(), 1.0);
}

#[test]
fn parametric_threshold_scaling_silences_sites() {
    // Scaling theta by 10 puts the threshold out of reach of binary
    // inputs, so the addressed channel behaves like a dead neuron.
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .inject(
            vec![Fault::single(
                FaultModel::ParametricNeuron {
                    param: "theta".to_string(),
                    scale: 10.0,
                },
                neuron_site("sf1", 0),
            )],
            0,
        )
        .unwrap();

    campaign.run(&dataset, None).unwrap();
    assert_eq!(campaign.stats()[0].accuracy(), 0.75);
}

#[test]
fn run_complete_sweeps_every_neuron() {
    let (mut campaign, dataset) = two_stage_setup();

    campaign
        .run_complete(&dataset, FaultModel::DeadNeuron, None, None)
        .unwrap();

    // 2 channels x 2 layers, one singleton round each.
    assert_eq!(campaign.rounds().len(), 4);
    for (round, stats) in campaign.rounds().iter().zip(campaign.stats()) {
        assert_eq!(round.len(), 1);
        assert_eq!(stats.samples, 4);
        // Every dead channel misclassifies exactly the (1,1) or the row
        // carried by that channel alone.
        assert_eq!(stats.accuracy(), 0.75);
    }
}

#[test]
fn run_complete_sweeps_every_synapse_of_a_layer() {
    let (mut campaign, dataset) = two_stage_setup();

    campaign
        .run_complete(&dataset, FaultModel::DeadSynapse, Some(&["sf1"]), None)
        .unwrap();

    // 2x2x1x1 weight coordinates, row-major over (out, in).
    assert_eq!(campaign.rounds().len(), 4);
    let accuracies: Vec<f32> = campaign.stats().iter().map(|s| s.accuracy()).collect();
    // Killing an already-zero off-diagonal weight is a no-op.
    assert_eq!(accuracies, vec![0.75, 1.0, 1.0, 0.75]);
}

#[test]
fn summary_reflects_rounds_and_results() {
    let (mut campaign, dataset) = two_stage_setup();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadNeuron,
            neuron_site("sf1", 0),
        )])
        .unwrap();
    campaign
        .then_inject(vec![Fault::single(
            FaultModel::DeadNeuron,
            neuron_site("sf2", 0),
        )])
        .unwrap();
    campaign.run(&dataset, None).unwrap();

    let summary = campaign.summary();
    assert_eq!(summary.name, "campaign");
    assert_eq!(summary.layers, vec!["sf1", "sf2"]);
    assert_eq!(summary.rounds.len(), 3);
    assert_eq!(summary.rounds[0].early_layer, None);
    assert_eq!(summary.rounds[1].early_layer.as_deref(), Some("sf1"));
    assert!(!summary.rounds[0].is_out_faulty);
    assert!(!summary.rounds[1].is_out_faulty);
    assert!(summary.rounds[2].is_out_faulty);
    assert_eq!(summary.best_accuracy(), Some(1.0));

    let json = serde_json::to_string(&summary).unwrap();
    let back: CampaignSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back.rounds[1].accuracy, 0.75);
    assert!(back.rounds[2].is_out_faulty);
}

#[test]
fn negative_channel_index_counts_from_the_end() {
    let (mut campaign, dataset) = two_stage_setup();
    // Channel -1 of a 2-channel layer is channel 1.
    campaign
        .inject(
            vec![Fault::single(FaultModel::DeadNeuron, neuron_site("sf1", -1))],
            0,
        )
        .unwrap();

    campaign.run(&dataset, None).unwrap();

    // Killing channel 1 misclassifies only the (0,1) row.
    assert_eq!(campaign.stats()[0].accuracy(), 0.75);
}

#[test]
fn rerun_resets_statistics() {
    let (mut campaign, dataset) = two_stage_setup();
    campaign.run(&dataset, None).unwrap();
    campaign.run(&dataset, None).unwrap();

    // Each run re-derives its accumulators; samples do not double up.
    assert_eq!(campaign.stats()[0].samples, 4);
}
