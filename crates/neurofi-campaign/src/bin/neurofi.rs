//! CLI binary for NeuroFI fault-injection campaigns.
//!
//! Runs exhaustive single-site sensitivity sweeps over a synthetic spiking
//! classifier and reports per-round accuracy.
//!
//! # Usage
//!
//! ```bash
//! # Sweep dead-neuron faults over every neuron of a 4-8-2 network
//! neurofi sweep --layers 4,8,2 --model dead-neuron
//!
//! # Sweep stuck-at faults over every synapse, save results as JSON
//! neurofi sweep --model saturated-synapse=10.0 --output results.json
//!
//! # Bit-flip sweep on a specific layer with a fixed seed
//! neurofi sweep --model bitflip-synapse=30 --layer sf2 --seed 7
//! ```
//!
//! The network is synthetic: dense layers with seeded random weights, and
//! a dataset whose labels are the golden network's own predictions, so the
//! golden baseline is 100% accurate and every accuracy drop in the report
//! is attributable to the injected fault.

use clap::{Parser, Subcommand};
use neurofi_campaign::{Campaign, CampaignConfig, CampaignSummary};
use neurofi_fault::FaultModel;
use neurofi_snn::{predict_classes, Batch, Dataset, Layer, Network, NeuronModel, SpikeCountLoss, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;

#[derive(Parser)]
#[command(name = "neurofi")]
#[command(about = "Fault-injection campaigns for spiking networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an exhaustive single-site fault sweep.
    Sweep {
        /// Fault model: dead-neuron, saturated-neuron=V, drifted-neuron=V,
        /// bitflip-output=BIT, dead-synapse, saturated-synapse=V,
        /// drifted-synapse=V, bitflip-synapse=BIT, perturbed-synapse=FACTOR,
        /// or parametric=PARAM:SCALE.
        #[arg(short, long, default_value = "dead-neuron")]
        model: String,

        /// Channel widths of the dense layers, comma separated.
        #[arg(short, long, default_value = "4,4,2")]
        layers: String,

        /// Restrict the sweep to one layer (sf1, sf2, ...).
        #[arg(long)]
        layer: Option<String>,

        /// Random seed for weights, dataset, and fault definition.
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Dataset batches.
        #[arg(short, long, default_value = "8")]
        batches: usize,

        /// Samples per batch.
        #[arg(long, default_value = "16")]
        batch_size: usize,

        /// Write the campaign summary as JSON to this path.
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            model,
            layers,
            layer,
            seed,
            batches,
            batch_size,
            output,
        } => cmd_sweep(model, layers, layer, seed, batches, batch_size, output),
    }
}

fn cmd_sweep(
    model: String,
    layers: String,
    layer: Option<String>,
    seed: u64,
    batches: usize,
    batch_size: usize,
    output: Option<String>,
) {
    let fault_model = parse_model(&model);
    let widths = parse_widths(&layers);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut net = build_network(&widths, &mut rng);
    let dataset = build_dataset(&mut net, widths[0], batches, batch_size, &mut rng);

    let config = CampaignConfig {
        name: format!("sweep-{model}"),
        seed,
        ..CampaignConfig::default()
    };
    let mut campaign = match Campaign::new(net, (widths[0], 1, 1), config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to set up the campaign: {e}");
            std::process::exit(1);
        }
    };

    let layer_names = layer.as_deref().map(|l| vec![l]);
    if let Err(e) = campaign.run_complete(
        &dataset,
        fault_model,
        layer_names.as_deref(),
        Some(&SpikeCountLoss),
    ) {
        eprintln!("Error: campaign failed: {e}");
        std::process::exit(1);
    }

    let summary = CampaignSummary::of(&campaign);
    print_report(&summary);

    if let Some(path) = output {
        let json = match serde_json::to_string_pretty(&summary) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("Error: failed to serialize summary: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = fs::write(&path, json) {
            eprintln!("Error: failed to write {path}: {e}");
            std::process::exit(1);
        }
        println!("Summary written to {path}");
    }
}

fn parse_model(s: &str) -> FaultModel {
    let (kind, arg) = match s.split_once('=') {
        Some((k, a)) => (k, Some(a)),
        None => (s, None),
    };

    let float = |a: Option<&str>, what: &str| -> f32 {
        match a.and_then(|a| a.parse().ok()) {
            Some(v) => v,
            None => {
                eprintln!("Error: {kind} needs a numeric {what}, e.g. {kind}=1.5");
                std::process::exit(1);
            }
        }
    };
    let bit = |a: Option<&str>| -> u8 {
        match a.and_then(|a| a.parse().ok()) {
            Some(v) if v < 32 => v,
            _ => {
                eprintln!("Error: {kind} needs a bit position 0..32, e.g. {kind}=30");
                std::process::exit(1);
            }
        }
    };

    match kind {
        "dead-neuron" => FaultModel::DeadNeuron,
        "saturated-neuron" => FaultModel::SaturatedNeuron(float(arg, "value")),
        "drifted-neuron" => FaultModel::DriftedNeuron(float(arg, "offset")),
        "bitflip-output" => FaultModel::BitflippedOutput(bit(arg)),
        "dead-synapse" => FaultModel::DeadSynapse,
        "saturated-synapse" => FaultModel::SaturatedSynapse(float(arg, "value")),
        "drifted-synapse" => FaultModel::DriftedSynapse(float(arg, "offset")),
        "bitflip-synapse" => FaultModel::BitflippedSynapse(bit(arg)),
        "perturbed-synapse" => FaultModel::PerturbedSynapse(float(arg, "factor")),
        "parametric" => match arg.and_then(|a| a.split_once(':')) {
            Some((param, scale)) => match scale.parse() {
                Ok(scale) => FaultModel::ParametricNeuron {
                    param: param.to_string(),
                    scale,
                },
                Err(_) => {
                    eprintln!("Error: parametric needs PARAM:SCALE, e.g. parametric=theta:0.5");
                    std::process::exit(1);
                }
            },
            None => {
                eprintln!("Error: parametric needs PARAM:SCALE, e.g. parametric=theta:0.5");
                std::process::exit(1);
            }
        },
        other => {
            eprintln!("Error: unknown fault model '{other}'");
            std::process::exit(1);
        }
    }
}

fn parse_widths(s: &str) -> Vec<usize> {
    let widths: Vec<usize> = s
        .split(',')
        .filter_map(|w| w.trim().parse().ok())
        .filter(|&w| w > 0)
        .collect();
    if widths.len() < 2 {
        eprintln!("Error: --layers needs at least two comma-separated widths, e.g. 4,4,2");
        std::process::exit(1);
    }
    widths
}

/// Dense chain sf1..sfN with seeded random weights in [-1, 1].
fn build_network(widths: &[usize], rng: &mut ChaCha8Rng) -> Network {
    let layers = widths
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let (fan_in, fan_out) = (w[0], w[1]);
            let mut weight = Tensor::zeros((fan_out, fan_in, 1, 1));
            for v in weight.iter_mut() {
                *v = rng.gen_range(-1.0..1.0);
            }
            Layer::dense(format!("sf{}", i + 1), weight)
        })
        .collect();
    Network::new(layers, NeuronModel::default())
}

/// Random binary spike inputs, labelled by the golden network itself.
fn build_dataset(
    net: &mut Network,
    channels: usize,
    batches: usize,
    batch_size: usize,
    rng: &mut ChaCha8Rng,
) -> Dataset {
    let mut out = Vec::with_capacity(batches);
    for _ in 0..batches {
        let mut input = Tensor::zeros((batch_size, channels, 1, 1));
        for v in input.iter_mut() {
            *v = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
        }
        let target = match net.forward(&input) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error: reference pass failed: {e}");
                std::process::exit(1);
            }
        };
        let labels = predict_classes(&target);
        out.push(Batch {
            input,
            target,
            labels,
        });
    }
    Dataset::new(out)
}

fn print_report(summary: &CampaignSummary) {
    println!("Campaign: {}", summary.name);
    println!(
        "Layers:   {} | rounds: {} | {:.2}s",
        summary.layers.join(" -> "),
        summary.rounds.len(),
        summary.duration_secs
    );

    let mut worst: Vec<&neurofi_campaign::RoundSummary> =
        summary.rounds.iter().filter(|r| r.samples > 0).collect();
    worst.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));

    println!("Most damaging rounds:");
    for round in worst.iter().take(10) {
        println!(
            "  {:6.2}%  loss {:8.3}  {}",
            round.accuracy * 100.0,
            round.mean_loss,
            round.faults.join(" + ")
        );
    }
}
