//! clasificar CLI
//!
//! Trains a CIFAR-10 classifier on the binary batch files and reports
//! validation accuracy.
//!
//! ```bash
//! # Train (ctrl+c to stop and save)
//! clasificar --samples ./cifar-10-batches-bin
//!
//! # Resume from a checkpoint with a different step size
//! clasificar --samples ./cifar-10-batches-bin --net out_net.json --step 0.0005
//!
//! # Score the checkpoint on the validation shard
//! clasificar --samples ./cifar-10-batches-bin --successrate
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use clasificar::data::{cifar, SampleSet};
use clasificar::error::{Error, Result};
use clasificar::eval::success_rate;
use clasificar::io::{load_network, save_network};
use clasificar::net::{BatchNorm, FullyConnected, LogSoftmax, Network, SlidingKernel};
use clasificar::optim::Adam;
use clasificar::train::{
    DotCost, GradientTrainer, Interrupter, Sgd, SgdConfig, ValidationMonitor,
};

#[derive(Parser)]
#[command(
    name = "clasificar",
    about = "Train a CIFAR-10 image classifier with minibatch Adam"
)]
struct Cli {
    /// Directory containing the CIFAR-10 binary batch files
    #[arg(long)]
    samples: PathBuf,

    /// Network checkpoint path
    #[arg(long, default_value = "out_net.json")]
    net: PathBuf,

    /// Constant learning rate
    #[arg(long, default_value_t = 0.001)]
    step: f32,

    /// Batch size for validation slices and accuracy evaluation
    #[arg(long, default_value_t = 64)]
    batch: usize,

    /// Print the validation success rate instead of training
    #[arg(long)]
    successrate: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut shards = cifar::load_dir(&cli.samples)?.into_iter();
    let training = SampleSet::concat(shards.by_ref().take(5));
    let validation = SampleSet::concat(shards);

    let mut net = match load_network(&cli.net) {
        Ok(net) => {
            info!("using existing network");
            net
        }
        Err(_) => {
            info!("creating new network...");
            fresh_network()
        }
    };

    let trainer = GradientTrainer::new(Box::new(DotCost), cifar::NUM_CLASSES, true);

    if cli.successrate {
        info!("computing success rate...");
        let rate = success_rate(&mut net, &trainer, &validation, cli.batch)?;
        info!("got {rate:.3}%");
        return Ok(());
    }

    let stop = Interrupter::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.stop())
            .map_err(|e| Error::Config(format!("installing ctrl+c handler: {e}")))?;
    }

    info!("setting up...");
    let monitor = ValidationMonitor::new(validation, cli.batch, StdRng::from_rng(&mut rand::rng()));
    let mut sgd = Sgd::new(
        trainer,
        Box::new(Adam::default_params(cli.step)),
        training,
        SgdConfig::default(),
        StdRng::from_rng(&mut rand::rng()),
    )
    .with_callback(Box::new(monitor));

    info!("press ctrl+c once to stop...");
    let iterations = sgd.run(&mut net, &stop)?;

    info!("saving network after {iterations} iterations...");
    save_network(&cli.net, &net)?;
    Ok(())
}

/// The fixed architecture used when no checkpoint exists.
fn fresh_network() -> Network {
    let mut rng = rand::rng();
    Network::new(vec![
        Box::new(SlidingKernel::new(32, 32, 3, 3, 3, 8, 2, 2, &mut rng)),
        Box::new(BatchNorm::new(8)),
        Box::new(SlidingKernel::new(15, 15, 8, 4, 4, 8, 1, 1, &mut rng)),
        Box::new(BatchNorm::new(8)),
        Box::new(SlidingKernel::new(12, 12, 8, 3, 3, 16, 2, 2, &mut rng)),
        Box::new(BatchNorm::new(16)),
        Box::new(FullyConnected::new(16 * 5 * 5, 10, &mut rng)),
        Box::new(LogSoftmax::new()),
    ])
}
