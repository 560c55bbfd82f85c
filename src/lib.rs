//! CIFAR-10 image classifier training pipeline
//!
//! Loads the CIFAR-10 binary shards into disjoint training and validation
//! sets, builds or restores a layered network, and trains it with minibatch
//! Adam until interrupted. The trained network is persisted as a JSON
//! checkpoint and can be scored for classification accuracy.
//!
//! # Example
//!
//! ```no_run
//! use clasificar::data::cifar;
//! use clasificar::data::SampleSet;
//! use clasificar::net::{FullyConnected, LogSoftmax, Network};
//! use clasificar::optim::Adam;
//! use clasificar::train::{DotCost, GradientTrainer, Interrupter, Sgd, SgdConfig};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let shards = cifar::load_dir("./cifar-10-batches-bin").expect("dataset");
//! let mut shards = shards.into_iter();
//! let training = SampleSet::concat(shards.by_ref().take(5));
//!
//! let mut net = Network::new(vec![
//!     Box::new(FullyConnected::new(3072, 10, &mut rand::rng())),
//!     Box::new(LogSoftmax::new()),
//! ]);
//!
//! let trainer = GradientTrainer::new(Box::new(DotCost), cifar::NUM_CLASSES, true);
//! let mut sgd = Sgd::new(
//!     trainer,
//!     Box::new(Adam::default_params(0.001)),
//!     training,
//!     SgdConfig::default(),
//!     StdRng::from_rng(&mut rand::rng()),
//! );
//!
//! let stop = Interrupter::new();
//! sgd.run(&mut net, &stop).expect("training run");
//! ```

pub mod data;
pub mod error;
pub mod eval;
pub mod io;
pub mod net;
pub mod optim;
pub mod tensor;
pub mod train;

pub use error::{Error, Result};
pub use tensor::Tensor;
