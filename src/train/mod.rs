//! Minibatch training pipeline
//!
//! This module provides the training half of the pipeline:
//! - [`Batch`] — stacked inputs and one-hot targets for one step
//! - [`DotCost`] — the log-probability dot-product cost
//! - [`GradientTrainer`] — batch assembly, cost, and reverse accumulation
//! - [`Sgd`] — the minibatch driver with status reporting and cooperative
//!   interruption

mod batch;
mod callback;
mod cost;
mod sgd;
mod trainer;

pub use batch::Batch;
pub use callback::{StatusCallback, StatusContext, ValidationMonitor};
pub use cost::{CostFn, DotCost};
pub use sgd::{Interrupter, Sgd, SgdConfig};
pub use trainer::GradientTrainer;
