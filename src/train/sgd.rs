//! Minibatch gradient descent driver
//!
//! The driver runs an unbounded stream of minibatches: a sequential sweep
//! through a shuffled order of the training set, reshuffling and restarting
//! whenever fewer than a full batch remains. There is no epoch boundary.
//!
//! Conceptually the loop moves through three states: *Running* (drawing and
//! applying batches), *Stopping* (the interrupter has fired; the in-flight
//! iteration finishes normally), and *Terminated* (control returned to the
//! caller). Cancellation is cooperative: the flag is polled at iteration
//! boundaries only, never mid-batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::data::SampleSet;
use crate::error::{Error, Result};
use crate::net::Network;
use crate::optim::Optimizer;
use crate::train::{GradientTrainer, StatusCallback, StatusContext};

/// A cloneable handle that asks the training loop to stop.
#[derive(Clone, Default)]
pub struct Interrupter {
    state: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify the loop that it should stop after the current iteration.
    pub fn stop(&self) {
        self.state.store(true, Ordering::Relaxed);
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.state.store(false, Ordering::Relaxed);
    }

    /// True if `stop` has been called.
    pub fn should_stop(&self) -> bool {
        self.state.load(Ordering::Relaxed)
    }
}

/// Driver configuration.
pub struct SgdConfig {
    /// Training minibatch size.
    pub batch_size: usize,
    /// Invoke the status callback every this many iterations.
    pub status_every: usize,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            status_every: 1,
        }
    }
}

/// The SGD driver: fetch, gradient, optimizer step, parameter update.
pub struct Sgd {
    trainer: GradientTrainer,
    optimizer: Box<dyn Optimizer>,
    samples: SampleSet,
    config: SgdConfig,
    callback: Option<Box<dyn StatusCallback>>,
    rng: StdRng,
}

impl Sgd {
    pub fn new(
        trainer: GradientTrainer,
        optimizer: Box<dyn Optimizer>,
        samples: SampleSet,
        config: SgdConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            trainer,
            optimizer,
            samples,
            config,
            callback: None,
            rng,
        }
    }

    pub fn with_callback(mut self, callback: Box<dyn StatusCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn trainer(&self) -> &GradientTrainer {
        &self.trainer
    }

    /// Run until the interrupter fires.
    ///
    /// Returns the number of completed iterations; the network reflects
    /// exactly that many parameter updates. Any numeric or shape error
    /// aborts the loop immediately.
    pub fn run(&mut self, net: &mut Network, stop: &Interrupter) -> Result<usize> {
        if self.config.batch_size == 0 {
            return Err(Error::Config("batch size must be positive".into()));
        }
        if self.config.batch_size > self.samples.len() {
            return Err(Error::Config(format!(
                "batch size {} exceeds the {} training samples",
                self.config.batch_size,
                self.samples.len()
            )));
        }
        if self.config.status_every == 0 {
            return Err(Error::Config("status cadence must be positive".into()));
        }

        let mut params = net.params();
        let mut iterations = 0usize;
        let mut cursor = 0usize;
        self.samples.shuffle(&mut self.rng);

        while !stop.should_stop() {
            if cursor + self.config.batch_size > self.samples.len() {
                self.samples.shuffle(&mut self.rng);
                cursor = 0;
            }

            let batch = self
                .trainer
                .fetch(self.samples.slice(cursor, cursor + self.config.batch_size))?;
            cursor += self.config.batch_size;

            self.optimizer.zero_grad(&mut params);
            let cost = self.trainer.gradient(net, &batch)?;
            self.optimizer.step(&mut params);
            iterations += 1;

            if iterations % self.config.status_every == 0 {
                if let Some(callback) = self.callback.as_mut() {
                    callback.on_status(&mut StatusContext {
                        iteration: iterations,
                        train_cost: cost,
                        net: &mut *net,
                        trainer: &self.trainer,
                    })?;
                }
            }
        }

        Ok(iterations)
    }
}
