//! Status callbacks for the training loop

use log::info;
use rand::rngs::StdRng;

use crate::data::SampleSet;
use crate::error::Result;
use crate::net::Network;
use crate::train::GradientTrainer;

/// Training state handed to a status callback.
pub struct StatusContext<'a> {
    /// Completed iteration count.
    pub iteration: usize,
    /// Scalar cost of the iteration's training batch.
    pub train_cost: f32,
    pub net: &'a mut Network,
    pub trainer: &'a GradientTrainer,
}

/// Invoked by the driver at its configured iteration cadence.
///
/// An error returned here aborts the training loop.
pub trait StatusCallback {
    fn on_status(&mut self, ctx: &mut StatusContext<'_>) -> Result<()>;
}

/// The standard status callback: reshuffles the validation set, draws a
/// fixed-size slice, and logs the iteration number, training cost, and
/// validation cost sum.
pub struct ValidationMonitor {
    validation: SampleSet,
    batch_size: usize,
    rng: StdRng,
}

impl ValidationMonitor {
    pub fn new(validation: SampleSet, batch_size: usize, rng: StdRng) -> Self {
        Self {
            validation,
            batch_size,
            rng,
        }
    }
}

impl StatusCallback for ValidationMonitor {
    fn on_status(&mut self, ctx: &mut StatusContext<'_>) -> Result<()> {
        self.validation.shuffle(&mut self.rng);
        let end = self.batch_size.min(self.validation.len());
        let batch = ctx.trainer.fetch(self.validation.slice(0, end))?;
        let validation_cost: f32 = ctx.trainer.total_cost(ctx.net, &batch)?.sum();

        info!(
            "iter {}: cost={:.6} validation={:.6}",
            ctx.iteration, ctx.train_cost, validation_cost
        );
        Ok(())
    }
}
