//! Gradient trainer
//!
//! Assembles batches from sample slices, evaluates the cost of a batch, and
//! computes parameter gradients by reverse accumulation through the network.

use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::data::Sample;
use crate::error::{Error, Result};
use crate::net::Network;
use crate::train::{Batch, CostFn};

pub struct GradientTrainer {
    cost: Box<dyn CostFn>,
    num_classes: usize,
    /// When set, parameter gradients and the reported cost are divided by
    /// the batch size, making the step size independent of the batch size.
    average: bool,
    last_cost: f32,
}

impl GradientTrainer {
    pub fn new(cost: Box<dyn CostFn>, num_classes: usize, average: bool) -> Self {
        Self {
            cost,
            num_classes,
            average,
            last_cost: 0.0,
        }
    }

    /// The scalar cost summary from the most recent `gradient` call.
    pub fn last_cost(&self) -> f32 {
        self.last_cost
    }

    /// Stack a sample slice into a batch of inputs and one-hot targets.
    pub fn fetch(&self, samples: &[Arc<Sample>]) -> Result<Batch> {
        if samples.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let in_size = samples[0].image.len();
        let mut inputs = Array2::zeros((samples.len(), in_size));
        let mut targets = Array2::zeros((samples.len(), self.num_classes));
        for (i, sample) in samples.iter().enumerate() {
            if sample.image.len() != in_size {
                return Err(Error::Dataset(format!(
                    "sample {i} has {} values, expected {in_size}",
                    sample.image.len()
                )));
            }
            if sample.label >= self.num_classes {
                return Err(Error::Dataset(format!(
                    "sample {i} label {} out of range",
                    sample.label
                )));
            }
            inputs.row_mut(i).assign(&sample.image);
            targets[[i, sample.label]] = 1.0;
        }
        Ok(Batch::new(inputs, targets))
    }

    /// Per-example cost of a batch under the current parameters.
    ///
    /// Uses evaluation-mode forward, so running statistics are read but
    /// never written.
    pub fn total_cost(&self, net: &mut Network, batch: &Batch) -> Result<Array1<f32>> {
        if batch.size() == 0 {
            return Err(Error::EmptyBatch);
        }
        let output = net.forward(&batch.inputs, false)?;
        Ok(self.cost.cost(&output, &batch.targets))
    }

    /// Compute parameter gradients for a batch and return the scalar cost.
    ///
    /// Runs a training-mode forward pass caching every layer's input, seeds
    /// the output gradient from the cost function, then walks the layers in
    /// reverse. Gradients accumulate into each layer's tensors; callers
    /// zero them between steps.
    pub fn gradient(&mut self, net: &mut Network, batch: &Batch) -> Result<f32> {
        let n = batch.size();
        if n == 0 {
            return Err(Error::EmptyBatch);
        }

        let mut acts = Vec::with_capacity(net.len() + 1);
        acts.push(batch.inputs.clone());
        for layer in net.layers_mut() {
            let out = layer.forward(acts.last().expect("activations start non-empty"), true)?;
            acts.push(out);
        }
        let output = acts.last().expect("activations include the output");

        let costs = self.cost.cost(output, &batch.targets);
        let scale = if self.average { 1.0 / n as f32 } else { 1.0 };

        let mut grad = self.cost.grad(&batch.targets, scale);
        for (layer, input) in net.layers_mut().iter_mut().zip(acts.iter()).rev() {
            grad = layer.backward(input, &grad)?;
        }

        let cost = costs.sum() * scale;
        self.last_cost = cost;
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{FullyConnected, LogSoftmax};
    use crate::train::DotCost;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn sample(values: &[f32], label: usize) -> Arc<Sample> {
        Arc::new(Sample {
            image: arr1(values),
            label,
        })
    }

    fn trainer() -> GradientTrainer {
        GradientTrainer::new(Box::new(DotCost), 2, true)
    }

    fn linear_net() -> Network {
        Network::new(vec![
            Box::new(
                FullyConnected::from_state(2, 2, vec![1.0, -1.0, 0.5, 0.25], vec![0.0, 0.1])
                    .expect("valid state"),
            ),
            Box::new(LogSoftmax::new()),
        ])
    }

    #[test]
    fn test_fetch_stacks_and_one_hot_encodes() {
        let batch = trainer()
            .fetch(&[sample(&[1.0, 2.0], 0), sample(&[3.0, 4.0], 1)])
            .expect("fetch");

        assert_eq!(batch.size(), 2);
        assert_eq!(batch.inputs[[1, 0]], 3.0);
        assert_eq!(batch.targets[[0, 0]], 1.0);
        assert_eq!(batch.targets[[0, 1]], 0.0);
        assert_eq!(batch.targets[[1, 1]], 1.0);
    }

    #[test]
    fn test_fetch_empty_slice_is_an_error() {
        assert!(matches!(trainer().fetch(&[]), Err(Error::EmptyBatch)));
    }

    #[test]
    fn test_fetch_bad_label_is_an_error() {
        assert!(trainer().fetch(&[sample(&[1.0], 5)]).is_err());
    }

    #[test]
    fn test_total_cost_is_deterministic() {
        let t = trainer();
        let mut net = linear_net();
        let batch = t
            .fetch(&[sample(&[1.0, -0.5], 0), sample(&[0.2, 0.8], 1)])
            .expect("fetch");

        let a = t.total_cost(&mut net, &batch).expect("cost");
        let b = t.total_cost(&mut net, &batch).expect("cost");
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_gradient_reports_mean_cost_in_average_mode() {
        let mut averaged = GradientTrainer::new(Box::new(DotCost), 2, true);
        let mut summed = GradientTrainer::new(Box::new(DotCost), 2, false);

        let samples = [sample(&[1.0, -0.5], 0), sample(&[0.2, 0.8], 1)];
        let batch = averaged.fetch(&samples).expect("fetch");

        let mut net = linear_net();
        let mean = averaged.gradient(&mut net, &batch).expect("gradient");
        let mut net = linear_net();
        let sum = summed.gradient(&mut net, &batch).expect("gradient");

        assert_abs_diff_eq!(mean * 2.0, sum, epsilon = 1e-5);
        assert_abs_diff_eq!(averaged.last_cost(), mean, epsilon = 1e-7);
    }

    #[test]
    fn test_gradient_populates_every_trainable_tensor() {
        let mut t = trainer();
        let mut net = linear_net();
        let batch = t.fetch(&[sample(&[1.0, 2.0], 1)]).expect("fetch");

        t.gradient(&mut net, &batch).expect("gradient");
        for param in net.params() {
            assert!(param.grad().is_some());
        }
    }

    #[test]
    fn test_gradient_on_empty_batch_is_an_error() {
        let mut t = trainer();
        let mut net = linear_net();
        let batch = Batch::new(Array2::zeros((0, 2)), Array2::zeros((0, 2)));
        assert!(matches!(
            t.gradient(&mut net, &batch),
            Err(Error::EmptyBatch)
        ));
    }
}
