//! Optimizer trait

use crate::tensor::Tensor;

/// Trait for optimization algorithms.
///
/// An optimizer consumes the gradients accumulated on `params` and applies a
/// scaled update to the parameter values in place. It assumes exclusive
/// access to the parameters for the duration of a step.
pub trait Optimizer {
    /// Perform a single optimization step over the parameter sequence.
    fn step(&mut self, params: &mut [Tensor]);

    /// Drop all accumulated gradients.
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get the learning rate.
    fn lr(&self) -> f32;

    /// Set the learning rate.
    fn set_lr(&mut self, lr: f32);
}
