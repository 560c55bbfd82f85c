//! Cost functions

use ndarray::{Array1, Array2};

/// Scalar-per-example loss computed from network output and expected output.
pub trait CostFn {
    /// Per-example cost for a batch, one entry per row.
    fn cost(&self, output: &Array2<f32>, targets: &Array2<f32>) -> Array1<f32>;

    /// Gradient of the summed cost with respect to the network output,
    /// multiplied by `scale`.
    fn grad(&self, targets: &Array2<f32>, scale: f32) -> Array2<f32>;

    fn name(&self) -> &'static str;
}

/// Negative dot product of output and one-hot target per example.
///
/// When the output rows are log-probabilities this equals cross-entropy.
pub struct DotCost;

impl CostFn for DotCost {
    fn cost(&self, output: &Array2<f32>, targets: &Array2<f32>) -> Array1<f32> {
        assert_eq!(
            output.dim(),
            targets.dim(),
            "output and targets must have the same shape"
        );
        Array1::from_iter(
            output
                .rows()
                .into_iter()
                .zip(targets.rows())
                .map(|(o, t)| -o.dot(&t)),
        )
    }

    fn grad(&self, targets: &Array2<f32>, scale: f32) -> Array2<f32> {
        targets * (-scale)
    }

    fn name(&self) -> &'static str {
        "dot"
    }
}
