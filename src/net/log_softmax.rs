//! Row-wise log-softmax activation

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::io::model::LayerState;
use crate::net::Layer;
use crate::tensor::Tensor;

/// Parameter-free normalizing activation producing log-probabilities.
///
/// Each row is shifted by its maximum before exponentiation, the same
/// numerically stable form as a max-shifted softmax.
pub struct LogSoftmax {
    // Output of the last training-mode forward, consumed by backward.
    cache: Option<Array2<f32>>,
}

impl LogSoftmax {
    pub fn new() -> Self {
        Self { cache: None }
    }
}

impl Default for LogSoftmax {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for LogSoftmax {
    fn forward(&mut self, input: &Array2<f32>, train: bool) -> Result<Array2<f32>> {
        let mut out = input.clone();
        for mut row in out.rows_mut() {
            let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln();
            row.mapv_inplace(|v| v - max - log_sum);
        }
        if train {
            self.cache = Some(out.clone());
        }
        Ok(out)
    }

    fn backward(&mut self, _input: &Array2<f32>, out_grad: &Array2<f32>) -> Result<Array2<f32>> {
        let output = self
            .cache
            .as_ref()
            .ok_or_else(|| Error::Config("log softmax backward before training forward".into()))?;
        if output.dim() != out_grad.dim() {
            return Err(Error::ShapeMismatch {
                expected: output.ncols(),
                got: out_grad.ncols(),
            });
        }

        // d(in) = d(out) - softmax(in) * sum(d(out)) per row.
        let mut in_grad = out_grad.clone();
        for (mut grad_row, out_row) in in_grad.rows_mut().into_iter().zip(output.rows()) {
            let total: f32 = grad_row.sum();
            let probs: Array1<f32> = out_row.mapv(f32::exp);
            grad_row.zip_mut_with(&probs, |g, &p| *g -= p * total);
        }
        Ok(in_grad)
    }

    fn state(&self) -> LayerState {
        LayerState::LogSoftmax
    }

    fn name(&self) -> &'static str {
        "log_softmax"
    }
}
