//! Per-channel batch normalization
//!
//! Rows are flattened `(row, col, channel)` feature maps, so the channel of
//! a flat index is `index % channels` and the row width must be a multiple
//! of the channel count. Training-mode forward normalizes with the batch's
//! own statistics and folds an exponential-moving-average update of the
//! running statistics into the same call; evaluation-mode forward uses the
//! running statistics verbatim.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::io::model::LayerState;
use crate::net::Layer;
use crate::tensor::Tensor;

const EPSILON: f32 = 1e-5;
const STATS_MOMENTUM: f32 = 0.1;

pub struct BatchNorm {
    channels: usize,
    scale: Tensor,
    shift: Tensor,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
    // Cached from the last training-mode forward, consumed by backward.
    cache: Option<Cache>,
}

struct Cache {
    x_hat: Array2<f32>,
    inv_std: Array1<f32>,
}

impl BatchNorm {
    /// Create a layer with identity scale, zero shift, and unit running
    /// variance.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            scale: Tensor::from_vec(vec![1.0; channels], true),
            shift: Tensor::zeros(channels, true),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            cache: None,
        }
    }

    /// Rebuild a layer from checkpointed parameters and running statistics.
    pub fn from_state(
        channels: usize,
        scale: Vec<f32>,
        shift: Vec<f32>,
        running_mean: Vec<f32>,
        running_var: Vec<f32>,
    ) -> Result<Self> {
        if [&scale, &shift, &running_mean, &running_var]
            .iter()
            .any(|v| v.len() != channels)
        {
            return Err(Error::Serialization(format!(
                "batch norm: parameter lengths do not match {channels} channels"
            )));
        }
        Ok(Self {
            channels,
            scale: Tensor::from_vec(scale, true),
            shift: Tensor::from_vec(shift, true),
            running_mean: Array1::from(running_mean),
            running_var: Array1::from(running_var),
            cache: None,
        })
    }

    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    pub fn shift(&self) -> &Tensor {
        &self.shift
    }

    pub fn running_mean(&self) -> &Array1<f32> {
        &self.running_mean
    }

    pub fn running_var(&self) -> &Array1<f32> {
        &self.running_var
    }

    fn check_width(&self, cols: usize) -> Result<()> {
        if cols == 0 || cols % self.channels != 0 {
            return Err(Error::ShapeMismatch {
                expected: self.channels,
                got: cols,
            });
        }
        Ok(())
    }

    /// Per-channel mean and biased variance over every element of the batch.
    fn batch_stats(&self, input: &Array2<f32>) -> (Array1<f32>, Array1<f32>) {
        let n = (input.nrows() * input.ncols() / self.channels) as f32;
        let mut mean = Array1::zeros(self.channels);
        let mut var = Array1::zeros(self.channels);

        for row in input.rows() {
            for (j, &x) in row.iter().enumerate() {
                mean[j % self.channels] += x;
            }
        }
        mean /= n;

        for row in input.rows() {
            for (j, &x) in row.iter().enumerate() {
                let d = x - mean[j % self.channels];
                var[j % self.channels] += d * d;
            }
        }
        var /= n;

        (mean, var)
    }
}

impl Layer for BatchNorm {
    fn forward(&mut self, input: &Array2<f32>, train: bool) -> Result<Array2<f32>> {
        self.check_width(input.ncols())?;

        let (mean, var) = if train {
            let (mean, var) = self.batch_stats(input);
            self.running_mean = &self.running_mean * (1.0 - STATS_MOMENTUM) + &mean * STATS_MOMENTUM;
            self.running_var = &self.running_var * (1.0 - STATS_MOMENTUM) + &var * STATS_MOMENTUM;
            (mean, var)
        } else {
            (self.running_mean.clone(), self.running_var.clone())
        };

        let inv_std = var.mapv(|v| 1.0 / (v + EPSILON).sqrt());
        let scale = self.scale.data();
        let shift = self.shift.data();

        let mut x_hat = input.clone();
        let mut out = Array2::zeros(input.dim());
        for b in 0..input.nrows() {
            for j in 0..input.ncols() {
                let c = j % self.channels;
                let norm = (input[[b, j]] - mean[c]) * inv_std[c];
                x_hat[[b, j]] = norm;
                out[[b, j]] = scale[c] * norm + shift[c];
            }
        }

        if train {
            self.cache = Some(Cache { x_hat, inv_std });
        }
        Ok(out)
    }

    fn backward(&mut self, _input: &Array2<f32>, out_grad: &Array2<f32>) -> Result<Array2<f32>> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| Error::Config("batch norm backward before training forward".into()))?;
        if cache.x_hat.dim() != out_grad.dim() {
            return Err(Error::ShapeMismatch {
                expected: cache.x_hat.ncols(),
                got: out_grad.ncols(),
            });
        }

        let n = (out_grad.nrows() * out_grad.ncols() / self.channels) as f32;
        let mut sum_dy = Array1::<f32>::zeros(self.channels);
        let mut sum_dy_xhat = Array1::<f32>::zeros(self.channels);
        for b in 0..out_grad.nrows() {
            for j in 0..out_grad.ncols() {
                let c = j % self.channels;
                sum_dy[c] += out_grad[[b, j]];
                sum_dy_xhat[c] += out_grad[[b, j]] * cache.x_hat[[b, j]];
            }
        }

        *self.scale.grad_mut() += &sum_dy_xhat;
        *self.shift.grad_mut() += &sum_dy;

        let scale = self.scale.data();
        let mut in_grad = Array2::zeros(out_grad.dim());
        for b in 0..out_grad.nrows() {
            for j in 0..out_grad.ncols() {
                let c = j % self.channels;
                let centered =
                    out_grad[[b, j]] - sum_dy[c] / n - cache.x_hat[[b, j]] * sum_dy_xhat[c] / n;
                in_grad[[b, j]] = scale[c] * cache.inv_std[c] * centered;
            }
        }
        Ok(in_grad)
    }

    fn params(&self) -> Vec<Tensor> {
        vec![self.scale.clone(), self.shift.clone()]
    }

    fn state(&self) -> LayerState {
        LayerState::BatchNorm {
            channels: self.channels,
            scale: self.scale.data().to_vec(),
            shift: self.shift.data().to_vec(),
            running_mean: self.running_mean.to_vec(),
            running_var: self.running_var.to_vec(),
        }
    }

    fn name(&self) -> &'static str {
        "batch_norm"
    }
}
