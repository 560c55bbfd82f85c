//! Dense linear layer

use ndarray::{linalg, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};
use crate::io::model::LayerState;
use crate::net::Layer;
use crate::tensor::Tensor;

/// Fully connected layer: `y = x W + b` with `W` of shape
/// `(in_size, out_size)` stored row-major in a flat tensor.
pub struct FullyConnected {
    in_size: usize,
    out_size: usize,
    weights: Tensor,
    biases: Tensor,
}

impl FullyConnected {
    /// Create a layer with normally distributed weights scaled by
    /// `1/sqrt(in_size)` and zero biases.
    pub fn new<R: Rng>(in_size: usize, out_size: usize, rng: &mut R) -> Self {
        let std = (1.0 / in_size as f32).sqrt();
        let dist = Normal::new(0.0, std).expect("finite standard deviation");
        let weights = (0..in_size * out_size)
            .map(|_| dist.sample(&mut *rng))
            .collect();
        Self {
            in_size,
            out_size,
            weights: Tensor::from_vec(weights, true),
            biases: Tensor::zeros(out_size, true),
        }
    }

    /// Create a layer with all-zero parameters.
    pub fn zeroed(in_size: usize, out_size: usize) -> Self {
        Self {
            in_size,
            out_size,
            weights: Tensor::zeros(in_size * out_size, true),
            biases: Tensor::zeros(out_size, true),
        }
    }

    /// Rebuild a layer from checkpointed parameters.
    pub fn from_state(
        in_size: usize,
        out_size: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        if weights.len() != in_size * out_size || biases.len() != out_size {
            return Err(Error::Serialization(format!(
                "fully connected {in_size}x{out_size}: bad parameter lengths {} and {}",
                weights.len(),
                biases.len()
            )));
        }
        Ok(Self {
            in_size,
            out_size,
            weights: Tensor::from_vec(weights, true),
            biases: Tensor::from_vec(biases, true),
        })
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    fn check_cols(&self, got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(Error::ShapeMismatch { expected, got });
        }
        Ok(())
    }
}

impl Layer for FullyConnected {
    fn forward(&mut self, input: &Array2<f32>, _train: bool) -> Result<Array2<f32>> {
        self.check_cols(input.ncols(), self.in_size)?;

        let data = self.weights.data();
        let w = ArrayView2::from_shape(
            (self.in_size, self.out_size),
            data.as_slice().expect("weight buffer is contiguous"),
        )
        .expect("weight buffer matches layer shape");

        let mut out = Array2::zeros((input.nrows(), self.out_size));
        linalg::general_mat_mul(1.0, input, &w, 0.0, &mut out);

        let biases = self.biases.data();
        let b = ArrayView1::from(biases.as_slice().expect("bias buffer is contiguous"));
        out += &b;
        Ok(out)
    }

    fn backward(&mut self, input: &Array2<f32>, out_grad: &Array2<f32>) -> Result<Array2<f32>> {
        self.check_cols(input.ncols(), self.in_size)?;
        self.check_cols(out_grad.ncols(), self.out_size)?;

        // dW += x^T d, written straight into the shared gradient buffer.
        {
            let mut grad = self.weights.grad_mut();
            let mut dw = ArrayViewMut2::from_shape(
                (self.in_size, self.out_size),
                grad.as_slice_mut().expect("gradient buffer is contiguous"),
            )
            .expect("gradient buffer matches layer shape");
            linalg::general_mat_mul(1.0, &input.t(), out_grad, 1.0, &mut dw);
        }

        // db += column sums of d.
        *self.biases.grad_mut() += &out_grad.sum_axis(Axis(0));

        // dX = d W^T.
        let data = self.weights.data();
        let w = ArrayView2::from_shape(
            (self.in_size, self.out_size),
            data.as_slice().expect("weight buffer is contiguous"),
        )
        .expect("weight buffer matches layer shape");
        let mut in_grad = Array2::zeros((out_grad.nrows(), self.in_size));
        linalg::general_mat_mul(1.0, out_grad, &w.t(), 0.0, &mut in_grad);
        Ok(in_grad)
    }

    fn params(&self) -> Vec<Tensor> {
        vec![self.weights.clone(), self.biases.clone()]
    }

    fn state(&self) -> LayerState {
        LayerState::FullyConnected {
            in_size: self.in_size,
            out_size: self.out_size,
            weights: self.weights.data().to_vec(),
            biases: self.biases.data().to_vec(),
        }
    }

    fn name(&self) -> &'static str {
        "fully_connected"
    }
}
