//! Strided local-receptive-field layer
//!
//! Applies a bank of trainable kernels to every stride-aligned window of the
//! input image. Rows are flattened `(row, col, channel)` images; kernels are
//! stored `(out_channel, kernel_row, kernel_col, in_channel)`. No padding and
//! no bias; output spatial dims are `(in - kernel) / stride + 1` per axis.

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};
use crate::io::model::LayerState;
use crate::net::Layer;
use crate::tensor::Tensor;

pub struct SlidingKernel {
    in_width: usize,
    in_height: usize,
    in_depth: usize,
    kernel_width: usize,
    kernel_height: usize,
    out_depth: usize,
    stride_x: usize,
    stride_y: usize,
    weights: Tensor,
}

impl SlidingKernel {
    /// Create a layer with normally distributed kernel weights scaled by the
    /// reciprocal square root of the receptive-field size.
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng>(
        in_width: usize,
        in_height: usize,
        in_depth: usize,
        kernel_width: usize,
        kernel_height: usize,
        out_depth: usize,
        stride_x: usize,
        stride_y: usize,
        rng: &mut R,
    ) -> Self {
        let field = kernel_width * kernel_height * in_depth;
        let dist = Normal::new(0.0, (1.0 / field as f32).sqrt()).expect("finite standard deviation");
        let weights = (0..out_depth * field)
            .map(|_| dist.sample(&mut *rng))
            .collect();
        Self::with_weights(
            in_width,
            in_height,
            in_depth,
            kernel_width,
            kernel_height,
            out_depth,
            stride_x,
            stride_y,
            Tensor::from_vec(weights, true),
        )
    }

    /// Rebuild a layer from checkpointed kernel weights.
    #[allow(clippy::too_many_arguments)]
    pub fn from_state(
        in_width: usize,
        in_height: usize,
        in_depth: usize,
        kernel_width: usize,
        kernel_height: usize,
        out_depth: usize,
        stride_x: usize,
        stride_y: usize,
        weights: Vec<f32>,
    ) -> Result<Self> {
        let expected = out_depth * kernel_height * kernel_width * in_depth;
        if weights.len() != expected {
            return Err(Error::Serialization(format!(
                "sliding kernel: expected {expected} weights, got {}",
                weights.len()
            )));
        }
        Ok(Self::with_weights(
            in_width,
            in_height,
            in_depth,
            kernel_width,
            kernel_height,
            out_depth,
            stride_x,
            stride_y,
            Tensor::from_vec(weights, true),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn with_weights(
        in_width: usize,
        in_height: usize,
        in_depth: usize,
        kernel_width: usize,
        kernel_height: usize,
        out_depth: usize,
        stride_x: usize,
        stride_y: usize,
        weights: Tensor,
    ) -> Self {
        assert!(stride_x > 0 && stride_y > 0, "strides must be positive");
        assert!(
            kernel_width <= in_width && kernel_height <= in_height,
            "kernel must fit inside the input"
        );
        Self {
            in_width,
            in_height,
            in_depth,
            kernel_width,
            kernel_height,
            out_depth,
            stride_x,
            stride_y,
            weights,
        }
    }

    pub fn out_width(&self) -> usize {
        (self.in_width - self.kernel_width) / self.stride_x + 1
    }

    pub fn out_height(&self) -> usize {
        (self.in_height - self.kernel_height) / self.stride_y + 1
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    fn in_size(&self) -> usize {
        self.in_width * self.in_height * self.in_depth
    }

    fn out_size(&self) -> usize {
        self.out_width() * self.out_height() * self.out_depth
    }

    fn input_index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.in_width + x) * self.in_depth + c
    }

    fn output_index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.out_width() + x) * self.out_depth + c
    }

    fn weight_index(&self, oc: usize, ky: usize, kx: usize, ic: usize) -> usize {
        ((oc * self.kernel_height + ky) * self.kernel_width + kx) * self.in_depth + ic
    }
}

impl Layer for SlidingKernel {
    fn forward(&mut self, input: &Array2<f32>, _train: bool) -> Result<Array2<f32>> {
        if input.ncols() != self.in_size() {
            return Err(Error::ShapeMismatch {
                expected: self.in_size(),
                got: input.ncols(),
            });
        }

        let weights = self.weights.data();
        let mut out = Array2::zeros((input.nrows(), self.out_size()));
        for b in 0..input.nrows() {
            let row = input.row(b);
            for oy in 0..self.out_height() {
                let iy0 = oy * self.stride_y;
                for ox in 0..self.out_width() {
                    let ix0 = ox * self.stride_x;
                    for oc in 0..self.out_depth {
                        let mut sum = 0.0;
                        for ky in 0..self.kernel_height {
                            for kx in 0..self.kernel_width {
                                for ic in 0..self.in_depth {
                                    sum += row[self.input_index(iy0 + ky, ix0 + kx, ic)]
                                        * weights[self.weight_index(oc, ky, kx, ic)];
                                }
                            }
                        }
                        out[[b, self.output_index(oy, ox, oc)]] = sum;
                    }
                }
            }
        }
        Ok(out)
    }

    fn backward(&mut self, input: &Array2<f32>, out_grad: &Array2<f32>) -> Result<Array2<f32>> {
        if input.ncols() != self.in_size() {
            return Err(Error::ShapeMismatch {
                expected: self.in_size(),
                got: input.ncols(),
            });
        }
        if out_grad.ncols() != self.out_size() {
            return Err(Error::ShapeMismatch {
                expected: self.out_size(),
                got: out_grad.ncols(),
            });
        }

        let mut in_grad = Array2::zeros(input.dim());
        {
            let weights = self.weights.data();
            let mut dw = self.weights.grad_mut();
            for b in 0..input.nrows() {
                let row = input.row(b);
                let grad_row = out_grad.row(b);
                for oy in 0..self.out_height() {
                    let iy0 = oy * self.stride_y;
                    for ox in 0..self.out_width() {
                        let ix0 = ox * self.stride_x;
                        for oc in 0..self.out_depth {
                            let g = grad_row[self.output_index(oy, ox, oc)];
                            if g == 0.0 {
                                continue;
                            }
                            for ky in 0..self.kernel_height {
                                for kx in 0..self.kernel_width {
                                    for ic in 0..self.in_depth {
                                        let ii = self.input_index(iy0 + ky, ix0 + kx, ic);
                                        let wi = self.weight_index(oc, ky, kx, ic);
                                        dw[wi] += g * row[ii];
                                        in_grad[[b, ii]] += g * weights[wi];
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(in_grad)
    }

    fn params(&self) -> Vec<Tensor> {
        vec![self.weights.clone()]
    }

    fn state(&self) -> LayerState {
        LayerState::SlidingKernel {
            in_width: self.in_width,
            in_height: self.in_height,
            in_depth: self.in_depth,
            kernel_width: self.kernel_width,
            kernel_height: self.kernel_height,
            out_depth: self.out_depth,
            stride_x: self.stride_x,
            stride_y: self.stride_y,
            weights: self.weights.data().to_vec(),
        }
    }

    fn name(&self) -> &'static str {
        "sliding_kernel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_output_geometry() {
        let mut rng = StdRng::seed_from_u64(0);
        // The first layer of the production architecture.
        let layer = SlidingKernel::new(32, 32, 3, 3, 3, 8, 2, 2, &mut rng);
        assert_eq!(layer.out_width(), 15);
        assert_eq!(layer.out_height(), 15);
        assert_eq!(layer.out_size(), 15 * 15 * 8);
    }

    #[test]
    fn test_unit_kernel_is_identity() {
        // 1x1 kernel with weight 1 on a single channel copies the input.
        let mut layer =
            SlidingKernel::from_state(2, 2, 1, 1, 1, 1, 1, 1, vec![1.0]).expect("valid state");
        let input = arr2(&[[0.1, 0.2, 0.3, 0.4]]);
        let out = layer.forward(&input, false).expect("forward pass");
        assert_eq!(out, input);
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        // 3x3 single-channel input, 2x2 kernel, stride 1 -> 2x2 output.
        let mut layer =
            SlidingKernel::from_state(3, 3, 1, 2, 2, 1, 1, 1, vec![0.5, -0.25, 0.75, 1.5])
                .expect("valid state");
        let input = arr2(&[[0.1, -0.4, 0.3, 0.9, 0.2, -0.6, 0.05, 0.7, -0.2]]);
        let out_grad = arr2(&[[1.0, -0.5, 0.25, 2.0]]);

        let in_grad = layer.backward(&input, &out_grad).expect("backward pass");
        let dw = layer.weights().grad().expect("weight gradient");

        let h = 1e-3f32;
        for i in 0..4 {
            let base = layer.weights().data()[i];
            layer.weights().data_mut()[i] = base + h;
            let plus: f32 = (layer.forward(&input, false).expect("forward") * &out_grad).sum();
            layer.weights().data_mut()[i] = base - h;
            let minus: f32 = (layer.forward(&input, false).expect("forward") * &out_grad).sum();
            layer.weights().data_mut()[i] = base;

            assert_abs_diff_eq!(dw[i], (plus - minus) / (2.0 * h), epsilon = 1e-2);
        }

        // Input gradient via the same finite difference.
        let mut input = input;
        for i in 0..9 {
            let base = input[[0, i]];
            input[[0, i]] = base + h;
            let plus: f32 = (layer.forward(&input, false).expect("forward") * &out_grad).sum();
            input[[0, i]] = base - h;
            let minus: f32 = (layer.forward(&input, false).expect("forward") * &out_grad).sum();
            input[[0, i]] = base;

            assert_abs_diff_eq!(in_grad[[0, i]], (plus - minus) / (2.0 * h), epsilon = 1e-2);
        }
    }

    #[test]
    fn test_wrong_input_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = SlidingKernel::new(4, 4, 1, 2, 2, 2, 2, 2, &mut rng);
        assert!(layer.forward(&arr2(&[[1.0, 2.0]]), false).is_err());
    }
}
