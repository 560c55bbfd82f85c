//! Layers and their composition
//!
//! A [`Layer`] is a batched transform with an optional set of trainable
//! parameters. A [`Network`] applies layers strictly left to right; reverse
//! accumulation walks them right to left, feeding each layer the input it
//! saw on the forward pass. Shape agreement between adjacent layers is not
//! verified up front; a mismatch surfaces as an error on the first forward
//! call.

mod batch_norm;
mod fully_connected;
mod log_softmax;
mod sliding_kernel;

pub use batch_norm::BatchNorm;
pub use fully_connected::FullyConnected;
pub use log_softmax::LogSoftmax;
pub use sliding_kernel::SlidingKernel;

use ndarray::Array2;

use crate::error::Result;
use crate::io::model::LayerState;
use crate::tensor::Tensor;

/// A unit transform within a [`Network`].
///
/// `forward` maps a batch of input rows to a batch of output rows; with
/// `train` set, layers with batch statistics fold their running-statistic
/// updates into the call. `backward` receives the same input the layer saw
/// on the forward pass plus the gradient of the cost with respect to its
/// output; it accumulates parameter gradients into its own tensors and
/// returns the gradient with respect to its input.
pub trait Layer {
    fn forward(&mut self, input: &Array2<f32>, train: bool) -> Result<Array2<f32>>;

    fn backward(&mut self, input: &Array2<f32>, out_grad: &Array2<f32>) -> Result<Array2<f32>>;

    /// The layer's trainable tensors, in a fixed order. Parameter-free
    /// layers return nothing.
    fn params(&self) -> Vec<Tensor> {
        Vec::new()
    }

    /// Serializable snapshot of the layer's geometry, parameters, and any
    /// running statistics.
    fn state(&self) -> LayerState;

    fn name(&self) -> &'static str;
}

/// An ordered composition of layers.
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
}

impl Network {
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Self {
        Self { layers }
    }

    pub fn push(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        &mut self.layers
    }

    /// The flattened ordered sequence of every trainable tensor, in layer
    /// order. The optimizer iterates exactly this sequence.
    pub fn params(&self) -> Vec<Tensor> {
        self.layers.iter().flat_map(|l| l.params()).collect()
    }

    /// Apply the network to a batch of input rows.
    pub fn forward(&mut self, input: &Array2<f32>, train: bool) -> Result<Array2<f32>> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current, train)?;
        }
        Ok(current)
    }
}
