//! Serializable network state

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::net::{BatchNorm, FullyConnected, Layer, LogSoftmax, Network, SlidingKernel};

/// Serialized form of a whole network, layer by layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkState {
    pub layers: Vec<LayerState>,
}

/// Serialized form of one layer: geometry, parameter values, and any
/// running statistics. The set of kinds is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerState {
    SlidingKernel {
        in_width: usize,
        in_height: usize,
        in_depth: usize,
        kernel_width: usize,
        kernel_height: usize,
        out_depth: usize,
        stride_x: usize,
        stride_y: usize,
        weights: Vec<f32>,
    },
    BatchNorm {
        channels: usize,
        scale: Vec<f32>,
        shift: Vec<f32>,
        running_mean: Vec<f32>,
        running_var: Vec<f32>,
    },
    FullyConnected {
        in_size: usize,
        out_size: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    },
    LogSoftmax,
}

impl NetworkState {
    /// Snapshot a network.
    pub fn from_network(net: &Network) -> Self {
        Self {
            layers: net.layers().iter().map(|l| l.state()).collect(),
        }
    }

    /// Rebuild the network, validating parameter lengths against each
    /// layer's geometry.
    pub fn into_network(self) -> Result<Network> {
        let layers = self
            .layers
            .into_iter()
            .map(LayerState::into_layer)
            .collect::<Result<Vec<_>>>()?;
        Ok(Network::new(layers))
    }
}

impl LayerState {
    fn into_layer(self) -> Result<Box<dyn Layer>> {
        Ok(match self {
            LayerState::SlidingKernel {
                in_width,
                in_height,
                in_depth,
                kernel_width,
                kernel_height,
                out_depth,
                stride_x,
                stride_y,
                weights,
            } => Box::new(SlidingKernel::from_state(
                in_width,
                in_height,
                in_depth,
                kernel_width,
                kernel_height,
                out_depth,
                stride_x,
                stride_y,
                weights,
            )?),
            LayerState::BatchNorm {
                channels,
                scale,
                shift,
                running_mean,
                running_var,
            } => Box::new(BatchNorm::from_state(
                channels,
                scale,
                shift,
                running_mean,
                running_var,
            )?),
            LayerState::FullyConnected {
                in_size,
                out_size,
                weights,
                biases,
            } => Box::new(FullyConnected::from_state(
                in_size, out_size, weights, biases,
            )?),
            LayerState::LogSoftmax => Box::new(LogSoftmax::new()),
        })
    }
}
