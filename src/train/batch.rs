//! Batch data structure

use ndarray::Array2;

/// One minibatch: stacked input rows and stacked one-hot target rows.
///
/// Batches are created fresh per fetch and discarded after use.
pub struct Batch {
    /// Input features, one example per row.
    pub inputs: Array2<f32>,
    /// One-hot expected outputs, one example per row.
    pub targets: Array2<f32>,
}

impl Batch {
    pub fn new(inputs: Array2<f32>, targets: Array2<f32>) -> Self {
        Self { inputs, targets }
    }

    /// Number of examples in the batch.
    pub fn size(&self) -> usize {
        self.inputs.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_batch_size() {
        let batch = Batch::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]), arr2(&[[1.0], [0.0]]));
        assert_eq!(batch.size(), 2);
    }
}
