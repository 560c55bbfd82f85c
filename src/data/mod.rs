//! Labeled sample collections
//!
//! A [`SampleSet`] is an indexable, shuffle-able, sliceable list of labeled
//! examples. The training and validation sets are disjoint `SampleSet`s built
//! from the dataset's shards; slices borrow the underlying samples without
//! copying.

pub mod cifar;

use std::sync::Arc;

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::Rng;

/// One labeled example: a flattened image and its class index.
pub struct Sample {
    /// Image pixels, row-major `(row, col, channel)`, in `[0, 1]`.
    pub image: Array1<f32>,
    /// Class index.
    pub label: usize,
}

/// An ordered collection of labeled samples.
pub struct SampleSet {
    samples: Vec<Arc<Sample>>,
}

impl SampleSet {
    pub fn new(samples: Vec<Arc<Sample>>) -> Self {
        Self { samples }
    }

    /// Concatenate several sets into one, preserving order.
    pub fn concat<I: IntoIterator<Item = SampleSet>>(sets: I) -> Self {
        let samples = sets.into_iter().flat_map(|s| s.samples).collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> &Arc<Sample> {
        &self.samples[index]
    }

    /// Uniformly permute the sample order in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }

    /// Borrow a contiguous sub-range without copying the samples.
    pub fn slice(&self, start: usize, end: usize) -> &[Arc<Sample>] {
        &self.samples[start..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Sample>> {
        self.samples.iter()
    }
}
