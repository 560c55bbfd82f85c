//! Classification accuracy evaluation

use crate::data::SampleSet;
use crate::error::{Error, Result};
use crate::net::Network;
use crate::train::GradientTrainer;

/// Fraction of examples whose predicted class matches the label, as a
/// percentage.
///
/// Walks the sample set in fixed-size non-overlapping batches; a trailing
/// partial batch is dropped, not padded. Each output row's arg-max is
/// compared against the one-hot target via the dot-product convention: the
/// target's value at the predicted index is 1.0 on a match and 0.0
/// otherwise. Parameters are never mutated (evaluation-mode forward).
pub fn success_rate(
    net: &mut Network,
    trainer: &GradientTrainer,
    samples: &SampleSet,
    batch_size: usize,
) -> Result<f32> {
    if batch_size == 0 {
        return Err(Error::Config("evaluation batch size must be positive".into()));
    }

    let mut correct = 0.0f64;
    let mut total = 0.0f64;
    let mut start = 0;
    while start + batch_size <= samples.len() {
        let batch = trainer.fetch(samples.slice(start, start + batch_size))?;
        let output = net.forward(&batch.inputs, false)?;

        for (out_row, target_row) in output.rows().into_iter().zip(batch.targets.rows()) {
            let mut predicted = 0;
            let mut best = f32::NEG_INFINITY;
            for (i, &v) in out_row.iter().enumerate() {
                if v > best {
                    best = v;
                    predicted = i;
                }
            }
            correct += f64::from(target_row[predicted]);
            total += 1.0;
        }
        start += batch_size;
    }

    if total == 0.0 {
        return Err(Error::EmptyBatch);
    }
    Ok((100.0 * correct / total) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use crate::net::{FullyConnected, LogSoftmax};
    use crate::train::{DotCost, GradientTrainer};
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;
    use std::sync::Arc;

    fn one_hot_set(labels: &[usize]) -> SampleSet {
        // Each sample's image is its own one-hot vector, so an identity
        // network classifies it perfectly.
        SampleSet::new(
            labels
                .iter()
                .map(|&label| {
                    let mut image = vec![0.0f32; 2];
                    image[label] = 1.0;
                    Arc::new(Sample {
                        image: arr1(&image),
                        label,
                    })
                })
                .collect(),
        )
    }

    fn identity_net() -> Network {
        Network::new(vec![
            Box::new(
                FullyConnected::from_state(2, 2, vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0])
                    .expect("valid state"),
            ),
            Box::new(LogSoftmax::new()),
        ])
    }

    fn swapped_net() -> Network {
        Network::new(vec![
            Box::new(
                FullyConnected::from_state(2, 2, vec![0.0, 1.0, 1.0, 0.0], vec![0.0, 0.0])
                    .expect("valid state"),
            ),
            Box::new(LogSoftmax::new()),
        ])
    }

    fn trainer() -> GradientTrainer {
        GradientTrainer::new(Box::new(DotCost), 2, true)
    }

    #[test]
    fn test_all_correct_is_exactly_one_hundred() {
        let set = one_hot_set(&[0, 1, 0, 1, 1, 0]);
        let rate = success_rate(&mut identity_net(), &trainer(), &set, 2).expect("rate");
        assert_abs_diff_eq!(rate, 100.0);
    }

    #[test]
    fn test_all_wrong_is_exactly_zero() {
        let set = one_hot_set(&[0, 1, 0, 1, 1, 0]);
        let rate = success_rate(&mut swapped_net(), &trainer(), &set, 2).expect("rate");
        assert_abs_diff_eq!(rate, 0.0);
    }

    #[test]
    fn test_trailing_partial_batch_is_dropped() {
        // 5 samples with batch 2: only the first 4 are evaluated. The 5th is
        // deliberately mislabeled, so a perfect score proves it was skipped.
        let mislabeled = Arc::new(Sample {
            image: arr1(&[1.0, 0.0]),
            label: 1,
        });
        let set = SampleSet::concat(vec![
            one_hot_set(&[0, 1, 0, 1]),
            SampleSet::new(vec![mislabeled]),
        ]);
        assert_eq!(set.len(), 5);

        let rate = success_rate(&mut identity_net(), &trainer(), &set, 2).expect("rate");
        assert_abs_diff_eq!(rate, 100.0);
    }

    #[test]
    fn test_too_small_set_is_an_error() {
        let set = one_hot_set(&[0]);
        assert!(success_rate(&mut identity_net(), &trainer(), &set, 2).is_err());
    }

    #[test]
    fn test_does_not_mutate_parameters() {
        let set = one_hot_set(&[0, 1, 0, 1]);
        let mut net = identity_net();
        let before: Vec<f32> = net.params()[0].data().to_vec();

        success_rate(&mut net, &trainer(), &set, 2).expect("rate");
        assert_eq!(net.params()[0].data().to_vec(), before);
    }
}
