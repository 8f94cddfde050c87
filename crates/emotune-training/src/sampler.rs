//! Qualitative sampling of correct and incorrect test predictions.

use crate::error::{TrainingError, TrainingResult};
use crate::labels::LabelMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSample {
    pub index: usize,
    pub text: String,
    pub true_label: String,
    pub predicted_label: String,
}

/// Test-set predictions aligned by example index.
#[derive(Debug, Clone, Copy)]
pub struct PredictionSet<'a> {
    texts: &'a [String],
    truth: &'a [usize],
    predicted: &'a [usize],
}

impl<'a> PredictionSet<'a> {
    pub fn new(texts: &'a [String], truth: &'a [usize], predicted: &'a [usize]) -> TrainingResult<Self> {
        if texts.len() != truth.len() || truth.len() != predicted.len() {
            return Err(TrainingError::InvalidArgument(format!(
                "prediction set lengths differ: {} texts, {} labels, {} predictions",
                texts.len(),
                truth.len(),
                predicted.len()
            )));
        }
        Ok(Self { texts, truth, predicted })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.truth.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.truth.is_empty()
    }

    #[must_use]
    pub fn is_correct(&self, index: usize) -> bool {
        self.truth[index] == self.predicted[index]
    }
}

/// Draws samples by scanning a random permutation of the example indices.
#[derive(Debug)]
pub struct PredictionSampler {
    rng: StdRng,
    labels: LabelMap,
}

impl PredictionSampler {
    /// Seeded sampler; `None` seeds from OS entropy.
    #[must_use]
    pub fn new(seed: Option<u64>, labels: LabelMap) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { rng, labels }
    }

    /// Up to `num_instances` samples whose correctness equals `correct`.
    ///
    /// Results are in scan order. `on_sample` is called for each hit; a
    /// `Display` error from it is logged and sampling continues. Any other
    /// error from `on_sample` is returned.
    pub fn sample<F>(
        &mut self,
        predictions: &PredictionSet<'_>,
        correct: bool,
        num_instances: usize,
        mut on_sample: F,
    ) -> TrainingResult<Vec<PredictionSample>>
    where
        F: FnMut(&PredictionSample) -> TrainingResult<()>,
    {
        let mut order: Vec<usize> = (0..predictions.len()).collect();
        order.shuffle(&mut self.rng);

        let mut out = Vec::with_capacity(num_instances.min(order.len()));
        for idx in order {
            if out.len() >= num_instances {
                break;
            }
            if predictions.is_correct(idx) != correct {
                continue;
            }
            let sample = PredictionSample {
                index: idx,
                text: predictions.texts[idx].clone(),
                true_label: self.labels.name(predictions.truth[idx]),
                predicted_label: self.labels.name(predictions.predicted[idx]),
            };
            match on_sample(&sample) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(index = idx, error = %err, "could not display sample");
                }
                Err(err) => return Err(err),
            }
            out.push(sample);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("example {i}")).collect()
    }

    #[test]
    fn test_fewer_matches_than_requested_returns_all() {
        let truth = vec![0, 1, 2, 3, 4, 5, 6, 7];
        let predicted = vec![0, 1, 9, 3, 9, 5, 9, 7];
        let texts = texts(truth.len());
        let set = PredictionSet::new(&texts, &truth, &predicted).unwrap();

        let mut sampler = PredictionSampler::new(Some(1), LabelMap::default());
        let samples = sampler.sample(&set, false, 10, |_| Ok(())).unwrap();

        assert_eq!(samples.len(), 3);
        let mut indices: Vec<_> = samples.iter().map(|s| s.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![2, 4, 6]);
        assert!(samples.iter().all(|s| s.true_label != s.predicted_label));
    }

    #[test]
    fn test_same_seed_same_samples() {
        let truth: Vec<usize> = (0..50).map(|i| i % 3).collect();
        let predicted: Vec<usize> = (0..50).map(|i| i % 2).collect();
        let texts = texts(50);
        let set = PredictionSet::new(&texts, &truth, &predicted).unwrap();

        let a = PredictionSampler::new(Some(42), LabelMap::default()).sample(&set, true, 5, |_| Ok(())).unwrap();
        let b = PredictionSampler::new(Some(42), LabelMap::default()).sample(&set, true, 5, |_| Ok(())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_errors_do_not_stop_sampling() {
        let truth = vec![1, 1, 1, 1];
        let texts = texts(4);
        let set = PredictionSet::new(&texts, &truth, &truth).unwrap();

        let mut sampler = PredictionSampler::new(Some(3), LabelMap::default());
        let samples = sampler
            .sample(&set, true, 4, |_| Err(TrainingError::Display("unencodable".to_string())))
            .unwrap();
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_other_callback_errors_propagate() {
        let truth = vec![1];
        let texts = texts(1);
        let set = PredictionSet::new(&texts, &truth, &truth).unwrap();

        let mut sampler = PredictionSampler::new(Some(3), LabelMap::default());
        let err = sampler
            .sample(&set, true, 1, |_| Err(TrainingError::Persistence("disk".to_string())))
            .unwrap_err();
        assert!(matches!(err, TrainingError::Persistence(_)));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let texts = texts(2);
        assert!(PredictionSet::new(&texts, &[0, 1], &[0]).is_err());
    }

    proptest! {
        #[test]
        fn prop_samples_are_distinct_bounded_and_match_predicate(
            pairs in proptest::collection::vec((0usize..4, 0usize..4), 0..60),
            k in 0usize..20,
            correct in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let truth: Vec<usize> = pairs.iter().map(|p| p.0).collect();
            let predicted: Vec<usize> = pairs.iter().map(|p| p.1).collect();
            let texts = texts(pairs.len());
            let set = PredictionSet::new(&texts, &truth, &predicted).unwrap();

            let mut sampler = PredictionSampler::new(Some(seed), LabelMap::default());
            let samples = sampler.sample(&set, correct, k, |_| Ok(())).unwrap();

            let matching = (0..set.len()).filter(|&i| set.is_correct(i) == correct).count();
            prop_assert_eq!(samples.len(), k.min(matching));
            let unique: HashSet<_> = samples.iter().map(|s| s.index).collect();
            prop_assert_eq!(unique.len(), samples.len());
            for s in &samples {
                prop_assert_eq!(set.is_correct(s.index), correct);
            }
        }
    }
}
