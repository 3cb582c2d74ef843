//! Metrics Module
//!
//! Scalar loss/accuracy aggregation for training phases and evaluation,
//! plus per-class ratio reporting used by the split diagnostics.

use serde::{Deserialize, Serialize};

/// Scalar metrics for one pass over a dataset (an epoch or an evaluation)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Average loss over all batches
    pub loss: f64,
    /// Fraction of correct predictions (0.0 to 1.0)
    pub accuracy: f64,
}

/// Incremental accumulator for batch-level loss and accuracy
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    total_loss: f64,
    num_batches: usize,
    correct: usize,
    total: usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch
    pub fn update(&mut self, loss: f64, correct: usize, batch_size: usize) {
        self.total_loss += loss;
        self.num_batches += 1;
        self.correct += correct;
        self.total += batch_size;
    }

    /// Number of examples seen so far
    pub fn seen(&self) -> usize {
        self.total
    }

    /// Running accuracy over everything recorded so far
    pub fn running_accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Finalize into averaged metrics
    pub fn finish(self) -> Metrics {
        Metrics {
            loss: if self.num_batches == 0 {
                0.0
            } else {
                self.total_loss / self.num_batches as f64
            },
            accuracy: if self.total == 0 {
                0.0
            } else {
                self.correct as f64 / self.total as f64
            },
        }
    }
}

/// Per-class ratios of a label sequence, indexed by label
pub fn class_ratios(labels: &[usize], num_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        if label < num_classes {
            counts[label] += 1;
        }
    }

    let total = labels.len().max(1);
    counts
        .into_iter()
        .map(|c| c as f64 / total as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_averages() {
        let mut acc = MetricsAccumulator::new();
        acc.update(1.0, 8, 16);
        acc.update(0.5, 12, 16);

        let metrics = acc.finish();
        assert!((metrics.loss - 0.75).abs() < 1e-9);
        assert!((metrics.accuracy - 20.0 / 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_accumulator() {
        let metrics = MetricsAccumulator::new().finish();
        assert_eq!(metrics.loss, 0.0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn test_class_ratios() {
        let labels = vec![0, 0, 1, 2];
        let ratios = class_ratios(&labels, 3);
        assert!((ratios[0] - 0.5).abs() < 1e-9);
        assert!((ratios[1] - 0.25).abs() < 1e-9);
        assert!((ratios[2] - 0.25).abs() < 1e-9);
    }
}
