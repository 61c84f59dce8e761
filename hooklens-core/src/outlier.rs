//! One-dimensional outlier models
//!
//! The duration-anomaly detector fits a model fresh on every call over the
//! durations currently in the recent window, then classifies one candidate.
//! Both models use a contamination ratio: the expected share of outliers in
//! the sample, which sets the decision threshold.

use crate::config::OutlierModelKind;
use crate::error::{Error, Result};
use crate::stats::median;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed for the isolation forest, so repeated runs agree.
pub const DEFAULT_SEED: u64 = 42;

/// Fits a sample and decides whether a candidate is an outlier.
pub trait OutlierModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fit on `samples` and classify `candidate`. True means outlier.
    fn fit_and_classify(&self, samples: &[f64], candidate: f64) -> Result<bool>;
}

/// Build the configured model.
pub fn build_model(kind: OutlierModelKind, contamination: f64) -> Box<dyn OutlierModel> {
    match kind {
        OutlierModelKind::IsolationForest => Box::new(IsolationForest::new(contamination)),
        OutlierModelKind::ModifiedZScore => Box::new(ModifiedZScore::new(contamination)),
    }
}

fn check_input(model: &str, samples: &[f64], candidate: f64) -> Result<()> {
    if samples.is_empty() {
        return Err(Error::detector(model, "cannot fit an empty sample"));
    }
    if !candidate.is_finite() || samples.iter().any(|v| !v.is_finite()) {
        return Err(Error::detector(model, "sample contains non-finite values"));
    }
    Ok(())
}

/// Linear-interpolated quantile of an unsorted sample, `q` in `[0, 1]`.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

// ============================================
// Isolation forest
// ============================================

/// Isolation forest over scalar samples.
///
/// Trees split at uniform random points between the node's min and max. A
/// point's anomaly score is `2^(-E[h(x)] / c(n))`; the threshold is the
/// `(1 - contamination)` quantile of the training scores.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    contamination: f64,
    n_trees: usize,
    max_samples: usize,
    seed: u64,
}

impl IsolationForest {
    pub fn new(contamination: f64) -> Self {
        Self {
            contamination,
            n_trees: 100,
            max_samples: 256,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.max(1);
        self
    }

    /// Fit a forest and return the anomaly score of every sample and of
    /// `candidate` (last).
    fn scores(&self, samples: &[f64], candidate: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let subsample = samples.len().min(self.max_samples);
        let max_depth = (subsample as f64).log2().ceil().max(1.0) as usize;
        let norm = average_path_length(subsample);

        let mut totals = vec![0.0; samples.len() + 1];
        for _ in 0..self.n_trees {
            let picked: Vec<f64> = if subsample == samples.len() {
                samples.to_vec()
            } else {
                rand::seq::index::sample(&mut rng, samples.len(), subsample)
                    .into_iter()
                    .map(|i| samples[i])
                    .collect()
            };
            let tree = Node::build(&picked, 0, max_depth, &mut rng);
            for (total, x) in totals
                .iter_mut()
                .zip(samples.iter().chain(std::iter::once(&candidate)))
            {
                *total += tree.path_length(*x, 0);
            }
        }

        totals
            .into_iter()
            .map(|total| {
                let mean_path = total / self.n_trees as f64;
                if norm > 0.0 {
                    2f64.powf(-mean_path / norm)
                } else {
                    0.5
                }
            })
            .collect()
    }
}

impl OutlierModel for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn fit_and_classify(&self, samples: &[f64], candidate: f64) -> Result<bool> {
        check_input(self.name(), samples, candidate)?;
        let mut scores = self.scores(samples, candidate);
        let candidate_score = scores.pop().unwrap_or_default();
        let threshold = quantile(&scores, 1.0 - self.contamination);
        Ok(candidate_score > threshold)
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        at: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(values: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if values.len() <= 1 || depth >= max_depth || !(min < max) {
            return Node::Leaf { size: values.len() };
        }
        let at = rng.random_range(min..max);
        let (left, right): (Vec<f64>, Vec<f64>) = values.iter().copied().partition(|v| *v < at);
        Node::Split {
            at,
            left: Box::new(Node::build(&left, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, x: f64, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split { at, left, right } => {
                if x < *at {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================
// Modified z-score
// ============================================

/// Median/MAD based modified z-score.
///
/// A candidate is an outlier when its |z| exceeds the `(1 - contamination)`
/// quantile of the sample's |z| values. With zero MAD the mean absolute
/// deviation is used; with a constant sample any differing candidate is an
/// outlier.
#[derive(Debug, Clone)]
pub struct ModifiedZScore {
    contamination: f64,
}

impl ModifiedZScore {
    pub fn new(contamination: f64) -> Self {
        Self { contamination }
    }
}

impl OutlierModel for ModifiedZScore {
    fn name(&self) -> &'static str {
        "modified_z_score"
    }

    fn fit_and_classify(&self, samples: &[f64], candidate: f64) -> Result<bool> {
        check_input(self.name(), samples, candidate)?;
        let med = median(samples).unwrap_or_default();
        let deviations: Vec<f64> = samples.iter().map(|v| (v - med).abs()).collect();
        let mad = median(&deviations).unwrap_or_default();

        let scale = if mad > 0.0 {
            mad / 0.6745
        } else {
            let mean_ad = deviations.iter().sum::<f64>() / deviations.len() as f64;
            if mean_ad == 0.0 {
                return Ok(candidate != med);
            }
            mean_ad * 1.253_314
        };

        let z = |v: f64| (v - med).abs() / scale;
        let sample_z: Vec<f64> = samples.iter().map(|v| z(*v)).collect();
        let threshold = quantile(&sample_z, 1.0 - self.contamination);
        Ok(z(candidate) > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with(outlier: f64) -> Vec<f64> {
        let mut samples: Vec<f64> = (0..20).map(|i| 95.0 + (i % 11) as f64).collect();
        samples.push(outlier);
        samples
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
        assert_eq!(quantile(&[3.0, 1.0, 2.0], 1.0), 3.0);
        assert_eq!(quantile(&[3.0, 1.0, 2.0], 0.0), 1.0);
    }

    #[test]
    fn test_isolation_forest_flags_far_point() {
        let model = IsolationForest::new(0.1);
        let samples = cluster_with(1000.0);
        assert!(model.fit_and_classify(&samples, 1000.0).unwrap());
        assert!(!model.fit_and_classify(&samples, 100.0).unwrap());
    }

    #[test]
    fn test_isolation_forest_is_deterministic() {
        let samples = cluster_with(400.0);
        let a = IsolationForest::new(0.1).scores(&samples, 400.0);
        let b = IsolationForest::new(0.1).scores(&samples, 400.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_isolation_forest_constant_sample() {
        let model = IsolationForest::new(0.1);
        let samples = vec![60.0; 12];
        assert!(!model.fit_and_classify(&samples, 60.0).unwrap());
    }

    #[test]
    fn test_modified_z_score() {
        let model = ModifiedZScore::new(0.1);
        let samples = cluster_with(1000.0);
        assert!(model.fit_and_classify(&samples, 1000.0).unwrap());
        assert!(!model.fit_and_classify(&samples, 100.0).unwrap());
    }

    #[test]
    fn test_modified_z_score_zero_mad() {
        let model = ModifiedZScore::new(0.1);
        let constant = vec![60.0; 12];
        assert!(!model.fit_and_classify(&constant, 60.0).unwrap());
        assert!(model.fit_and_classify(&constant, 61.0).unwrap());

        // MAD is zero but the mean absolute deviation is not
        let mut mostly = vec![60.0; 11];
        mostly.push(600.0);
        assert!(model.fit_and_classify(&mostly, 600.0).unwrap());
        assert!(!model.fit_and_classify(&mostly, 60.0).unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        let model = build_model(OutlierModelKind::IsolationForest, 0.1);
        assert!(model.fit_and_classify(&[], 1.0).is_err());
        assert!(model.fit_and_classify(&[1.0, f64::NAN], 1.0).is_err());
    }
}
