//! Tree-ensemble regressors
//!
//! Variance-reduction regression trees, bagged into a random forest or
//! staged into gradient boosting. Deterministic under a fixed seed so
//! training runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Shared tree-growing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub n_trees: usize,
    /// Boosting shrinkage; unused by the forest
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 4,
            n_trees: 50,
            learning_rate: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A regression tree grown by greedy variance reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on the rows selected by `indices`, considering only the
    /// feature columns in `features` at each split.
    fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, indices, features, params, 0);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        features: &[usize],
        params: &TreeParams,
        depth: usize,
    ) -> usize {
        let node_mean = mean(indices.iter().map(|&i| y[i]));

        if depth >= params.max_depth || indices.len() < params.min_samples_split {
            return self.push(Node::Leaf { value: node_mean });
        }

        let Some((feature, threshold)) = best_split(x, y, indices, features) else {
            return self.push(Node::Leaf { value: node_mean });
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][feature] <= threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return self.push(Node::Leaf { value: node_mean });
        }

        // Reserve the split slot before growing children so child indices
        // are known when it is written
        let slot = self.push(Node::Leaf { value: node_mean });
        let left = self.grow(x, y, &left_idx, features, params, depth + 1);
        let right = self.grow(x, y, &right_idx, features, params, depth + 1);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Pick the split with the largest weighted variance reduction. Candidate
/// thresholds are midpoints between adjacent distinct sorted values.
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    features: &[usize],
) -> Option<(usize, f64)> {
    let parent_score = variance(indices.iter().map(|&i| y[i])) * indices.len() as f64;
    let mut best: Option<(usize, f64, f64)> = None;

    for &feature in features {
        let mut values: Vec<f64> = indices.iter().map(|&i| x[i][feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).expect("no NaN features"));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left, right): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[i][feature] <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }

            let score = variance(left.iter().map(|&i| y[i])) * left.len() as f64
                + variance(right.iter().map(|&i| y[i])) * right.len() as f64;
            let gain = parent_score - score;
            if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature, threshold, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

fn check_training_input(x: &[Vec<f64>], y: &[f64]) -> ServiceResult<()> {
    if x.is_empty() || x.len() != y.len() {
        return Err(ServiceError::Validation(format!(
            "feature matrix ({} rows) and targets ({} rows) must be non-empty and aligned",
            x.len(),
            y.len()
        )));
    }
    Ok(())
}

/// Bagged regression trees with per-tree feature subsampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &TreeParams) -> ServiceResult<Self> {
        check_training_input(x, y)?;

        let n_features = x[0].len();
        // sqrt(features) per tree, standard for regression bagging
        let subset = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> =
                    (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();
                let mut features: Vec<usize> = (0..n_features).collect();
                for i in (1..features.len()).rev() {
                    features.swap(i, rng.gen_range(0..=i));
                }
                features.truncate(subset);
                DecisionTree::fit(x, y, &sample, &features, params)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        mean(self.trees.iter().map(|t| t.predict(row)))
    }
}

/// Staged trees fit to residuals with shrinkage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    initial: f64,
    learning_rate: f64,
    trees: Vec<DecisionTree>,
}

impl GradientBoosting {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &TreeParams) -> ServiceResult<Self> {
        check_training_input(x, y)?;

        let n_features = x[0].len();
        let all_features: Vec<usize> = (0..n_features).collect();
        let all_indices: Vec<usize> = (0..x.len()).collect();

        let initial = mean(y.iter().copied());
        let mut predictions = vec![initial; y.len()];
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees.max(1) {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&predictions)
                .map(|(target, pred)| target - pred)
                .collect();

            let tree = DecisionTree::fit(x, &residuals, &all_indices, &all_features, params);
            for (i, pred) in predictions.iter_mut().enumerate() {
                *pred += params.learning_rate * tree.predict(&x[i]);
            }
            trees.push(tree);
        }

        Ok(Self {
            initial,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.initial
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(row))
                .sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 3x0 + noiseless step on x1
    fn toy_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64 / n as f64, if i % 2 == 0 { 0.0 } else { 1.0 }])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 * r[0] + 10.0 * r[1]).collect();
        (x, y)
    }

    #[test]
    fn single_tree_fits_a_step_function() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let indices: Vec<usize> = (0..20).collect();

        let tree = DecisionTree::fit(&x, &y, &indices, &[0], &TreeParams::default());
        assert!((tree.predict(&[2.0]) - 1.0).abs() < 1e-9);
        assert!((tree.predict(&[15.0]) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn forest_predictions_track_the_target() {
        let (x, y) = toy_data(80);
        let forest = RandomForest::fit(&x, &y, &TreeParams::default()).unwrap();

        let mae = x
            .iter()
            .zip(&y)
            .map(|(row, target)| (forest.predict(row) - target).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < 2.0, "forest MAE too high: {}", mae);
    }

    #[test]
    fn boosting_reduces_error_over_the_initial_mean() {
        let (x, y) = toy_data(80);
        let params = TreeParams {
            n_trees: 100,
            max_depth: 3,
            ..Default::default()
        };
        let model = GradientBoosting::fit(&x, &y, &params).unwrap();

        let baseline = mean(y.iter().copied());
        let baseline_mae =
            y.iter().map(|t| (t - baseline).abs()).sum::<f64>() / y.len() as f64;
        let mae = x
            .iter()
            .zip(&y)
            .map(|(row, target)| (model.predict(row) - target).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < baseline_mae / 2.0);
    }

    #[test]
    fn same_seed_means_same_model() {
        let (x, y) = toy_data(40);
        let params = TreeParams::default();
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        for row in &x {
            assert_eq!(a.predict(row), b.predict(row));
        }
    }

    #[test]
    fn misaligned_input_is_rejected() {
        let err = RandomForest::fit(&[vec![1.0]], &[1.0, 2.0], &TreeParams::default());
        assert!(err.is_err());
        assert!(RandomForest::fit(&[], &[], &TreeParams::default()).is_err());
    }

    #[test]
    fn constant_target_yields_constant_prediction() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![7.0; 10];
        let forest = RandomForest::fit(&x, &y, &TreeParams::default()).unwrap();
        assert!((forest.predict(&[3.0]) - 7.0).abs() < 1e-9);
    }
}
