use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tc_core::error::PipelineResult;
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;

use crate::labels::{LabelIndex, argmax, check_training_set, check_width};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Node {
    /// Class distribution of the training rows that reached the leaf.
    Leaf { proba: Vec<f64> },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART tree, Gini impurity, axis-aligned splits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    features: &'a FeatureMatrix,
    targets: &'a [usize],
    n_classes: usize,
    max_depth: usize,
    max_features: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &r in rows {
            counts[self.targets[r]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize]) -> usize {
        let total = counts.iter().sum::<usize>().max(1) as f64;
        let proba = counts.iter().map(|&c| c as f64 / total).collect();
        self.nodes.push(Node::Leaf { proba });
        self.nodes.len() - 1
    }

    fn build(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.counts(rows);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if depth >= self.max_depth || pure || rows.len() < 2 {
            return self.leaf(&counts);
        }

        let Some((feature, threshold)) = self.best_split(rows, &counts, rng) else {
            return self.leaf(&counts);
        };

        // Partition in place: rows going left first.
        let mut mid = 0;
        for i in 0..rows.len() {
            if self.features.get(rows[i], feature) <= threshold {
                rows.swap(i, mid);
                mid += 1;
            }
        }

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { proba: Vec::new() });
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.build(left_rows, depth + 1, rng);
        let right = self.build(right_rows, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    /// Lowest weighted Gini over a random subset of features.
    fn best_split(
        &self,
        rows: &[usize],
        parent: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n = rows.len() as f64;
        let mut candidates: Vec<usize> = (0..self.features.cols()).collect();
        candidates.shuffle(rng);
        candidates.truncate(self.max_features);

        let mut best: Option<(f64, usize, f64)> = None;
        let mut order = rows.to_vec();
        for feature in candidates {
            order.sort_by(|&a, &b| {
                self.features
                    .get(a, feature)
                    .total_cmp(&self.features.get(b, feature))
            });

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent.to_vec();
            for i in 0..order.len() - 1 {
                let class = self.targets[order[i]];
                left[class] += 1;
                right[class] -= 1;

                let here = self.features.get(order[i], feature);
                let next = self.features.get(order[i + 1], feature);
                if next <= here {
                    continue;
                }
                let n_left = (i + 1) as f64;
                let score = n_left / n * gini(&left, n_left) + (n - n_left) / n * gini(&right, n - n_left);
                if best.is_none_or(|(s, _, _)| score < s) {
                    best = Some((score, feature, (here + next) / 2.0));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

fn gini(counts: &[usize], total: f64) -> f64 {
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

impl DecisionTree {
    fn proba(&self, row: &[f64]) -> &[f64] {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { proba } => return proba,
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

/// Bagged CART trees with `sqrt(n_features)` candidates per split.
///
/// Class probabilities are averaged across trees; the most probable class
/// wins. Training is deterministic for a given seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    index: LabelIndex,
    width: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// # Errors
    /// `DataShapeMismatch` or `InsufficientData` on an unusable training set.
    pub fn fit(
        features: &FeatureMatrix,
        labels: &[ClassId],
        n_trees: usize,
        max_depth: usize,
        seed: u64,
    ) -> PipelineResult<Self> {
        check_training_set(features, labels)?;
        let index = LabelIndex::fit(labels);
        let targets = index.encode(labels);
        let n = features.rows();
        let max_features = ((features.cols() as f64).sqrt().round() as usize).clamp(1, features.cols().max(1));

        let trees = (0..n_trees.max(1) as u64)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t));
                let mut rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    features,
                    targets: &targets,
                    n_classes: index.len(),
                    max_depth,
                    max_features,
                    nodes: Vec::new(),
                };
                builder.build(&mut rows, 0, &mut rng);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Self {
            index,
            width: features.cols(),
            trees,
        })
    }

    /// # Errors
    /// `DataShapeMismatch` if the width differs from the training width.
    pub fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>> {
        check_width(features, self.width)?;
        let mut out = Vec::with_capacity(features.rows());
        let mut acc = vec![0.0; self.index.len()];
        for row in features.iter_rows() {
            acc.fill(0.0);
            for tree in &self.trees {
                for (a, p) in acc.iter_mut().zip(tree.proba(row)) {
                    *a += p;
                }
            }
            out.push(self.index.label(argmax(&acc)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (FeatureMatrix, Vec<ClassId>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = f64::from(i % 5) * 0.1;
            rows.push(vec![0.0 + jitter, 5.0 - jitter]);
            labels.push(2);
            rows.push(vec![4.0 + jitter, 1.0 + jitter]);
            labels.push(14);
            rows.push(vec![8.0 - jitter, 6.0 + jitter]);
            labels.push(20);
        }
        (FeatureMatrix::from_rows(&rows).expect("uniform"), labels)
    }

    #[test]
    fn separates_well_spread_classes() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 10, 4, 0).expect("fit");
        let predicted = forest.predict(&x).expect("predict");
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.9, "{correct}/{}", y.len());
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = blobs();
        let a = RandomForest::fit(&x, &y, 5, 2, 7).expect("fit");
        let b = RandomForest::fit(&x, &y, 5, 2, 7).expect("fit");
        assert_eq!(a, b);
    }

    #[test]
    fn depth_limits_tree_size() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 3, 2, 1).expect("fit");
        // A depth-2 binary tree has at most 7 nodes.
        assert!(forest.trees.iter().all(|t| t.nodes.len() <= 7));
    }

    #[test]
    fn single_class_predicts_that_class() {
        let x = FeatureMatrix::zeros(4, 3);
        let forest = RandomForest::fit(&x, &[9; 4], 2, 2, 0).expect("fit");
        assert_eq!(forest.predict(&x).expect("predict"), vec![9; 4]);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 2, 2, 0).expect("fit");
        assert!(forest.predict(&FeatureMatrix::zeros(1, 5)).is_err());
    }
}
