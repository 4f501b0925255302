//! CART regression tree with a squared-error criterion.
//!
//! Nodes live in a flat arena; the root is node 0. A sample goes left when
//! `x[feature] <= threshold`.

use crate::config::TreeConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Node impurity at or below this is treated as pure.
const PURE_EPSILON: f64 = 1e-12;

/// One node of a fitted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Mean target of the training samples that reached this leaf.
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        samples: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    nodes: Vec<Node>,
    n_features: usize,
    /// Total squared-error reduction attributed to each feature.
    impurity_decrease: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    left_sse: f64,
    right_sse: f64,
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// A node still to be grown over `indices[start..end]`.
struct PendingNode {
    start: usize,
    end: usize,
    depth: usize,
    parent: Option<(usize, Side)>,
}

struct Builder<'a> {
    rows: &'a [Vec<f64>],
    target: &'a [f64],
    config: &'a TreeConfig,
    n_features: usize,
    max_features: usize,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    impurity_decrease: Vec<f64>,
}

impl<'a> Builder<'a> {
    fn node_stats(&self, indices: &[usize]) -> (f64, f64) {
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| self.target[i]).sum::<f64>() / n;
        let sse = indices
            .iter()
            .map(|&i| (self.target[i] - mean).powi(2))
            .sum::<f64>();
        (mean, sse)
    }

    /// Grows the tree depth-first from an explicit work stack. Nodes are
    /// numbered in pre-order, left subtree first.
    fn build(&mut self, indices: &mut [usize]) {
        let mut pending = vec![PendingNode {
            start: 0,
            end: indices.len(),
            depth: 0,
            parent: None,
        }];
        while let Some(task) = pending.pop() {
            let id = self.nodes.len();
            let split_at = self.grow(&mut indices[task.start..task.end], task.depth);
            if let Some((parent, side)) = task.parent {
                if let Node::Split { left, right, .. } = &mut self.nodes[parent] {
                    match side {
                        Side::Left => *left = id,
                        Side::Right => *right = id,
                    }
                }
            }
            if let Some(n_left) = split_at {
                let mid = task.start + n_left;
                pending.push(PendingNode {
                    start: mid,
                    end: task.end,
                    depth: task.depth + 1,
                    parent: Some((id, Side::Right)),
                });
                pending.push(PendingNode {
                    start: task.start,
                    end: mid,
                    depth: task.depth + 1,
                    parent: Some((id, Side::Left)),
                });
            }
        }
    }

    /// Pushes one node for `indices`. When it splits, the slice is
    /// partitioned in place and the size of the left part is returned; the
    /// node's children are linked once they are built.
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> Option<usize> {
        let n = indices.len();
        let (mean, sse) = self.node_stats(indices);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: mean,
            samples: n,
        });

        let depth_ok = self.config.max_depth.map_or(true, |d| depth < d);
        let splittable = depth_ok
            && n >= self.config.min_samples_split
            && n >= 2 * self.config.min_samples_leaf
            && sse > PURE_EPSILON;
        if !splittable {
            return None;
        }

        let split = self.best_split(indices)?;
        let (goes_left, goes_right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.rows[i][split.feature] <= split.threshold);
        let n_left = goes_left.len();
        if n_left == 0 || n_left == n {
            return None;
        }
        indices[..n_left].copy_from_slice(&goes_left);
        indices[n_left..].copy_from_slice(&goes_right);

        let gain = (sse - split.left_sse - split.right_sse).max(0.0);
        self.impurity_decrease[split.feature] += gain;

        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: id,
            right: id,
            samples: n,
        };
        Some(n_left)
    }

    fn best_split(&mut self, indices: &[usize]) -> Option<SplitCandidate> {
        let min_leaf = self.config.min_samples_leaf;
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.target[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.target[i].powi(2)).sum();

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<(f64, SplitCandidate)> = None;
        let mut visited = 0;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in features {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (self.rows[i][feature], self.target[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            if pairs[0].0 == pairs[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for i in 0..n - 1 {
                let (x, y) = pairs[i];
                left_sum += y;
                left_sq += y * y;
                let next_x = pairs[i + 1].0;
                if x == next_x {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = (left_sq - left_sum * left_sum / n_left as f64).max(0.0);
                let right_sse = (right_sq - right_sum * right_sum / n_right as f64).max(0.0);
                let score = left_sse + right_sse;

                if best.as_ref().map_or(true, |(s, _)| score < *s) {
                    let mut threshold = x + (next_x - x) / 2.0;
                    if threshold >= next_x {
                        threshold = x;
                    }
                    best = Some((
                        score,
                        SplitCandidate {
                            feature,
                            threshold,
                            left_sse,
                            right_sse,
                        },
                    ));
                }
            }
        }
        best.map(|(_, candidate)| candidate)
    }
}

impl DecisionTreeRegressor {
    /// Grows a tree on the rows listed in `sample`.
    ///
    /// `sample` may repeat indices (bootstrap draws). Inputs are assumed to be
    /// validated: non-empty, rectangular and finite.
    pub fn fit(
        rows: &[Vec<f64>],
        target: &[f64],
        sample: &[usize],
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut indices = sample.to_vec();
        let mut builder = Builder {
            rows,
            target,
            config,
            n_features,
            max_features: config.max_features.resolve(n_features),
            rng,
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
        };
        if !indices.is_empty() {
            builder.build(&mut indices);
        }
        Self {
            nodes: builder.nodes,
            n_features,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    /// Predicts the target for one row of `n_features` values.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf; a lone root leaf has depth 0.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0, 0)];
        while let Some((id, depth)) = stack.pop() {
            match &self.nodes[id] {
                Node::Leaf { .. } => deepest = deepest.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        deepest
    }

    /// Impurity-based importances, normalized to sum to 1. All zeros for a
    /// tree that never split.
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.n_features]
        }
    }

    /// Checks the arena for structural problems after deserialization.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        if self.impurity_decrease.len() != self.n_features {
            return Err(format!(
                "importance vector has {} entries for {} features",
                self.impurity_decrease.len(),
                self.n_features
            ));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Leaf { value, .. } = node {
                if !value.is_finite() {
                    return Err(format!("leaf {id} has a non-finite value"));
                }
            }
            if let Node::Split {
                feature,
                left,
                right,
                threshold,
                ..
            } = node
            {
                if *feature >= self.n_features {
                    return Err(format!("node {id} splits on feature {feature}"));
                }
                // Children are always pushed after their parent.
                if *left <= id || *right <= id || *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(format!("node {id} has out-of-range children"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {id} has a non-finite threshold"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fit_all(rows: &[Vec<f64>], target: &[f64], config: &TreeConfig) -> DecisionTreeRegressor {
        let sample: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(0);
        DecisionTreeRegressor::fit(rows, target, &sample, config, &mut rng)
    }

    #[test]
    fn test_fully_grown_tree_memorizes() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let target = vec![5.0, 3.0, 8.0, 1.0, 9.0, 2.0, 7.0, 4.0];
        let tree = fit_all(&rows, &target, &TreeConfig::default());
        for (row, y) in rows.iter().zip(&target) {
            assert_eq!(tree.predict_row(row), *y);
        }
        assert_eq!(tree.n_leaves(), 8);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let tree = fit_all(&rows, &[4.0, 4.0, 4.0], &TreeConfig::default());
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict_row(&[100.0]), 4.0);
        assert_eq!(tree.feature_importances(), vec![0.0]);
    }

    #[test]
    fn test_threshold_is_midpoint() {
        let rows = vec![vec![1.0], vec![3.0]];
        let tree = fit_all(&rows, &[10.0, 20.0], &TreeConfig::default());
        match &tree.nodes()[0] {
            Node::Split { threshold, .. } => assert_eq!(*threshold, 2.0),
            other => panic!("expected a split, got {other:?}"),
        }
        assert_eq!(tree.predict_row(&[2.0]), 10.0);
        assert_eq!(tree.predict_row(&[2.1]), 20.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let rows: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let target: Vec<f64> = (0..16).map(|i| (i * i) as f64).collect();
        let config = TreeConfig {
            max_depth: Some(2),
            ..TreeConfig::default()
        };
        let tree = fit_all(&rows, &target, &config);
        assert_eq!(tree.depth(), 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let target: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let config = TreeConfig {
            min_samples_leaf: 3,
            ..TreeConfig::default()
        };
        let tree = fit_all(&rows, &target, &config);
        for node in tree.nodes() {
            if let Node::Leaf { samples, .. } = node {
                assert!(*samples >= 3, "leaf with {samples} samples");
            }
        }
    }

    #[test]
    fn test_importance_goes_to_informative_feature() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![7.0, i as f64]).collect();
        let target: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 100.0 }).collect();
        let tree = fit_all(&rows, &target, &TreeConfig::default());
        let imp = tree.feature_importances();
        assert_eq!(imp[0], 0.0);
        assert!((imp[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_child() {
        let mut tree = fit_all(&[vec![1.0], vec![3.0]], &[10.0, 20.0], &TreeConfig::default());
        if let Node::Split { right, .. } = &mut tree.nodes[0] {
            *right = 99;
        }
        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_leaf() {
        let mut tree = fit_all(&[vec![1.0], vec![3.0]], &[10.0, 20.0], &TreeConfig::default());
        for node in &mut tree.nodes {
            if let Node::Leaf { value, .. } = node {
                *value = f64::NAN;
            }
        }
        assert!(tree.validate().unwrap_err().contains("non-finite value"));

        let mut tree = fit_all(&[vec![1.0]], &[10.0], &TreeConfig::default());
        tree.nodes[0] = Node::Leaf {
            value: f64::INFINITY,
            samples: 1,
        };
        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_children_follow_parents_in_preorder() {
        let rows: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64]).collect();
        let target: Vec<f64> = (0..12).map(|i| ((i * 7) % 5) as f64).collect();
        let tree = fit_all(&rows, &target, &TreeConfig::default());
        for (id, node) in tree.nodes().iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                assert_eq!(*left, id + 1, "left child of {id} is not next in pre-order");
                assert!(*right > *left);
            }
        }
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_deep_chain_fits_on_small_stack() {
        // Each target dominates all smaller ones, so every split peels off
        // the largest remaining sample and the tree degenerates to a chain.
        let n = 200;
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let target: Vec<f64> = (0..n).map(|i| 3f64.powi(i as i32)).collect();
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024)
            .spawn(move || {
                let tree = fit_all(&rows, &target, &TreeConfig::default());
                let depth = tree.depth();
                let memorized = rows
                    .iter()
                    .zip(&target)
                    .all(|(row, y)| tree.predict_row(row) == *y);
                (depth, memorized, tree.validate().is_ok())
            })
            .unwrap();
        let (depth, memorized, valid) = handle.join().unwrap();
        assert!(depth >= 100, "depth {depth}");
        assert!(memorized);
        assert!(valid);
    }
}
