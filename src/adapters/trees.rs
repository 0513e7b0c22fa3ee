//! Gradient-boosted decision tree classifier.
//!
//! Evaluation follows the XGBoost convention: at a split, `x < threshold`
//! goes to `yes`, anything else (including NaN) to `no`. Each tree adds its
//! leaf value to the margin of one class; probabilities are the softmax of
//! the per-class margins.
//!
//! Attributions use path contributions: every split on the decision path
//! credits its feature with the change in cover-weighted expected value
//! between the node and the child taken. Per class, contributions plus the
//! root expectations add up to the margin exactly.

use serde::{Deserialize, Serialize};

use crate::domain::{ExplainError, FeatureVector, RawAttributions, FEATURE_COUNT};
use crate::ports::{ClassifierError, RiskClassifier};

/// Structural problem in a tree ensemble.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("ensemble has no trees")]
    Empty,

    #[error("ensemble declares {0} classes, need at least 2")]
    TooFewClasses(usize),

    #[error("expected {expected} base margins, got {got}")]
    BaseMargin { expected: usize, got: usize },

    #[error("tree {tree}: class {class} out of range")]
    ClassOutOfRange { tree: usize, class: usize },

    #[error("tree {tree}: no nodes")]
    EmptyTree { tree: usize },

    #[error("tree {tree} node {node}: feature {feature} out of range")]
    FeatureOutOfRange {
        tree: usize,
        node: usize,
        feature: usize,
    },

    #[error("tree {tree} node {node}: child {child} must come after its parent and exist")]
    BadChild { tree: usize, node: usize, child: usize },

    #[error("tree {tree} node {node}: non-finite parameter")]
    NonFinite { tree: usize, node: usize },

    #[error("tree {tree} node {node}: leaf cover must be positive")]
    NonPositiveCover { tree: usize, node: usize },
}

/// One node of a serialized tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
    },
    Leaf {
        value: f64,
        /// Training samples (or hessian sum) that reached this leaf
        cover: f64,
    },
}

/// A serialized regression tree contributing to one class margin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub class: usize,
    pub nodes: Vec<TreeNode>,
}

/// Serialized ensemble parameters as stored in the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsembleParams {
    pub num_classes: usize,
    pub base_margin: Vec<f64>,
    pub trees: Vec<RegressionTree>,
}

#[derive(Debug, Clone)]
struct CompiledTree {
    class: usize,
    nodes: Vec<TreeNode>,
    /// Cover-weighted expected leaf value below each node
    expected: Vec<f64>,
}

impl CompiledTree {
    fn compile(tree_idx: usize, tree: RegressionTree, num_classes: usize) -> Result<Self, TreeError> {
        if tree.class >= num_classes {
            return Err(TreeError::ClassOutOfRange {
                tree: tree_idx,
                class: tree.class,
            });
        }
        if tree.nodes.is_empty() {
            return Err(TreeError::EmptyTree { tree: tree_idx });
        }

        let len = tree.nodes.len();
        for (node, n) in tree.nodes.iter().enumerate() {
            match *n {
                TreeNode::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(TreeError::FeatureOutOfRange {
                            tree: tree_idx,
                            node,
                            feature,
                        });
                    }
                    if !threshold.is_finite() {
                        return Err(TreeError::NonFinite { tree: tree_idx, node });
                    }
                    // Children strictly after the parent: every walk terminates.
                    for child in [yes, no] {
                        if child <= node || child >= len {
                            return Err(TreeError::BadChild {
                                tree: tree_idx,
                                node,
                                child,
                            });
                        }
                    }
                }
                TreeNode::Leaf { value, cover } => {
                    if !value.is_finite() || !cover.is_finite() {
                        return Err(TreeError::NonFinite { tree: tree_idx, node });
                    }
                    if cover <= 0.0 {
                        return Err(TreeError::NonPositiveCover { tree: tree_idx, node });
                    }
                }
            }
        }

        // Children follow parents, so a reverse sweep sees children first.
        let mut expected = vec![0.0; len];
        let mut cover = vec![0.0; len];
        for idx in (0..len).rev() {
            match tree.nodes[idx] {
                TreeNode::Leaf { value, cover: c } => {
                    expected[idx] = value;
                    cover[idx] = c;
                }
                TreeNode::Split { yes, no, .. } => {
                    let total = cover[yes] + cover[no];
                    expected[idx] = (cover[yes] * expected[yes] + cover[no] * expected[no]) / total;
                    cover[idx] = total;
                }
            }
        }

        Ok(Self {
            class: tree.class,
            nodes: tree.nodes,
            expected,
        })
    }

    fn next(feature: usize, threshold: f64, yes: usize, no: usize, x: &[f64]) -> usize {
        if x[feature] < threshold {
            yes
        } else {
            no
        }
    }

    fn leaf_value(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                } => idx = Self::next(feature, threshold, yes, no, x),
            }
        }
    }

    fn add_contributions(&self, x: &[f64], out: &mut [f64]) {
        let mut idx = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            yes,
            no,
        } = self.nodes[idx]
        {
            let child = Self::next(feature, threshold, yes, no, x);
            out[feature] += self.expected[child] - self.expected[idx];
            idx = child;
        }
    }
}

/// Multi-class gradient-boosted tree ensemble with softmax output.
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    num_classes: usize,
    base_margin: Vec<f64>,
    trees: Vec<CompiledTree>,
}

impl GradientBoostedTrees {
    /// Validate and compile serialized parameters.
    ///
    /// # Errors
    /// Returns error if any tree is structurally invalid.
    pub fn from_params(params: TreeEnsembleParams) -> Result<Self, TreeError> {
        if params.num_classes < 2 {
            return Err(TreeError::TooFewClasses(params.num_classes));
        }
        if params.base_margin.len() != params.num_classes {
            return Err(TreeError::BaseMargin {
                expected: params.num_classes,
                got: params.base_margin.len(),
            });
        }
        if params.base_margin.iter().any(|m| !m.is_finite()) {
            return Err(TreeError::NonFinite { tree: 0, node: 0 });
        }
        if params.trees.is_empty() {
            return Err(TreeError::Empty);
        }

        let trees = params
            .trees
            .into_iter()
            .enumerate()
            .map(|(idx, tree)| CompiledTree::compile(idx, tree, params.num_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            num_classes: params.num_classes,
            base_margin: params.base_margin,
            trees,
        })
    }

    /// Raw per-class margins.
    #[must_use]
    pub fn margins(&self, features: &FeatureVector) -> Vec<f64> {
        let x = features.to_array();
        let mut margins = self.base_margin.clone();
        for tree in &self.trees {
            margins[tree.class] += tree.leaf_value(&x);
        }
        margins
    }

    /// Per-class margin with no evidence: base margin plus root expectations.
    #[must_use]
    pub fn expected_margins(&self) -> Vec<f64> {
        let mut expected = self.base_margin.clone();
        for tree in &self.trees {
            expected[tree.class] += tree.expected[0];
        }
        expected
    }

    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Numerically stable softmax.
pub(crate) fn softmax(margins: &[f64]) -> Result<Vec<f64>, ClassifierError> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Err(ClassifierError::NonFinite(format!("margin {max}")));
    }
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}

impl RiskClassifier for GradientBoostedTrees {
    fn kind(&self) -> &'static str {
        "gradient_boosted_trees"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        softmax(&self.margins(features))
    }

    fn attributions(&self, features: &FeatureVector) -> Result<RawAttributions, ExplainError> {
        let x = features.to_array();
        let mut per_class = vec![vec![0.0; FEATURE_COUNT]; self.num_classes];
        for tree in &self.trees {
            tree.add_contributions(&x, &mut per_class[tree.class]);
        }
        Ok(RawAttributions::PerClass(per_class))
    }
}
