//! Tree-ensemble regressor.
//!
//! Converts a validated [`ModelArtifact`] into a compact in-memory form:
//! column encoders for the feature vector plus per-tree node arrays.
//! Prediction is `base_score + Σ leaf(tree, row)`.

use std::collections::HashMap;

use crate::domain::{FeatureValue, FeatureVector};
use crate::error::AppError;
use crate::model::Regressor;
use crate::model::artifact::{FeatureSpec, ModelArtifact, TreeArrays};

/// Sentinel child index marking a leaf.
const LEAF: i32 = -1;

#[derive(Debug, Clone)]
enum ColumnEncoder {
    Numeric {
        name: String,
        offset: usize,
    },
    /// One column per training category. Unknown labels encode as all zeros.
    OneHot {
        name: String,
        offset: usize,
        index: HashMap<String, usize>,
        missing_value: String,
    },
}

impl ColumnEncoder {
    fn name(&self) -> &str {
        match self {
            ColumnEncoder::Numeric { name, .. } | ColumnEncoder::OneHot { name, .. } => name,
        }
    }

    fn write(&self, value: &FeatureValue, row: &mut [f64]) -> Result<(), AppError> {
        match self {
            ColumnEncoder::Numeric { name, offset } => {
                row[*offset] = match value {
                    FeatureValue::Numeric(v) => *v,
                    FeatureValue::Missing => f64::NAN,
                    FeatureValue::Label(label) => {
                        return Err(AppError::internal(format!(
                            "Feature `{name}` is numeric but received label '{label}'."
                        )));
                    }
                };
            }
            ColumnEncoder::OneHot {
                name,
                offset,
                index,
                missing_value,
            } => {
                let label = match value {
                    FeatureValue::Label(label) => label.as_str(),
                    FeatureValue::Missing => missing_value.as_str(),
                    FeatureValue::Numeric(v) => {
                        return Err(AppError::internal(format!(
                            "Feature `{name}` is categorical but received number {v}."
                        )));
                    }
                };
                if let Some(pos) = index.get(label) {
                    row[offset + pos] = 1.0;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i32>,
    right: Vec<i32>,
    split_index: Vec<usize>,
    threshold: Vec<f64>,
    default_left: Vec<bool>,
    value: Vec<f64>,
}

impl Tree {
    fn from_arrays(tree_idx: usize, arrays: &TreeArrays, width: usize) -> Result<Self, AppError> {
        let n = arrays.num_nodes();
        let invalid = |msg: String| AppError::model_unavailable(format!("Tree {tree_idx}: {msg}"));

        if n == 0 {
            return Err(invalid("tree has no nodes".to_string()));
        }
        let lengths = [
            arrays.right_children.len(),
            arrays.split_indices.len(),
            arrays.split_conditions.len(),
            arrays.default_left.len(),
            arrays.base_weights.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(invalid(format!("node arrays have mismatched lengths (expected {n})")));
        }

        for i in 0..n {
            let (l, r) = (arrays.left_children[i], arrays.right_children[i]);
            if l == LEAF {
                if r != LEAF {
                    return Err(invalid(format!("node {i} has a right child but no left child")));
                }
                if !arrays.base_weights[i].is_finite() {
                    return Err(invalid(format!("leaf {i} has a non-finite value")));
                }
                continue;
            }
            // Children must point strictly forward so traversal always terminates.
            for child in [l, r] {
                if child <= i as i32 || child as usize >= n {
                    return Err(invalid(format!("node {i} has invalid child index {child}")));
                }
            }
            if arrays.split_indices[i] as usize >= width {
                return Err(invalid(format!(
                    "node {i} splits on column {} but rows have {width} columns",
                    arrays.split_indices[i]
                )));
            }
            if arrays.split_conditions[i].is_nan() {
                return Err(invalid(format!("node {i} has a NaN split condition")));
            }
        }

        Ok(Self {
            left: arrays.left_children.clone(),
            right: arrays.right_children.clone(),
            split_index: arrays.split_indices.iter().map(|&s| s as usize).collect(),
            threshold: arrays.split_conditions.clone(),
            default_left: arrays.default_left.iter().map(|&d| d != 0).collect(),
            value: arrays.base_weights.clone(),
        })
    }

    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut node = 0usize;
        loop {
            if self.left[node] == LEAF {
                return self.value[node];
            }
            let x = row[self.split_index[node]];
            let go_left = if x.is_nan() {
                self.default_left[node]
            } else {
                x < self.threshold[node]
            };
            let next = if go_left { self.left[node] } else { self.right[node] };
            node = next as usize;
        }
    }
}

/// A loaded gradient-boosted tree ensemble.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    base_score: f64,
    encoders: Vec<ColumnEncoder>,
    width: usize,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Build from an artifact, validating every tree against the encoded width.
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self, AppError> {
        artifact.check_header()?;

        if !artifact.base_score.is_finite() {
            return Err(AppError::model_unavailable("Artifact base_score is not finite."));
        }

        let mut encoders = Vec::with_capacity(artifact.features.len());
        let mut offset = 0usize;
        for spec in &artifact.features {
            match spec {
                FeatureSpec::Numeric { name } => encoders.push(ColumnEncoder::Numeric {
                    name: name.clone(),
                    offset,
                }),
                FeatureSpec::Categorical {
                    name,
                    categories,
                    missing_value,
                } => {
                    let mut index = HashMap::with_capacity(categories.len());
                    for (pos, category) in categories.iter().enumerate() {
                        if index.insert(category.clone(), pos).is_some() {
                            return Err(AppError::model_unavailable(format!(
                                "Feature `{name}` lists category '{category}' twice."
                            )));
                        }
                    }
                    encoders.push(ColumnEncoder::OneHot {
                        name: name.clone(),
                        offset,
                        index,
                        missing_value: missing_value.clone(),
                    });
                }
            }
            offset += spec.width();
        }
        let width = offset;

        let trees = artifact
            .trees
            .iter()
            .enumerate()
            .map(|(idx, arrays)| Tree::from_arrays(idx, arrays, width))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_score: artifact.base_score,
            encoders,
            width,
            trees,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Width of the encoded row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Encode a feature vector into a dense row.
    pub fn encode(&self, features: &FeatureVector) -> Result<Vec<f64>, AppError> {
        let given = features.iter().count();
        if given != self.encoders.len() {
            return Err(AppError::internal(format!(
                "Expected {} features, got {given}.",
                self.encoders.len(),
            )));
        }
        let mut row = vec![0.0; self.width];
        for (encoder, (name, value)) in self.encoders.iter().zip(features.iter()) {
            if encoder.name() != name {
                return Err(AppError::internal(format!(
                    "Feature order mismatch: model expects `{}`, got `{name}`.",
                    encoder.name()
                )));
            }
            encoder.write(value, &mut row)?;
        }
        Ok(row)
    }
}

impl Regressor for TreeEnsemble {
    fn predict_log(&self, features: &FeatureVector) -> Result<f64, AppError> {
        let row = self.encode(features)?;
        Ok(self.base_score + self.trees.iter().map(|t| t.leaf_value(&row)).sum::<f64>())
    }

    fn describe(&self) -> String {
        format!("tree ensemble ({} trees, {} encoded columns)", self.num_trees(), self.width)
    }
}
