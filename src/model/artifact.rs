//! Model artifact JSON schema.
//!
//! The artifact is a gradient-boosted tree ensemble exported with its feature
//! schema. Trees use XGBoost-style parallel node arrays:
//!
//! ```text
//! left_children[i] == -1      -> node i is a leaf with value base_weights[i]
//! x[split_indices[i]] < split_conditions[i] -> go left, else right
//! x is NaN                    -> follow default_left[i]
//! ```
//!
//! `split_indices` address the *encoded* row: numeric features take one column,
//! categorical features take one one-hot column per training category.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::MODEL_FEATURES;
use crate::error::AppError;

pub const ARTIFACT_FORMAT: &str = "revenue-gbdt";
pub const ARTIFACT_VERSION: u32 = 1;

/// Transform applied to the target during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetTransform {
    Log1p,
    Identity,
}

/// One input feature as the model was trained on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureSpec {
    Numeric {
        name: String,
    },
    Categorical {
        name: String,
        categories: Vec<String>,
        /// Token the training pipeline used for absent values.
        #[serde(default)]
        missing_value: String,
    },
}

impl FeatureSpec {
    pub fn name(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name } | FeatureSpec::Categorical { name, .. } => name,
        }
    }

    /// Number of encoded columns this feature occupies.
    pub fn width(&self) -> usize {
        match self {
            FeatureSpec::Numeric { .. } => 1,
            FeatureSpec::Categorical { categories, .. } => categories.len(),
        }
    }
}

/// Parallel node arrays for one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArrays {
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<u32>,
    pub split_conditions: Vec<f64>,
    pub default_left: Vec<i32>,
    pub base_weights: Vec<f64>,
}

impl TreeArrays {
    pub fn num_nodes(&self) -> usize {
        self.left_children.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub version: u32,
    pub target_transform: TargetTransform,
    #[serde(default)]
    pub base_score: f64,
    pub features: Vec<FeatureSpec>,
    pub trees: Vec<TreeArrays>,
}

impl ModelArtifact {
    /// Read and header-check an artifact file.
    pub fn load_json(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::model_unavailable(format!(
                "Failed to open model artifact '{}': {e}",
                path.display()
            ))
        })?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            AppError::model_unavailable(format!(
                "Failed to deserialize model artifact '{}': {e}",
                path.display()
            ))
        })?;
        artifact.check_header()?;
        Ok(artifact)
    }

    /// Verify format, version, target transform and the feature contract.
    pub fn check_header(&self) -> Result<(), AppError> {
        if self.format != ARTIFACT_FORMAT {
            return Err(AppError::model_unavailable(format!(
                "Unsupported artifact format '{}' (expected '{ARTIFACT_FORMAT}').",
                self.format
            )));
        }
        if self.version != ARTIFACT_VERSION {
            return Err(AppError::model_unavailable(format!(
                "Unsupported artifact version {} (expected {ARTIFACT_VERSION}).",
                self.version
            )));
        }
        // Predictions are always inverted with expm1.
        if self.target_transform != TargetTransform::Log1p {
            return Err(AppError::model_unavailable(
                "Artifact must be trained on a log1p-transformed target.",
            ));
        }

        let names: Vec<&str> = self.features.iter().map(FeatureSpec::name).collect();
        if names != MODEL_FEATURES {
            return Err(AppError::model_unavailable(format!(
                "Artifact features {names:?} do not match the expected order {MODEL_FEATURES:?}."
            )));
        }
        Ok(())
    }

    /// Total width of the encoded feature row.
    pub fn encoded_width(&self) -> usize {
        self.features.iter().map(FeatureSpec::width).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Vec<FeatureSpec> {
        MODEL_FEATURES
            .iter()
            .map(|name| FeatureSpec::Numeric {
                name: name.to_string(),
            })
            .collect()
    }

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            target_transform: TargetTransform::Log1p,
            base_score: 0.0,
            features: features(),
            trees: Vec::new(),
        }
    }

    #[test]
    fn header_accepts_expected_features() {
        assert!(artifact().check_header().is_ok());
    }

    #[test]
    fn header_rejects_reordered_features() {
        let mut a = artifact();
        a.features.swap(0, 1);
        let err = a.check_header().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ModelUnavailable);
        assert!(err.message().contains("do not match"));
    }

    #[test]
    fn header_rejects_untransformed_target() {
        let mut a = artifact();
        a.target_transform = TargetTransform::Identity;
        assert!(a.check_header().is_err());
    }

    #[test]
    fn feature_spec_parses_tagged_json() {
        let spec: FeatureSpec = serde_json::from_str(
            r#"{"kind": "categorical", "name": "category", "categories": ["", "Software"]}"#,
        )
        .unwrap();
        assert_eq!(spec.width(), 2);
        match spec {
            FeatureSpec::Categorical { missing_value, .. } => assert_eq!(missing_value, ""),
            FeatureSpec::Numeric { .. } => panic!("expected categorical"),
        }
    }

    #[test]
    fn missing_file_is_model_unavailable() {
        let err = ModelArtifact::load_json(Path::new("does/not/exist.json")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ModelUnavailable);
    }
}
