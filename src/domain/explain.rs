//! Attribution normalisation.
//!
//! Classifiers report per-feature contributions in one of three shapes.
//! [`RawAttributions::for_class`] reduces any of them to one signed value
//! per input feature for the predicted class.

use std::collections::BTreeMap;

use super::patient::{FEATURE_COUNT, FEATURE_NAMES};

/// Attribution extraction failed; the assessment continues without it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    #[error("attributions not supported by this classifier")]
    Unsupported,

    #[error("attribution shape mismatch: {0}")]
    Shape(String),

    #[error("class index {class} out of range for {classes} classes")]
    ClassOutOfRange { class: usize, classes: usize },

    #[error("attribution computation failed: {0}")]
    Internal(String),
}

/// Attributions as a classifier produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAttributions {
    /// One feature array per class.
    PerClass(Vec<Vec<f64>>),

    /// A single feature array, already for the predicted class.
    Selected(Vec<f64>),

    /// Flat `(sample, feature, class)` tensor in row-major order.
    Tensor {
        values: Vec<f64>,
        samples: usize,
        features: usize,
        classes: usize,
    },
}

impl RawAttributions {
    /// One value per feature for `class` of the first (only) sample.
    ///
    /// # Errors
    /// Returns error when the shape does not fit `n_features` or `class`.
    pub fn for_class(&self, class: usize, n_features: usize) -> Result<Vec<f64>, ExplainError> {
        let values = match self {
            Self::PerClass(per_class) => per_class
                .get(class)
                .cloned()
                .ok_or(ExplainError::ClassOutOfRange {
                    class,
                    classes: per_class.len(),
                })?,
            Self::Selected(values) => values.clone(),
            Self::Tensor {
                values,
                samples,
                features,
                classes,
            } => {
                if *samples == 0 || samples * features * classes != values.len() {
                    return Err(ExplainError::Shape(format!(
                        "tensor ({samples}, {features}, {classes}) holds {} values",
                        values.len()
                    )));
                }
                if class >= *classes {
                    return Err(ExplainError::ClassOutOfRange {
                        class,
                        classes: *classes,
                    });
                }
                // sample 0
                (0..*features).map(|f| values[f * classes + class]).collect()
            }
        };

        if values.len() != n_features {
            return Err(ExplainError::Shape(format!(
                "expected {n_features} features, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExplainError::Internal("non-finite attribution".into()));
        }
        Ok(values)
    }
}

/// Map normalised attributions onto feature names.
///
/// # Errors
/// Returns error when the attributions cannot be normalised.
pub fn named_attributions(
    raw: &RawAttributions,
    class: usize,
) -> Result<BTreeMap<String, f64>, ExplainError> {
    let values = raw.for_class(class, FEATURE_COUNT)?;
    Ok(FEATURE_NAMES
        .iter()
        .zip(values)
        .map(|(name, v)| ((*name).to_string(), v))
        .collect())
}

/// Attributions with magnitude at or below this are noise.
pub const NARRATIVE_THRESHOLD: f64 = 0.01;

/// How many attributions appear in the narrative.
pub const NARRATIVE_TOP_K: usize = 3;

/// Render the strongest attributions as narrative lines.
///
/// Ranks by absolute value, ties in canonical feature order.
#[must_use]
pub fn narrative(attributions: &BTreeMap<String, f64>) -> Vec<String> {
    let mut ranked: Vec<(usize, &str, f64)> = FEATURE_NAMES
        .iter()
        .enumerate()
        .filter_map(|(pos, name)| attributions.get(*name).map(|v| (pos, *name, *v)))
        .collect();

    ranked.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(NARRATIVE_TOP_K)
        .filter(|(_, _, v)| v.abs() > NARRATIVE_THRESHOLD)
        .map(|(_, name, v)| {
            let direction = if v > 0.0 { "increased" } else { "decreased" };
            format!("{name} {direction} risk (Impact: {v:.2})")
        })
        .collect()
}
