//! Multinomial logistic regression classifier.
//!
//! Margin of class `k` is `intercept[k] + Σ coef[k][j] * x[j]`; probabilities
//! are the softmax of the margins. Attributions are the linear contributions
//! relative to the training feature means, reported as a
//! `(sample, feature, class)` tensor.

use serde::{Deserialize, Serialize};

use super::trees::softmax;
use crate::domain::{ExplainError, FeatureVector, RawAttributions, FEATURE_COUNT};
use crate::ports::{ClassifierError, RiskClassifier};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LogisticError {
    #[error("model declares {0} classes, need at least 2")]
    TooFewClasses(usize),

    #[error("expected {expected} intercepts, got {got}")]
    Intercepts { expected: usize, got: usize },

    #[error("class {class}: expected {expected} coefficients, got {got}")]
    Coefficients {
        class: usize,
        expected: usize,
        got: usize,
    },

    #[error("expected {expected} feature means, got {got}")]
    FeatureMeans { expected: usize, got: usize },

    #[error("non-finite parameter")]
    NonFinite,
}

/// Serialized parameters as stored in the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticParams {
    /// One row of coefficients per class
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,

    /// Training means used as the attribution baseline; zeros when absent
    #[serde(default)]
    pub feature_means: Option<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct MultinomialLogistic {
    coefficients: Vec<[f64; FEATURE_COUNT]>,
    intercepts: Vec<f64>,
    feature_means: [f64; FEATURE_COUNT],
}

impl MultinomialLogistic {
    /// Validate serialized parameters.
    ///
    /// # Errors
    /// Returns error on dimension mismatches or non-finite values.
    pub fn from_params(params: LogisticParams) -> Result<Self, LogisticError> {
        let classes = params.coefficients.len();
        if classes < 2 {
            return Err(LogisticError::TooFewClasses(classes));
        }
        if params.intercepts.len() != classes {
            return Err(LogisticError::Intercepts {
                expected: classes,
                got: params.intercepts.len(),
            });
        }

        let mut coefficients = Vec::with_capacity(classes);
        for (class, row) in params.coefficients.iter().enumerate() {
            let row: [f64; FEATURE_COUNT] =
                row.as_slice()
                    .try_into()
                    .map_err(|_| LogisticError::Coefficients {
                        class,
                        expected: FEATURE_COUNT,
                        got: row.len(),
                    })?;
            coefficients.push(row);
        }

        let feature_means: [f64; FEATURE_COUNT] = match params.feature_means {
            Some(means) => {
                let got = means.len();
                means
                    .try_into()
                    .map_err(|_| LogisticError::FeatureMeans {
                        expected: FEATURE_COUNT,
                        got,
                    })?
            }
            None => [0.0; FEATURE_COUNT],
        };

        let finite = coefficients.iter().flatten().all(|v| v.is_finite())
            && params.intercepts.iter().all(|v| v.is_finite())
            && feature_means.iter().all(|v| v.is_finite());
        if !finite {
            return Err(LogisticError::NonFinite);
        }

        Ok(Self {
            coefficients,
            intercepts: params.intercepts,
            feature_means,
        })
    }

    #[must_use]
    pub fn margins(&self, features: &FeatureVector) -> Vec<f64> {
        let x = features.to_array();
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + w.iter().zip(&x).map(|(w, x)| w * x).sum::<f64>())
            .collect()
    }
}

impl RiskClassifier for MultinomialLogistic {
    fn kind(&self) -> &'static str {
        "multinomial_logistic"
    }

    fn num_classes(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        softmax(&self.margins(features))
    }

    fn attributions(&self, features: &FeatureVector) -> Result<RawAttributions, ExplainError> {
        let x = features.to_array();
        let classes = self.coefficients.len();
        let mut values = vec![0.0; FEATURE_COUNT * classes];
        for (k, w) in self.coefficients.iter().enumerate() {
            for f in 0..FEATURE_COUNT {
                values[f * classes + k] = w[f] * (x[f] - self.feature_means[f]);
            }
        }
        Ok(RawAttributions::Tensor {
            values,
            samples: 1,
            features: FEATURE_COUNT,
            classes,
        })
    }
}
