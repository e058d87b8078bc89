use crate::error::ModelError;
use crate::features::{FeatureVector, FEATURE_ORDER};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Versioned classifier artifact: logistic-regression weights plus the
/// decision thresholds the policy reads. Loaded once, validated, then
/// treated as read-only; swaps go through [`ModelStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelParameters {
    pub version: String,
    pub expected_length: usize,
    pub feature_order: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub low_threshold: f64,
    pub high_threshold: f64,
}

/// Raw model output for one email.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreResult {
    /// Spam probability in [0, 1].
    pub raw_score: f64,
    pub model_version: String,
}

/// One feature's share of the score, used for rationale rendering.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureContribution {
    pub name: String,
    pub value: f64,
    pub contribution: f64,
}

impl ModelParameters {
    /// Parse a YAML artifact and validate it. Invalid artifacts are a
    /// deployment problem and are rejected here, never per request.
    pub fn from_yaml(text: &str) -> Result<Self, ModelError> {
        let model: ModelParameters =
            serde_yaml::from_str(text).map_err(|e| ModelError::Invalid {
                reason: e.to_string(),
            })?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_yaml(&self) -> String {
        // a validated model always serializes
        serde_yaml::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version.trim().is_empty() {
            return Err(invalid("version must be non-empty"));
        }
        if self.weights.len() != self.expected_length {
            return Err(ModelError::DimensionMismatch {
                expected: self.expected_length,
                actual: self.weights.len(),
            });
        }
        if self.feature_order.len() != self.expected_length {
            return Err(invalid(&format!(
                "feature_order has {} entries, expected {}",
                self.feature_order.len(),
                self.expected_length
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(invalid("weights and bias must be finite"));
        }
        for (name, value) in [
            ("low_threshold", self.low_threshold),
            ("high_threshold", self.high_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(invalid(&format!("{name} must lie in [0, 1]")));
            }
        }
        if self.low_threshold > self.high_threshold {
            return Err(invalid("low_threshold must not exceed high_threshold"));
        }
        Ok(())
    }

    /// Pure scoring function: sigmoid of the weighted feature sum.
    pub fn score(&self, features: &FeatureVector) -> Result<ScoreResult, ModelError> {
        self.check_dimension(features)?;
        let z: f64 = self.bias
            + self
                .weights
                .iter()
                .zip(features.values())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        Ok(ScoreResult {
            raw_score: sigmoid(z).clamp(0.0, 1.0),
            model_version: self.version.clone(),
        })
    }

    /// Per-feature weighted contributions, in feature declaration order.
    pub fn contributions(
        &self,
        features: &FeatureVector,
    ) -> Result<Vec<FeatureContribution>, ModelError> {
        self.check_dimension(features)?;
        Ok(self
            .feature_order
            .iter()
            .zip(self.weights.iter())
            .zip(features.values())
            .map(|((name, w), x)| FeatureContribution {
                name: name.clone(),
                value: *x,
                contribution: w * x,
            })
            .collect())
    }

    fn check_dimension(&self, features: &FeatureVector) -> Result<(), ModelError> {
        if features.len() != self.expected_length {
            return Err(ModelError::DimensionMismatch {
                expected: self.expected_length,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

impl Default for ModelParameters {
    /// Baseline calibration for the default feature set. Treat the
    /// numbers as configuration: deployments tune them from labeled mail.
    fn default() -> Self {
        Self {
            version: "2026.08-baseline".to_string(),
            expected_length: FEATURE_ORDER.len(),
            feature_order: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            weights: vec![
                0.9,  // keyword_hits
                2.0,  // uppercase_ratio
                0.6,  // punct_bursts
                0.0,  // avg_word_length
                -0.3, // body_length
                0.8,  // link_count
                2.0,  // link_ratio
                0.5,  // html_tags
                0.2,  // attachment_headers
                1.5,  // from_replyto_mismatch
                0.4,  // missing_auth_headers
                1.0,  // subject_all_caps
                0.5,  // subject_punct
            ],
            bias: -3.0,
            low_threshold: 0.3,
            high_threshold: 0.7,
        }
    }
}

fn invalid(reason: &str) -> ModelError {
    ModelError::Invalid {
        reason: reason.to_string(),
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Shared handle to the active model. Readers clone the inner `Arc`, so a
/// swap publishes a complete model in one step and calls already in
/// flight keep the version they started with.
pub struct ModelStore {
    inner: RwLock<Arc<ModelParameters>>,
}

impl ModelStore {
    pub fn new(model: ModelParameters) -> Result<Self, ModelError> {
        model.validate()?;
        Ok(Self {
            inner: RwLock::new(Arc::new(model)),
        })
    }

    pub fn current(&self) -> Arc<ModelParameters> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate and atomically publish a replacement model.
    pub fn swap(&self, model: ModelParameters) -> Result<(), ModelError> {
        model.validate()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        log::info!("model swap: {} -> {}", guard.version, model.version);
        *guard = Arc::new(model);
        Ok(())
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Arc::new(ModelParameters::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::normalizer::EmailNormalizer;

    fn vector_for(raw: &str) -> FeatureVector {
        FeatureExtractor::default().extract(&EmailNormalizer::new().normalize(raw))
    }

    #[test]
    fn default_model_is_valid() {
        assert!(ModelParameters::default().validate().is_ok());
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let model = ModelParameters::default();
        for raw in [
            "a calm and ordinary sentence about nothing much",
            "FREE MONEY!!! WINNER!!! http://x.example/a http://y.example/b",
        ] {
            let score = model.score(&vector_for(raw)).unwrap();
            assert!((0.0..=1.0).contains(&score.raw_score));
            assert_eq!(score.model_version, model.version);
        }
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let mut model = ModelParameters::default();
        model.expected_length = 4;
        model.weights.truncate(4);
        model.feature_order.truncate(4);
        model.validate().unwrap();

        let err = model
            .score(&vector_for("ordinary message body"))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DimensionMismatch {
                expected: 4,
                actual: FEATURE_ORDER.len()
            }
        );
    }

    #[test]
    fn contributions_align_with_feature_order() {
        let model = ModelParameters::default();
        let contributions = model
            .contributions(&vector_for("free money winner"))
            .unwrap();
        assert_eq!(contributions.len(), model.expected_length);
        assert_eq!(contributions[0].name, "keyword_hits");
        assert_eq!(contributions[0].value, 3.0);
        assert!((contributions[0].contribution - 2.7).abs() < 1e-9);
    }

    #[test]
    fn yaml_round_trip() {
        let model = ModelParameters::default();
        let parsed = ModelParameters::from_yaml(&model.to_yaml()).unwrap();
        assert_eq!(parsed, model);
    }

    #[test]
    fn validation_rejects_bad_artifacts() {
        let mut short = ModelParameters::default();
        short.weights.pop();
        assert!(matches!(
            short.validate(),
            Err(ModelError::DimensionMismatch { .. })
        ));

        let mut nan = ModelParameters::default();
        nan.bias = f64::NAN;
        assert!(matches!(nan.validate(), Err(ModelError::Invalid { .. })));

        let mut inverted = ModelParameters::default();
        inverted.low_threshold = 0.9;
        assert!(matches!(
            inverted.validate(),
            Err(ModelError::Invalid { .. })
        ));
    }

    #[test]
    fn store_swap_publishes_new_version() {
        let store = ModelStore::default();
        assert_eq!(store.current().version, "2026.08-baseline");

        let mut next = ModelParameters::default();
        next.version = "2026.09-tuned".to_string();
        store.swap(next).unwrap();
        assert_eq!(store.current().version, "2026.09-tuned");

        // a handle taken before a swap is unaffected by later swaps
        let held = store.current();
        let mut third = ModelParameters::default();
        third.version = "2026.10".to_string();
        store.swap(third).unwrap();
        assert_eq!(held.version, "2026.09-tuned");
    }

    #[test]
    fn swap_rejects_invalid_model() {
        let store = ModelStore::default();
        let mut bad = ModelParameters::default();
        bad.weights.clear();
        assert!(store.swap(bad).is_err());
        assert_eq!(store.current().version, "2026.08-baseline");
    }
}
