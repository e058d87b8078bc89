use crate::classifier::{ModelParameters, ModelStore};
use crate::error::{ClassifyError, ModelError};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::normalizer::EmailNormalizer;
use crate::policy::{DecisionPolicy, Verdict};
use std::sync::Arc;

/// Input bounds, mirrored from the form layer that fronts the engine so
/// the core stays safe to call directly.
pub const MIN_INPUT_CHARS: usize = 10;
pub const MAX_INPUT_CHARS: usize = 50_000;

/// Orchestrates normalize → extract → score → decide. Holds no per-call
/// state; any number of `classify` calls may run concurrently against
/// the shared, atomically swappable model.
pub struct ClassificationEngine {
    normalizer: EmailNormalizer,
    extractor: FeatureExtractor,
    models: ModelStore,
}

impl ClassificationEngine {
    pub fn new(model: ModelParameters) -> Result<Self, ModelError> {
        Self::with_config(FeatureConfig::default(), model)
    }

    pub fn with_config(config: FeatureConfig, model: ModelParameters) -> Result<Self, ModelError> {
        let extractor = FeatureExtractor::new(config);
        check_model_fit(&extractor, &model)?;
        Ok(Self {
            normalizer: EmailNormalizer::new(),
            extractor,
            models: ModelStore::new(model)?,
        })
    }

    /// Classify one raw email. Fails only on the input length bounds;
    /// every internal stage is total for a validated model.
    pub fn classify(&self, raw: &str) -> Result<Verdict, ClassifyError> {
        let length = raw.chars().count();
        if length < MIN_INPUT_CHARS {
            return Err(ClassifyError::InputTooShort {
                length,
                min: MIN_INPUT_CHARS,
            });
        }
        if length > MAX_INPUT_CHARS {
            return Err(ClassifyError::InputTooLong {
                length,
                max: MAX_INPUT_CHARS,
            });
        }

        let model = self.models.current();
        let email = self.normalizer.normalize(raw);
        log::debug!(
            "normalized: {} headers, {} links, {} body chars",
            email.headers.len(),
            email.links.len(),
            email.body.chars().count()
        );

        let features = self.extractor.extract(&email);
        let score = model.score(&features)?;
        let contributions = model.contributions(&features)?;
        log::debug!(
            "scored {:.4} with model {}",
            score.raw_score,
            score.model_version
        );

        let policy = DecisionPolicy::new(model.low_threshold, model.high_threshold);
        let verdict = policy.decide(&score, &contributions);
        log::debug!(
            "verdict: {} ({:.1}% confidence)",
            verdict.label,
            verdict.confidence * 100.0
        );
        Ok(verdict)
    }

    /// Atomically replace the active model. Calls already in flight keep
    /// the model they started with.
    pub fn swap_model(&self, model: ModelParameters) -> Result<(), ModelError> {
        check_model_fit(&self.extractor, &model)?;
        self.models.swap(model)
    }

    pub fn current_model(&self) -> Arc<ModelParameters> {
        self.models.current()
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self {
            normalizer: EmailNormalizer::new(),
            extractor: FeatureExtractor::default(),
            models: ModelStore::default(),
        }
    }
}

/// A model that disagrees with the extractor about vector shape or
/// feature naming is a deployment bug; reject it before it can silently
/// score the wrong weights.
fn check_model_fit(
    extractor: &FeatureExtractor,
    model: &ModelParameters,
) -> Result<(), ModelError> {
    if model.expected_length != extractor.feature_len() {
        return Err(ModelError::DimensionMismatch {
            expected: model.expected_length,
            actual: extractor.feature_len(),
        });
    }
    for (position, (model_name, extractor_name)) in model
        .feature_order
        .iter()
        .zip(extractor.feature_order())
        .enumerate()
    {
        if model_name != extractor_name {
            return Err(ModelError::Invalid {
                reason: format!(
                    "feature_order mismatch at position {position}: model has '{model_name}', extractor emits '{extractor_name}'"
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::normalizer::EmailNormalizer;
    use crate::policy::Label;

    fn engine() -> ClassificationEngine {
        ClassificationEngine::default()
    }

    #[test]
    fn obvious_spam_is_labeled_spam_with_high_confidence() {
        let verdict = engine()
            .classify("FREE MONEY!!! Click http://bit.ly/xyz now, winner selected!!!")
            .unwrap();
        assert_eq!(verdict.label, Label::Spam);
        assert!(verdict.confidence >= 0.7);
        assert!(verdict.rationale.iter().any(|r| r.contains("keyword")));
        assert!(verdict.rationale.iter().any(|r| r.contains("link")));
    }

    #[test]
    fn ordinary_mail_is_labeled_ham() {
        let verdict = engine()
            .classify("Hi Maria, attaching the quarterly report as discussed, see you Thursday.")
            .unwrap();
        assert_eq!(verdict.label, Label::Ham);
        assert!(verdict.confidence > 0.8);
    }

    #[test]
    fn reply_to_mismatch_shows_up_in_rationale_and_score() {
        let engine = engine();
        let mismatched = engine
            .classify(
                "From: alice@corp.example\nReply-To: alice@freemail.example\nSubject: Meeting notes\n\nSee the notes from the meeting yesterday.",
            )
            .unwrap();
        let aligned = engine
            .classify(
                "From: alice@corp.example\nReply-To: billing@corp.example\nSubject: Meeting notes\n\nSee the notes from the meeting yesterday.",
            )
            .unwrap();

        assert!(mismatched
            .rationale
            .iter()
            .any(|r| r.contains("sender/reply-to domain mismatch")));
        // both ham here, but the mismatch measurably raises the raw score,
        // which shows as lower ham confidence
        assert_eq!(mismatched.label, Label::Ham);
        assert!(mismatched.confidence < aligned.confidence);
    }

    #[test]
    fn input_length_bounds_are_enforced() {
        let engine = engine();
        assert_eq!(
            engine.classify("too short").unwrap_err(),
            ClassifyError::InputTooShort {
                length: 9,
                min: MIN_INPUT_CHARS
            }
        );

        let long = "x".repeat(MAX_INPUT_CHARS + 1);
        assert_eq!(
            engine.classify(&long).unwrap_err(),
            ClassifyError::InputTooLong {
                length: MAX_INPUT_CHARS + 1,
                max: MAX_INPUT_CHARS
            }
        );

        // boundary values pass
        assert!(engine.classify("hello you!").is_ok());
        assert!(engine.classify(&"y ".repeat(MAX_INPUT_CHARS / 2)).is_ok());
    }

    #[test]
    fn length_is_measured_in_characters_not_bytes() {
        // nine characters, many more bytes
        let nine_chars = "é".repeat(9);
        let err = engine().classify(&nine_chars).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::InputTooShort { length: 9, .. }
        ));
    }

    #[test]
    fn adding_spam_keywords_never_lowers_the_raw_score() {
        let model = ModelParameters::default();
        let normalizer = EmailNormalizer::new();
        let extractor = FeatureExtractor::default();

        let mut text =
            String::from("Please review the attached schedule for next week and reply soon.");
        let mut previous = model
            .score(&extractor.extract(&normalizer.normalize(&text)))
            .unwrap()
            .raw_score;
        for _ in 0..5 {
            text.push_str(" winner");
            let current = model
                .score(&extractor.extract(&normalizer.normalize(&text)))
                .unwrap()
                .raw_score;
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn construction_rejects_misfit_model() {
        let mut model = ModelParameters::default();
        model.expected_length = 4;
        model.weights.truncate(4);
        model.feature_order.truncate(4);
        assert!(matches!(
            ClassificationEngine::new(model),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn reordered_feature_names_are_rejected() {
        let mut model = ModelParameters::default();
        model.feature_order.swap(0, 1);
        assert!(matches!(
            ClassificationEngine::new(model),
            Err(ModelError::Invalid { .. })
        ));
    }

    #[test]
    fn swap_rejects_reordered_feature_names() {
        let engine = engine();
        let mut model = ModelParameters::default();
        model.feature_order.swap(0, 1);
        assert!(engine.swap_model(model).is_err());
        assert_eq!(engine.current_model().version, "2026.08-baseline");
    }

    #[test]
    fn swapped_model_takes_effect_for_later_calls() {
        let engine = engine();
        let mut strict = ModelParameters::default();
        strict.version = "strict".to_string();
        strict.bias = 5.0; // everything scores high
        engine.swap_model(strict).unwrap();

        let verdict = engine
            .classify("Hi Maria, attaching the quarterly report as discussed, see you Thursday.")
            .unwrap();
        assert_eq!(verdict.label, Label::Spam);
        assert_eq!(verdict.model_version, "strict");
    }

    #[test]
    fn header_only_input_still_classifies() {
        let verdict = engine()
            .classify("From: a@b.example\nSubject: ping\n\n")
            .unwrap();
        assert_eq!(verdict.label, Label::Ham);
    }

    #[test]
    fn replacement_characters_are_handled() {
        let verdict = engine()
            .classify("some text with \u{FFFD}\u{FFFD} replacement characters in it")
            .unwrap();
        assert!((0.0..=1.0).contains(&verdict.confidence));
    }
}
