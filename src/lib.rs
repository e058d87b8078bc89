pub mod classifier;
pub mod engine;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod policy;

pub use classifier::{FeatureContribution, ModelParameters, ModelStore, ScoreResult};
pub use engine::{ClassificationEngine, MAX_INPUT_CHARS, MIN_INPUT_CHARS};
pub use error::{ClassifyError, ModelError};
pub use features::{FeatureConfig, FeatureExtractor, FeatureVector, FEATURE_ORDER};
pub use normalizer::{EmailNormalizer, NormalizedEmail};
pub use policy::{DecisionPolicy, Label, Verdict};
