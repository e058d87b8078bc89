use thiserror::Error;

/// Errors a caller can hit when submitting text for classification.
///
/// The length bounds mirror the ones the surrounding form layer enforces,
/// so the engine stays safe to call directly.
#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("input too short: {length} characters (minimum {min})")]
    InputTooShort { length: usize, min: usize },

    #[error("input too long: {length} characters (maximum {max})")]
    InputTooLong { length: usize, max: usize },

    /// Model/extractor inconsistency. Signals a deployment bug, not a
    /// user error; a validated model never produces this per request.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised while loading or applying model parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("feature vector length {actual} does not match model expectation {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid model parameters: {reason}")]
    Invalid { reason: String },
}
