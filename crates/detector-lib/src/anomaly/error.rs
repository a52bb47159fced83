/// Input validation failures raised by the detector.
///
/// Insufficient history is not an error; it yields
/// [`Verdict::NotEvaluable`](super::Verdict::NotEvaluable) instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectError {
    /// A value in the series is NaN or infinite.
    #[error("Detect: non-finite value {value} at index {index}")]
    NonFiniteValue { index: usize, value: f64 },

    /// A timestamp is not strictly greater than its predecessor.
    #[error("Detect: timestamps not strictly increasing at index {index}")]
    UnorderedTimestamps { index: usize },

    /// The band multiplier is negative or non-finite.
    #[error("Detect: sensitivity must be a finite non-negative number, got {0}")]
    InvalidSensitivity(f64),

    /// The smoothing window must cover at least one point.
    #[error("Detect: smoothing window must be at least 1")]
    InvalidSmoothingWindow,

    /// Finite inputs spread so far apart that the band overflowed.
    #[error("Detect: band bound is not finite at index {index}")]
    NonFiniteBound { index: usize },
}

/// Convenience `Result` alias for detector operations.
pub type Result<T> = std::result::Result<T, DetectError>;
