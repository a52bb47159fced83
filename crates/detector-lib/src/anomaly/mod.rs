//! Anomaly detection for aggregate metric series
//!
//! This module provides:
//! - Rolling IQR band detection on the latest observation
//! - Input validation errors for malformed series
//! - Alert reports and message rendering for notification sinks

mod alerter;
mod error;
mod iqr_detector;

pub use alerter::AlertReport;
pub use error::{DetectError, Result};
pub use iqr_detector::{
    quantile, AnnotatedPoint, Detection, IqrDetector, Verdict, DEFAULT_SENSITIVITY,
    DEFAULT_SMOOTHING_WINDOW, LOOKBACK_WINDOW,
};
