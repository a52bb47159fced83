//! Rolling interquartile-range band detection
//!
//! Builds an adaptive band from the quartiles of the few observations that
//! precede each point, smooths it with a centered moving average, and flags
//! the latest observation when it falls outside the band.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DetectError, Result};
use crate::models::SeriesPoint;
use chrono::{DateTime, Utc};

/// Number of prior observations the quartiles are computed over
pub const LOOKBACK_WINDOW: usize = 5;

/// Default band multiplier applied to the IQR
pub const DEFAULT_SENSITIVITY: f64 = 3.0;

/// Default width of the centered moving average over the raw bounds
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Detects outliers against a smoothed rolling IQR band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IqrDetector {
    /// Multiplier widening the band away from the quartiles
    pub sensitivity: f64,
    /// Width of the centered moving average applied to the raw bounds
    pub smoothing_window: usize,
}

impl IqrDetector {
    /// Create a detector with the given band multiplier and smoothing width
    pub fn new(sensitivity: f64, smoothing_window: usize) -> Self {
        Self {
            sensitivity,
            smoothing_window,
        }
    }

    /// Set the band multiplier
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Set the smoothing width
    pub fn with_smoothing_window(mut self, smoothing_window: usize) -> Self {
        self.smoothing_window = smoothing_window;
        self
    }

    /// Evaluate the last point of `series` against the band built from its history
    ///
    /// # Arguments
    /// * `series` - Observations of one metric, strictly ordered by timestamp
    ///
    /// # Returns
    /// * `Ok(Detection)` with the verdict for the last point and the annotated series
    /// * `Err(DetectError)` if the parameters or the series are malformed
    pub fn detect(&self, series: &[SeriesPoint]) -> Result<Detection> {
        self.validate()?;
        validate_series(series)?;

        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let quartiles = lookback_quartiles(&values);

        let a = self.sensitivity;
        let raw_up: Vec<Option<f64>> = quartiles
            .iter()
            .map(|q| q.map(|(q25, q75)| q75 + a * (q75 - q25)))
            .collect();
        let raw_low: Vec<Option<f64>> = quartiles
            .iter()
            .map(|q| q.map(|(q25, q75)| q25 - a * (q75 - q25)))
            .collect();

        let up = centered_mean(&raw_up, self.smoothing_window);
        let low = centered_mean(&raw_low, self.smoothing_window);
        check_bounds(&up, &low)?;

        let annotated: Vec<AnnotatedPoint> = series
            .iter()
            .enumerate()
            .map(|(i, point)| AnnotatedPoint {
                timestamp: point.timestamp,
                value: point.value,
                q25: quartiles[i].map(|(q25, _)| q25),
                q75: quartiles[i].map(|(_, q75)| q75),
                iqr: quartiles[i].map(|(q25, q75)| q75 - q25),
                up: up[i],
                low: low[i],
            })
            .collect();

        let verdict = match annotated.last() {
            Some(last) => last.verdict(),
            None => Verdict::NotEvaluable,
        };

        Ok(Detection {
            verdict,
            series: annotated,
        })
    }

    /// Check the band multiplier and smoothing width
    pub fn validate(&self) -> Result<()> {
        if !self.sensitivity.is_finite() || self.sensitivity < 0.0 {
            return Err(DetectError::InvalidSensitivity(self.sensitivity));
        }
        if self.smoothing_window == 0 {
            return Err(DetectError::InvalidSmoothingWindow);
        }
        Ok(())
    }
}

impl Default for IqrDetector {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
        }
    }
}

/// Outcome of evaluating the last point of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The point lies outside the smoothed band
    Alert,
    /// The point lies inside the band (bounds inclusive)
    Normal,
    /// Not enough history to define the band at the last point
    NotEvaluable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Alert => write!(f, "alert"),
            Verdict::Normal => write!(f, "normal"),
            Verdict::NotEvaluable => write!(f, "not_evaluable"),
        }
    }
}

/// A series point with the derived band columns
///
/// `up` and `low` are the smoothed bounds. A `None` column is undefined for
/// lack of history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPoint {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
    pub iqr: Option<f64>,
    pub up: Option<f64>,
    pub low: Option<f64>,
}

impl AnnotatedPoint {
    /// Compare this point against its own smoothed bounds
    pub fn verdict(&self) -> Verdict {
        match (self.low, self.up) {
            (Some(low), Some(up)) if self.value < low || self.value > up => Verdict::Alert,
            (Some(_), Some(_)) => Verdict::Normal,
            _ => Verdict::NotEvaluable,
        }
    }
}

/// Verdict for the last point plus the annotated input series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub verdict: Verdict,
    pub series: Vec<AnnotatedPoint>,
}

impl Detection {
    pub fn is_alert(&self) -> bool {
        self.verdict == Verdict::Alert
    }

    /// The evaluated (most recent) point
    pub fn latest(&self) -> Option<&AnnotatedPoint> {
        self.series.last()
    }

    /// The point immediately before the evaluated one
    pub fn previous(&self) -> Option<&AnnotatedPoint> {
        self.series.iter().rev().nth(1)
    }
}

fn validate_series(series: &[SeriesPoint]) -> Result<()> {
    for (index, point) in series.iter().enumerate() {
        if !point.value.is_finite() {
            return Err(DetectError::NonFiniteValue {
                index,
                value: point.value,
            });
        }
        if index > 0 && point.timestamp <= series[index - 1].timestamp {
            return Err(DetectError::UnorderedTimestamps { index });
        }
    }
    Ok(())
}

/// Reject bands that overflowed to infinity or NaN
fn check_bounds(up: &[Option<f64>], low: &[Option<f64>]) -> Result<()> {
    let overflowed = |b: &Option<f64>| b.is_some_and(|v| !v.is_finite());
    match up
        .iter()
        .zip(low)
        .position(|(u, l)| overflowed(u) || overflowed(l))
    {
        Some(index) => Err(DetectError::NonFiniteBound { index }),
        None => Ok(()),
    }
}

/// Quartiles of the `LOOKBACK_WINDOW` values preceding each position
///
/// Positions with fewer than `LOOKBACK_WINDOW` prior values get `None`.
fn lookback_quartiles(values: &[f64]) -> Vec<Option<(f64, f64)>> {
    let mut window = [0.0f64; LOOKBACK_WINDOW];

    (0..values.len())
        .map(|i| {
            if i < LOOKBACK_WINDOW {
                return None;
            }
            window.copy_from_slice(&values[i - LOOKBACK_WINDOW..i]);
            window.sort_by(|a, b| a.total_cmp(b));
            Some((quantile(&window, 0.25), quantile(&window, 0.75)))
        })
        .collect()
}

/// Linear-interpolation quantile of an ascending-sorted, non-empty slice
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
    }
}

/// Centered moving average that tolerates gaps and series edges
///
/// The window for position `i` ends at `i + (width - 1) / 2`. Only defined
/// values inside the clipped window contribute; a window with none stays
/// `None`.
fn centered_mean(raw: &[Option<f64>], width: usize) -> Vec<Option<f64>> {
    let len = raw.len();
    let forward = (width - 1) / 2;

    (0..len)
        .map(|i| {
            let end = i + forward;
            let start = (end + 1).saturating_sub(width);
            let end = end.min(len - 1);

            let (sum, count) = raw[start..=end]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}
