//! Series Summary Metrics
//! ======================
//!
//! Status cards next to each chart show the latest reading, the range of
//! the day and a trend arrow. This module derives those numbers from a
//! generated series:
//! - **Range**: min / max / mean over every sample
//! - **Trend**: mean of the last window against the mean of the first

use crate::telemetry::TimeSeriesSample;
use serde::{Deserialize, Serialize};

/// Direction of a series across the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Arrow glyph for status cards.
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

/// Configuration for trend classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendConfig {
    /// Samples averaged at each end of the series
    pub window: usize,
    /// Relative change below which the series counts as stable
    pub tolerance: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: 6,
            tolerance: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Value of the last sample
    pub latest: f64,
    /// Change of the closing window relative to the opening window (percent)
    pub change_percent: f64,
    pub trend: Trend,
}

// =============================================================================
// SUMMARY CALCULATION
// =============================================================================

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Summarises a series with the default [`TrendConfig`].
///
/// Returns `None` for an empty series; charts show "no data" instead.
pub fn summarize(samples: &[TimeSeriesSample]) -> Option<SeriesSummary> {
    summarize_with(samples, &TrendConfig::default())
}

pub fn summarize_with(samples: &[TimeSeriesSample], config: &TrendConfig) -> Option<SeriesSummary> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let latest = *values.last()?;

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // Windows overlap on short series; a single sample compares with itself
    let window = config.window.clamp(1, values.len());
    let opening = mean(&values[..window]);
    let closing = mean(&values[values.len() - window..]);

    Some(SeriesSummary {
        min,
        max,
        mean: mean(&values),
        latest,
        change_percent: relative_change(opening, closing) * 100.0,
        trend: classify_trend(opening, closing, config.tolerance),
    })
}

/// `(to - from) / |from|`, with a zero baseline treated as no change
/// unless the series left zero.
pub fn relative_change(from: f64, to: f64) -> f64 {
    if from.abs() < f64::EPSILON {
        if to.abs() < f64::EPSILON {
            0.0
        } else {
            to.signum()
        }
    } else {
        (to - from) / from.abs()
    }
}

/// Classifies the move from `opening` to `closing`.
pub fn classify_trend(opening: f64, closing: f64, tolerance: f64) -> Trend {
    let change = relative_change(opening, closing);
    if change > tolerance {
        Trend::Up
    } else if change < -tolerance {
        Trend::Down
    } else {
        Trend::Stable
    }
}
