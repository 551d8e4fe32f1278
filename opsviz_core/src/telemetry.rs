//! The Telemetry Series Generator
//!
//! Produces the synthetic hourly series that drive every chart in the
//! console:
//!
//! ```text
//! value(i) = max(0, base + sin(i / 3) * variance + U(0, variance / 2) + trend * i)
//! ```
//!
//! The sinusoid gives the series a daily rhythm, the trend term lets a
//! series improve or degrade across the day, and the uniform term is the
//! only random part. The random source is always passed in, so a test can
//! pin it and compare the envelope exactly.

use crate::error::CoreError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Samples per day.
pub const HOURS_PER_DAY: usize = 24;

/// One labelled chart sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSample {
    /// Hour-of-day label, `"00:00"`..`"23:00"`
    pub label: String,
    /// Non-negative sample value
    pub value: f64,
}

/// Shape parameters for a generated series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesShape {
    /// Number of samples
    pub count: usize,
    /// Level the series oscillates around
    pub base: f64,
    /// Amplitude of the daily sinusoid; the noise term spans half of it
    pub variance: f64,
    /// Drift per sample
    pub trend: f64,
}

impl SeriesShape {
    pub const fn new(count: usize, base: f64, variance: f64, trend: f64) -> Self {
        Self {
            count,
            base,
            variance,
            trend,
        }
    }

    /// A 24-sample day with the given level, variance and trend.
    pub const fn daily(base: f64, variance: f64, trend: f64) -> Self {
        Self::new(HOURS_PER_DAY, base, variance, trend)
    }

    /// Checks a shape that came from outside the program.
    ///
    /// [`generate`] itself accepts any shape; this is for config input,
    /// where a negative variance is almost always a typo.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.base.is_finite() {
            return Err(CoreError::invalid("base", "must be finite"));
        }
        if !self.trend.is_finite() {
            return Err(CoreError::invalid("trend", "must be finite"));
        }
        if !self.variance.is_finite() || self.variance < 0.0 {
            return Err(CoreError::invalid(
                "variance",
                format!("must be finite and non-negative, got {}", self.variance),
            ));
        }
        Ok(())
    }
}

impl Default for SeriesShape {
    fn default() -> Self {
        Self::daily(50.0, 20.0, 0.0)
    }
}

/// Label for sample `i`.
///
/// Hours wrap every 24 samples. Samples past the first day carry a day
/// marker so labels stay unique: `"23:00"`, `"+1d 00:00"`, `"+1d 01:00"`.
pub fn label(i: usize) -> String {
    let day = i / HOURS_PER_DAY;
    let hour = i % HOURS_PER_DAY;
    if day == 0 {
        format!("{:02}:00", hour)
    } else {
        format!("+{}d {:02}:00", day, hour)
    }
}

/// Deterministic part of sample `i`: everything except the noise term.
pub fn envelope(shape: &SeriesShape, i: usize) -> f64 {
    let i = i as f64;
    shape.base + (i / 3.0).sin() * shape.variance + shape.trend * i
}

/// Generates `shape.count` samples, drawing one noise value per sample.
///
/// Never fails. `count == 0` yields an empty series; a negative variance
/// yields a degenerate series that is still clamped to zero.
pub fn generate<R: Rng + ?Sized>(shape: &SeriesShape, rng: &mut R) -> Vec<TimeSeriesSample> {
    (0..shape.count)
        .map(|i| {
            let noise = rng.gen::<f64>() * shape.variance / 2.0;
            TimeSeriesSample {
                label: label(i),
                value: (envelope(shape, i) + noise).max(0.0),
            }
        })
        .collect()
}

/// A named series on one of the console screens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPreset {
    pub screen: &'static str,
    pub metric: &'static str,
    pub shape: SeriesShape,
}

impl SeriesPreset {
    /// `screen.metric`
    pub fn key(&self) -> String {
        format!("{}.{}", self.screen, self.metric)
    }
}

const fn preset(screen: &'static str, metric: &'static str, base: f64, variance: f64, trend: f64) -> SeriesPreset {
    SeriesPreset {
        screen,
        metric,
        shape: SeriesShape::daily(base, variance, trend),
    }
}

/// Every series the console screens chart.
pub const PRESETS: &[SeriesPreset] = &[
    preset("dashboard", "power", 150.0, 40.0, 0.0),
    preset("dashboard", "motor", 75.0, 25.0, 0.5),
    preset("dashboard", "network", 20.0, 15.0, -0.2),
    preset("dashboard", "thermal", 60.0, 10.0, 0.0),
    preset("ai_insights", "energy", 100.0, 20.0, -0.8),
    preset("ai_insights", "machine_efficiency", 78.0, 12.0, 0.5),
    preset("ai_insights", "predictive_maintenance", 15.0, 8.0, -0.3),
    preset("ai_insights", "process_optimization", 85.0, 15.0, 0.8),
    preset("alerts", "frequency", 12.0, 8.0, 0.0),
    preset("alerts", "resolution_time", 45.0, 15.0, -0.5),
    preset("alerts", "systems_affected", 3.0, 2.0, 0.0),
    preset("testing", "stress", 65.0, 25.0, 0.0),
    preset("testing", "temperature", 80.0, 15.0, 0.1),
    preset("testing", "fault_rate", 2.0, 3.0, -0.05),
    preset("aircraft", "efficiency", 85.0, 10.0, 0.0),
    preset("aircraft", "temperature", 65.0, 15.0, 0.0),
    preset("aircraft", "battery", 80.0, 20.0, -0.5),
    preset("aircraft", "signal", 95.0, 5.0, -0.1),
    preset("engine", "power", 250.0, 50.0, 0.0),
    preset("engine", "calibration", 99.0, 1.0, 0.0),
    preset("engine", "temperature", 65.0, 10.0, 0.0),
    preset("inventory", "consumption", 45.0, 15.0, 0.0),
    preset("inventory", "restocking", 60.0, 30.0, 0.0),
    preset("inventory", "forecast", 55.0, 10.0, 1.0),
    preset("robotic_arm", "torque", 65.0, 15.0, 0.0),
    preset("robotic_arm", "rpm", 120.0, 40.0, 0.0),
    preset("robotic_arm", "heat", 45.0, 10.0, 0.2),
    preset("system_config", "latency", 15.0, 8.0, 0.0),
    preset("system_config", "load", 65.0, 20.0, 0.3),
    preset("system_config", "temperature", 55.0, 10.0, 0.0),
];

/// Looks up a preset by `screen.metric` key.
pub fn find_preset(key: &str) -> Result<&'static SeriesPreset, CoreError> {
    PRESETS
        .iter()
        .find(|p| p.key() == key)
        .ok_or_else(|| CoreError::UnknownPreset(key.to_string()))
}

/// Presets charted on one screen.
pub fn screen_presets(screen: &str) -> impl Iterator<Item = &'static SeriesPreset> + '_ {
    PRESETS.iter().filter(move |p| p.screen == screen)
}

/// A series that can be regenerated on demand.
///
/// Charts read [`TelemetryFeed::latest`]; a timer may call
/// [`TelemetryFeed::regenerate`] to refresh the data in place.
#[derive(Debug, Clone)]
pub struct TelemetryFeed<R: Rng = ChaCha8Rng> {
    shape: SeriesShape,
    rng: R,
    generation: u64,
    latest: Vec<TimeSeriesSample>,
}

impl TelemetryFeed<ChaCha8Rng> {
    /// Creates a feed with its own seeded noise stream.
    pub fn seeded(shape: SeriesShape, seed: u64) -> Self {
        Self::new(shape, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> TelemetryFeed<R> {
    /// Creates a feed and generates its first series.
    pub fn new(shape: SeriesShape, mut rng: R) -> Self {
        let latest = generate(&shape, &mut rng);
        Self {
            shape,
            rng,
            generation: 1,
            latest,
        }
    }

    /// Replaces the current series with a freshly drawn one.
    pub fn regenerate(&mut self) -> &[TimeSeriesSample] {
        self.latest = generate(&self.shape, &mut self.rng);
        self.generation += 1;
        &self.latest
    }

    pub fn latest(&self) -> &[TimeSeriesSample] {
        &self.latest
    }

    /// Number of series generated so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn shape(&self) -> &SeriesShape {
        &self.shape
    }

    /// Plain values of the current series.
    pub fn values(&self) -> Vec<f64> {
        self.latest.iter().map(|s| s.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;

    fn mean(values: &[TimeSeriesSample]) -> f64 {
        values.iter().map(|s| s.value).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_length_and_labels() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let series = generate(&SeriesShape::default(), &mut rng);

        assert_eq!(series.len(), 24);
        assert_eq!(series[0].label, "00:00");
        assert_eq!(series[9].label, "09:00");
        assert_eq!(series[23].label, "23:00");
    }

    #[test]
    fn test_labels_past_one_day_stay_unique() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let series = generate(&SeriesShape::new(50, 10.0, 2.0, 0.0), &mut rng);

        assert_eq!(series[24].label, "+1d 00:00");
        assert_eq!(series[49].label, "+2d 01:00");

        let mut labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 50);
    }

    #[test]
    fn test_zero_count_is_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(generate(&SeriesShape::new(0, 50.0, 20.0, 0.0), &mut rng).is_empty());
    }

    #[test]
    fn test_stubbed_noise_reproduces_envelope_exactly() {
        let shape = SeriesShape::daily(100.0, 20.0, -0.8);

        // StepRng(0, 0) draws 0.0 every time
        let a = generate(&shape, &mut StepRng::new(0, 0));
        let b = generate(&shape, &mut StepRng::new(0, 0));
        assert_eq!(a, b);

        for (i, sample) in a.iter().enumerate() {
            let expected = envelope(&shape, i).max(0.0);
            assert_eq!(sample.value.to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn test_noise_stays_within_half_variance() {
        let shape = SeriesShape::daily(100.0, 20.0, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for (i, sample) in generate(&shape, &mut rng).iter().enumerate() {
            let noise = sample.value - envelope(&shape, i);
            assert!((0.0..10.0).contains(&noise), "noise {} at {}", noise, i);
        }
    }

    #[test]
    fn test_values_never_negative_over_many_trials() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        for trial in 0..10_000 {
            let shape = SeriesShape::daily(
                rng.gen_range(-200.0..200.0),
                rng.gen_range(0.0..80.0),
                rng.gen_range(-5.0..5.0),
            );
            for sample in generate(&shape, &mut rng) {
                assert!(sample.value >= 0.0, "trial {} shape {:?}", trial, shape);
            }
        }
    }

    #[test]
    fn test_negative_base_clamps_to_zero() {
        let shape = SeriesShape::daily(-1_000.0, 20.0, 0.0);
        let series = generate(&shape, &mut StepRng::new(0, 0));
        assert!(series.iter().all(|s| s.value == 0.0));
    }

    #[test]
    fn test_energy_series_declines() {
        let shape = find_preset("ai_insights.energy").unwrap().shape;
        assert_eq!(shape, SeriesShape::daily(100.0, 20.0, -0.8));

        for seed in 0..100 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let series = generate(&shape, &mut rng);
            assert_eq!(series.len(), 24);
            assert!(mean(&series[18..]) < mean(&series[..6]), "seed {}", seed);
        }
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(SeriesShape::default().validate().is_ok());
        assert!(SeriesShape::daily(1.0, -2.0, 0.0).validate().is_err());
        assert!(SeriesShape::daily(f64::NAN, 2.0, 0.0).validate().is_err());
        assert!(SeriesShape::daily(1.0, 2.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_presets_are_valid_and_unique() {
        let mut keys: Vec<String> = PRESETS.iter().map(|p| p.key()).collect();
        for p in PRESETS {
            assert!(p.shape.validate().is_ok(), "{}", p.key());
        }
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), PRESETS.len());
        assert_eq!(screen_presets("dashboard").count(), 4);
        assert!(find_preset("dashboard.unknown").is_err());
    }

    #[test]
    fn test_feed_regenerates() {
        let mut feed = TelemetryFeed::seeded(SeriesShape::default(), 5);
        let first = feed.latest().to_vec();
        feed.regenerate();

        assert_eq!(feed.generation(), 2);
        assert_eq!(feed.latest().len(), 24);
        assert_ne!(first, feed.latest());
    }

    proptest! {
        #[test]
        fn prop_values_non_negative(
            base in -500.0f64..500.0,
            variance in 0.0f64..100.0,
            trend in -10.0f64..10.0,
            count in 0usize..96,
            seed in any::<u64>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let series = generate(&SeriesShape::new(count, base, variance, trend), &mut rng);
            prop_assert_eq!(series.len(), count);
            for s in &series {
                prop_assert!(s.value >= 0.0);
            }
        }
    }
}
