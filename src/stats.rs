//! Pure merge and diff functions over timing records.
//!
//! All time fields are in seconds and every rate field is the reciprocal of
//! its time field. Merging is "best pass wins": time fields keep the
//! minimum, rate and count fields keep the maximum, so the result does not
//! depend on the order in which passes are merged.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PassMeasurement {
    pub total: f64,
    pub count: u64,
    pub avg: f64,
    pub avg_hz: f64,
    pub min: f64,
    pub min_hz: f64,
    pub max: f64,
    pub max_hz: f64,
    pub bench_time: f64,
}

impl PassMeasurement {
    pub fn summary(&self) -> String {
        format!(
            "avg={}s min={}s max={}s count={}",
            self.avg, self.min, self.max, self.count
        )
    }
}

/// How samples that measured as zero seconds are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSamplePolicy {
    /// Excluded from `min`/`max`, still counted in `total`, `count` and `avg`.
    #[default]
    MinMaxOnly,
    /// Also excluded from the `avg` denominator.
    Exclude,
}

/// Rate for a duration; a zero duration has no meaningful rate and reports 0.
pub fn hz(seconds: f64) -> f64 {
    if seconds > 0.0 { 1.0 / seconds } else { 0.0 }
}

/// Number of invocations that fill `budget` when each takes `per_call`.
///
/// A call too fast for the clock to register (`per_call <= 0`) yields 1.
pub fn cycles_for(budget: f64, per_call: f64) -> u64 {
    if !(per_call > 0.0) {
        return 1;
    }
    let cycles = (budget / per_call).floor();
    if cycles.is_finite() && cycles >= 1.0 {
        cycles as u64
    } else {
        1
    }
}

/// `max(1, floor(cycles * ratio))`.
pub fn scaled_cycles(cycles: u64, ratio: f64) -> u64 {
    let scaled = (cycles as f64 * ratio).floor();
    if scaled.is_finite() && scaled >= 1.0 {
        scaled as u64
    } else {
        1
    }
}

/// Running accumulator for one benchmarking stage.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    total: f64,
    count: u64,
    positive: u64,
    min: f64,
    max: f64,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleWindow {
    pub fn new() -> Self {
        Self {
            total: 0.0,
            count: 0,
            positive: 0,
            min: f64::INFINITY,
            max: 0.0,
        }
    }

    pub fn record(&mut self, seconds: f64) {
        self.total += seconds;
        self.count += 1;
        if seconds > 0.0 {
            self.positive += 1;
            self.min = self.min.min(seconds);
            self.max = self.max.max(seconds);
        }
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(&self, bench_time: f64, policy: ZeroSamplePolicy) -> PassMeasurement {
        let denominator = match policy {
            ZeroSamplePolicy::MinMaxOnly => self.count,
            ZeroSamplePolicy::Exclude => self.positive,
        };
        let avg = if denominator > 0 {
            self.total / denominator as f64
        } else {
            0.0
        };
        let (min, max) = if self.positive > 0 {
            (self.min, self.max)
        } else {
            (avg, avg)
        };
        PassMeasurement {
            total: self.total,
            count: self.count,
            avg,
            avg_hz: hz(avg),
            min,
            min_hz: hz(min),
            max,
            max_hz: hz(max),
            bench_time,
        }
    }
}

/// Elementwise minimum over the time fields; rate fields come from `a`.
pub fn merge_time(a: &PassMeasurement, b: &PassMeasurement) -> PassMeasurement {
    PassMeasurement {
        total: a.total.min(b.total),
        avg: a.avg.min(b.avg),
        min: a.min.min(b.min),
        max: a.max.min(b.max),
        bench_time: a.bench_time.min(b.bench_time),
        ..*a
    }
}

/// Elementwise maximum over the count and rate fields; time fields come from `a`.
pub fn merge_rate(a: &PassMeasurement, b: &PassMeasurement) -> PassMeasurement {
    PassMeasurement {
        count: a.count.max(b.count),
        avg_hz: a.avg_hz.max(b.avg_hz),
        min_hz: a.min_hz.max(b.min_hz),
        max_hz: a.max_hz.max(b.max_hz),
        ..*a
    }
}

pub fn merge(a: &PassMeasurement, b: &PassMeasurement) -> PassMeasurement {
    merge_rate(&merge_time(a, b), b)
}

/// Merge into an optional running value, as done across passes.
pub fn merge_into(previous: Option<PassMeasurement>, next: PassMeasurement) -> PassMeasurement {
    match previous {
        Some(prev) => merge(&prev, &next),
        None => next,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Avg,
    Min,
    Max,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Avg, Field::Min, Field::Max];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Avg => "avg",
            Field::Min => "min",
            Field::Max => "max",
        }
    }

    pub fn seconds(&self, m: &PassMeasurement) -> f64 {
        match self {
            Field::Avg => m.avg,
            Field::Min => m.min,
            Field::Max => m.max,
        }
    }

    pub fn hz(&self, m: &PassMeasurement) -> f64 {
        match self {
            Field::Avg => m.avg_hz,
            Field::Min => m.min_hz,
            Field::Max => m.max_hz,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub diff_abs: f64,
    pub diff_hz: f64,
    pub diff_pct: f64,
}

pub fn diff(current: &PassMeasurement, reference: &PassMeasurement, field: Field) -> Diff {
    let reference_seconds = field.seconds(reference);
    let diff_abs = field.seconds(current) - reference_seconds;
    let diff_pct = if reference_seconds != 0.0 {
        diff_abs / reference_seconds * 100.0
    } else {
        0.0
    };
    Diff {
        diff_abs,
        diff_hz: field.hz(current) - field.hz(reference),
        diff_pct,
    }
}

/// Diffs of every compared field against one reference measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDiffs {
    pub avg: Diff,
    pub min: Diff,
    pub max: Diff,
}

impl FieldDiffs {
    pub fn get(&self, field: Field) -> &Diff {
        match field {
            Field::Avg => &self.avg,
            Field::Min => &self.min,
            Field::Max => &self.max,
        }
    }
}

pub fn compare(current: &PassMeasurement, reference: &PassMeasurement) -> FieldDiffs {
    FieldDiffs {
        avg: diff(current, reference, Field::Avg),
        min: diff(current, reference, Field::Min),
        max: diff(current, reference, Field::Max),
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn window_of(samples: &[f64]) -> SampleWindow {
        let mut window = SampleWindow::new();
        for &s in samples {
            window.record(s);
        }
        window
    }

    fn measurement(avg: f64, min: f64, max: f64, count: u64) -> PassMeasurement {
        PassMeasurement {
            total: avg * count as f64,
            count,
            avg,
            avg_hz: hz(avg),
            min,
            min_hz: hz(min),
            max,
            max_hz: hz(max),
            bench_time: avg * count as f64 * 1.1,
        }
    }

    #[test]
    fn test_window_orders_min_avg_max() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..50 {
            let n = rng.gen_range(1..200);
            let samples: Vec<f64> = (0..n).map(|_| rng.gen_range(1e-7..1e-2)).collect();
            let m = window_of(&samples).finish(1.0, ZeroSamplePolicy::MinMaxOnly);
            assert!(m.min <= m.avg && m.avg <= m.max, "{}", m.summary());
            assert!(m.min_hz >= m.avg_hz && m.avg_hz >= m.max_hz);
            assert!((m.avg_hz * m.avg - 1.0).abs() < 1e-9);
            assert_eq!(m.count, n as u64);
        }
    }

    #[test]
    fn test_zero_samples_skip_min_max_but_count() {
        let m = window_of(&[0.0, 2.0, 4.0]).finish(6.0, ZeroSamplePolicy::MinMaxOnly);
        assert_eq!(m.count, 3);
        assert_eq!(m.total, 6.0);
        assert_eq!(m.avg, 2.0);
        assert_eq!(m.min, 2.0);
        assert_eq!(m.max, 4.0);
    }

    #[test]
    fn test_zero_samples_excluded_from_avg() {
        let m = window_of(&[0.0, 2.0, 4.0]).finish(6.0, ZeroSamplePolicy::Exclude);
        assert_eq!(m.count, 3);
        assert_eq!(m.avg, 3.0);
        assert!(m.min <= m.avg && m.avg <= m.max);
    }

    #[test]
    fn test_all_zero_samples_stay_finite() {
        let m = window_of(&[0.0, 0.0]).finish(0.0, ZeroSamplePolicy::MinMaxOnly);
        assert_eq!(m.min, 0.0);
        assert_eq!(m.max, 0.0);
        assert_eq!(m.avg_hz, 0.0);
        assert!(serde_json::to_string(&m).is_ok());
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = measurement(2.0, 1.0, 3.0, 10);
        let b = measurement(1.5, 1.2, 4.0, 12);
        assert_eq!(merge(&a, &b), merge(&b, &a));
        let merged = merge(&a, &b);
        assert_eq!(merged.avg, 1.5);
        assert_eq!(merged.min, 1.0);
        assert_eq!(merged.max, 3.0);
        assert_eq!(merged.count, 12);
        assert_eq!(merged.min_hz, 1.0);
    }

    #[test]
    fn test_merge_time_keeps_rates_of_first() {
        let a = measurement(2.0, 1.0, 3.0, 10);
        let b = measurement(1.0, 0.5, 2.0, 20);
        let merged = merge_time(&a, &b);
        assert_eq!(merged.avg, 1.0);
        assert_eq!(merged.avg_hz, a.avg_hz);
        assert_eq!(merged.count, 10);
        let merged = merge_rate(&a, &b);
        assert_eq!(merged.avg, 2.0);
        assert_eq!(merged.avg_hz, 1.0);
        assert_eq!(merged.count, 20);
    }

    #[test]
    fn test_diff_sign_means_faster() {
        let reference = measurement(2.0, 1.0, 4.0, 10);
        let faster = measurement(1.0, 0.5, 2.0, 10);
        let d = diff(&faster, &reference, Field::Avg);
        assert_eq!(d.diff_abs, -1.0);
        assert_eq!(d.diff_pct, -50.0);
        assert_eq!(d.diff_hz, 0.5);
        let all = compare(&faster, &reference);
        assert_eq!(all.get(Field::Max).diff_pct, -50.0);
    }

    #[test]
    fn test_diff_zero_reference_has_zero_pct() {
        let reference = PassMeasurement::default();
        let current = measurement(1.0, 1.0, 1.0, 1);
        assert_eq!(diff(&current, &reference, Field::Min).diff_pct, 0.0);
    }

    #[test]
    fn test_cycles_for_clamps() {
        assert_eq!(cycles_for(2.0, 0.1), 20);
        assert_eq!(cycles_for(2.0, 5.0), 1);
        assert_eq!(cycles_for(1.0, 0.0), 1);
        assert_eq!(cycles_for(5.0, -0.0), 1);
        assert_eq!(cycles_for(5.0, f64::NAN), 1);
        assert_eq!(cycles_for(5.0, f64::MIN_POSITIVE), 1);
        assert_eq!(scaled_cycles(20, 0.1), 2);
        assert_eq!(scaled_cycles(20, 0.0), 1);
        assert_eq!(scaled_cycles(3, 0.1), 1);
    }
}
