//! Pure aggregation over observation iterators.
//!
//! Nothing in this module touches the store or the cache; every function
//! consumes an iterator of observations and returns plain data, which keeps
//! the math unit-testable in isolation. All temperatures stay in °C and all
//! arithmetic is f64.

use crate::types::{GridCell, Observation, Variable};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Running sum/count pair.
#[derive(Debug, Clone, Copy, Default)]
struct Accum {
    sum: f64,
    n: u64,
}

impl Accum {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.n += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.n as f64
    }
}

/// Mean of `value` per calendar year, sorted ascending by year.
///
/// Years with no observations in the input are simply absent from the
/// output. Also returns the number of observations consumed.
pub fn annual_mean<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> (Vec<(i32, f64)>, u64) {
    let mut groups: std::collections::BTreeMap<i32, Accum> = std::collections::BTreeMap::new();
    let mut count = 0u64;
    for obs in observations {
        groups.entry(obs.year()).or_default().push(obs.value);
        count += 1;
    }
    let series = groups
        .into_iter()
        .map(|(year, acc)| (year, acc.mean()))
        .collect();
    (series, count)
}

/// Mean per calendar month across all years of the input, indexed 0..=11
/// for months 1..=12.
///
/// A month with no observations yields `None`. The upstream implementation
/// emitted `0` there, which is indistinguishable from a real 0 °C mean;
/// this crate reports missing months explicitly instead.
pub fn monthly_climatology<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> ([Option<f64>; 12], u64) {
    let mut groups = [Accum::default(); 12];
    let mut count = 0u64;
    for obs in observations {
        groups[obs.month() as usize - 1].push(obs.value);
        count += 1;
    }
    let mut means = [None; 12];
    for (slot, acc) in means.iter_mut().zip(groups.iter()) {
        if acc.n > 0 {
            *slot = Some(acc.mean());
        }
    }
    (means, count)
}

/// Mean per (latitude, longitude) pair, keyed by the coordinates' bit
/// patterns for exact lookup against the grid axes.
pub fn cell_means<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> (FxHashMap<(u64, u64), f64>, u64) {
    let mut groups: FxHashMap<(u64, u64), Accum> = FxHashMap::default();
    let mut count = 0u64;
    for obs in observations {
        groups
            .entry((obs.latitude.to_bits(), obs.longitude.to_bits()))
            .or_default()
            .push(obs.value);
        count += 1;
    }
    let means = groups
        .into_iter()
        .map(|(key, acc)| (key, acc.mean()))
        .collect();
    (means, count)
}

/// Descriptive statistics over a filtered observation set.
///
/// `std_dev` is the sample standard deviation (ddof = 1). For a single
/// observation it is reported as `Some(0.0)` by convention; for an empty
/// input every field is `None` and `count` is 0, which is a valid result
/// rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
    pub count: u64,
}

/// Compute [`StatsSummary`] over an observation iterator.
pub fn describe<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> StatsSummary {
    let mut count = 0u64;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut values = Vec::new();

    for obs in observations {
        count += 1;
        sum += obs.value;
        min = min.min(obs.value);
        max = max.max(obs.value);
        values.push(obs.value);
    }

    if count == 0 {
        return StatsSummary {
            mean: None,
            min: None,
            max: None,
            std_dev: None,
            count: 0,
        };
    }

    let mean = sum / count as f64;
    let std_dev = if count == 1 {
        0.0
    } else {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (count as f64 - 1.0)).sqrt()
    };

    StatsSummary {
        mean: Some(mean),
        min: Some(min),
        max: Some(max),
        std_dev: Some(std_dev),
        count,
    }
}

// ---------------------------------------------------------------------------
// Result types returned by the engine façade. One fixed struct per
// operation: callers and tests get a stable shape instead of a bag of
// dynamic fields.
// ---------------------------------------------------------------------------

/// Annual mean time series for a variable over a year range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub variable: Variable,
    pub start_year: i32,
    pub end_year: i32,
    /// Sorted ascending, no duplicates; years without data are absent.
    pub years: Vec<i32>,
    /// One mean per entry of `years`.
    pub values: Vec<f64>,
    pub unit: String,
    pub data_points_used: u64,
}

/// Long-run monthly means across all years of a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Climatology {
    pub variable: Variable,
    pub start_year: i32,
    pub end_year: i32,
    /// Always 1..=12 in order.
    pub months: Vec<u32>,
    /// One entry per month; `None` marks a month with no observations.
    pub values: Vec<Option<f64>>,
    pub unit: String,
    pub data_points_used: u64,
}

/// Per-cell mean for one cell of a spatial field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialCell {
    pub cell: GridCell,
    pub latitude: f64,
    pub longitude: f64,
    /// `None` when the cell has no observations in range. Missing is
    /// reported explicitly, never as zero.
    pub mean: Option<f64>,
}

/// Per-cell means for one month over a year range, covering the full grid
/// cross product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialField {
    pub variable: Variable,
    pub month: u32,
    pub start_year: i32,
    pub end_year: i32,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Row-major over (latitude, longitude): `lat_idx * lon_count + lon_idx`.
    pub cells: Vec<SpatialCell>,
    pub cells_with_data: usize,
    pub unit: String,
    pub data_points_used: u64,
}

/// Domain-wide descriptive statistics over a year range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub variable: Variable,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(flatten)]
    pub stats: StatsSummary,
    pub unit: String,
}

/// Annual mean series restricted to one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalityTimeSeries {
    pub variable: Variable,
    pub cell: GridCell,
    pub latitude: f64,
    pub longitude: f64,
    pub start_year: i32,
    pub end_year: i32,
    pub years: Vec<i32>,
    pub values: Vec<f64>,
    pub unit: String,
    pub data_points_used: u64,
}

/// Descriptive statistics restricted to one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalityStats {
    pub variable: Variable,
    pub cell: GridCell,
    pub latitude: f64,
    pub longitude: f64,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(flatten)]
    pub stats: StatsSummary,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(y: i32, m: u32, d: u32, v: f64) -> Observation {
        Observation::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), 14.0, -17.0, v)
    }

    #[test]
    fn test_annual_mean_groups_and_sorts() {
        let data = vec![
            obs(2001, 1, 1, 20.0),
            obs(2000, 1, 1, 10.0),
            obs(2000, 7, 1, 30.0),
        ];
        let (series, count) = annual_mean(&data);
        assert_eq!(series, vec![(2000, 20.0), (2001, 20.0)]);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_annual_mean_empty() {
        let (series, count) = annual_mean(&[]);
        assert!(series.is_empty());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_climatology_marks_missing_months() {
        let data = vec![
            obs(2000, 1, 1, 10.0),
            obs(2001, 1, 1, 20.0),
            obs(2000, 6, 1, 30.0),
        ];
        let (means, count) = monthly_climatology(&data);
        assert_eq!(means[0], Some(15.0));
        assert_eq!(means[5], Some(30.0));
        // February has no data: explicitly missing, not zero.
        assert_eq!(means[1], None);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_cell_means_keyed_by_coordinate_bits() {
        let a = Observation::new(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), 14.0, -17.0, 10.0);
        let b = Observation::new(NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(), 14.0, -17.0, 20.0);
        let c = Observation::new(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), 15.0, -17.0, 40.0);
        let (means, count) = cell_means([&a, &b, &c]);
        assert_eq!(count, 3);
        assert_eq!(
            means[&(14.0f64.to_bits(), (-17.0f64).to_bits())],
            15.0
        );
        assert_eq!(
            means[&(15.0f64.to_bits(), (-17.0f64).to_bits())],
            40.0
        );
    }

    #[test]
    fn test_describe_ordering_invariant() {
        let data = vec![obs(2000, 1, 1, 18.0), obs(2000, 1, 2, 24.0), obs(2000, 1, 3, 21.0)];
        let summary = describe(&data);
        assert_eq!(summary.count, 3);
        let (mean, min, max) = (
            summary.mean.unwrap(),
            summary.min.unwrap(),
            summary.max.unwrap(),
        );
        assert!(max >= mean && mean >= min);
        assert_eq!(mean, 21.0);
        // Sample stddev of {18, 24, 21} is 3.
        assert!((summary.std_dev.unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_describe_single_observation() {
        let data = vec![obs(2000, 1, 1, 25.0)];
        let summary = describe(&data);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, Some(25.0));
        assert_eq!(summary.min, Some(25.0));
        assert_eq!(summary.max, Some(25.0));
        // Sample stddev is undefined for n = 1; reported as 0 by convention.
        assert_eq!(summary.std_dev, Some(0.0));
    }

    #[test]
    fn test_describe_empty_is_not_an_error() {
        let summary = describe(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.std_dev, None);
    }
}
