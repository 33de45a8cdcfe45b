//! Observation storage and the tabular load contract.
//!
//! The store owns the full per-variable observation sets for the process
//! lifetime. It is read-only after load, so concurrent filtering needs no
//! locks; the only mutable state is an atomic scan counter kept for
//! observability.

use crate::error::{ClimError, Result};
use crate::types::{Observation, Variable};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory record store, one observation set per climate variable.
#[derive(Debug, Default)]
pub struct RecordStore {
    minimum: Vec<Observation>,
    maximum: Vec<Observation>,
    scans: AtomicU64,
}

impl RecordStore {
    /// Build a store from already-parsed observation sets.
    pub fn from_observations(minimum: Vec<Observation>, maximum: Vec<Observation>) -> Self {
        Self {
            minimum,
            maximum,
            scans: AtomicU64::new(0),
        }
    }

    /// Full observation set for a variable.
    pub fn observations(&self, variable: Variable) -> &[Observation] {
        match variable {
            Variable::Minimum => &self.minimum,
            Variable::Maximum => &self.maximum,
        }
    }

    pub fn len(&self, variable: Variable) -> usize {
        self.observations(variable).len()
    }

    pub fn is_empty(&self, variable: Variable) -> bool {
        self.observations(variable).is_empty()
    }

    /// Number of raw scans performed across all filter calls.
    ///
    /// Instrumentation only: lets callers (and tests) observe that cache
    /// hits do not touch the store.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Observations with `start_year <= year <= end_year`.
    ///
    /// Bounds are inclusive; ordering validation belongs to the façade.
    pub fn filter_by_year_range(
        &self,
        variable: Variable,
        start_year: i32,
        end_year: i32,
    ) -> impl Iterator<Item = &Observation> {
        self.record_scan();
        self.observations(variable)
            .iter()
            .filter(move |o| o.year() >= start_year && o.year() <= end_year)
    }

    /// Year-range filter additionally restricted to one calendar month.
    pub fn filter_by_year_range_and_month(
        &self,
        variable: Variable,
        start_year: i32,
        end_year: i32,
        month: u32,
    ) -> impl Iterator<Item = &Observation> {
        self.record_scan();
        self.observations(variable)
            .iter()
            .filter(move |o| o.year() >= start_year && o.year() <= end_year && o.month() == month)
    }

    /// Year-range filter restricted to a single grid point.
    ///
    /// `latitude`/`longitude` must be exact axis values (resolved through
    /// the grid index); comparison is exact, which is sound because every
    /// observation coordinate is drawn from the axes.
    pub fn filter_by_point(
        &self,
        variable: Variable,
        latitude: f64,
        longitude: f64,
        start_year: i32,
        end_year: i32,
    ) -> impl Iterator<Item = &Observation> {
        self.record_scan();
        self.observations(variable).iter().filter(move |o| {
            o.latitude == latitude
                && o.longitude == longitude
                && o.year() >= start_year
                && o.year() <= end_year
        })
    }
}

/// Parse one variable's observations from CSV text.
///
/// Expected shape is what the upstream NetCDF converter emits: a header row
/// naming a date column (`time` or `date`), `latitude`/`lat`,
/// `longitude`/`lon`, and the value column; data rows are plain numerics
/// with no quoting. Rows may arrive in any order. Datetime strings are
/// tolerated by truncating to the date part.
///
/// Strict mode fails on the first malformed row with the offending line
/// number; `lenient` skips such rows with a warning instead.
pub fn parse_csv(variable: Variable, content: &str, lenient: bool) -> Result<Vec<Observation>> {
    let mut lines = content.lines().enumerate();

    let (_, header) = lines.next().ok_or_else(|| ClimError::LoadFailure {
        line: 1,
        reason: "empty input, expected a header row".to_string(),
    })?;
    let columns = parse_header(variable, header)?;

    let mut observations = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&columns, line) {
            Ok(obs) => observations.push(obs),
            Err(reason) if lenient => {
                log::warn!(
                    "skipping malformed {} row at line {}: {}",
                    variable,
                    idx + 1,
                    reason
                );
            }
            Err(reason) => {
                return Err(ClimError::LoadFailure {
                    line: idx + 1,
                    reason,
                });
            }
        }
    }

    log::info!(
        "loaded {} {} observations",
        observations.len(),
        variable.dataset_name()
    );
    Ok(observations)
}

/// Read and parse one variable's observations from a CSV file.
pub fn load_csv_path<P: AsRef<Path>>(
    variable: Variable,
    path: P,
    lenient: bool,
) -> Result<Vec<Observation>> {
    let path = path.as_ref();
    log::info!("loading {} from {}", variable.dataset_name(), path.display());
    let content = std::fs::read_to_string(path)?;
    parse_csv(variable, &content, lenient)
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    latitude: usize,
    longitude: usize,
    value: usize,
}

fn parse_header(variable: Variable, header: &str) -> Result<Columns> {
    let names: Vec<&str> = header.split(',').map(str::trim).collect();
    let find = |candidates: &[&str]| {
        names
            .iter()
            .position(|name| candidates.contains(&name.to_ascii_lowercase().as_str()))
    };

    let date = find(&["time", "date"]);
    let latitude = find(&["latitude", "lat"]);
    let longitude = find(&["longitude", "lon"]);
    // The value column is named after the dataset variable; fall back to the
    // one column left over so renamed exports still load.
    let value = find(&[variable.dataset_name(), variable.as_str(), "value"]).or_else(|| {
        (0..names.len()).find(|i| {
            Some(*i) != date && Some(*i) != latitude && Some(*i) != longitude
        })
    });

    match (date, latitude, longitude, value) {
        (Some(date), Some(latitude), Some(longitude), Some(value)) => Ok(Columns {
            date,
            latitude,
            longitude,
            value,
        }),
        _ => Err(ClimError::LoadFailure {
            line: 1,
            reason: format!(
                "header '{}' is missing one of: date/time, latitude, longitude, {}",
                header,
                variable.dataset_name()
            ),
        }),
    }
}

fn parse_row(columns: &Columns, line: &str) -> std::result::Result<Observation, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let field = |idx: usize| {
        fields
            .get(idx)
            .copied()
            .ok_or_else(|| format!("expected at least {} columns, got {}", idx + 1, fields.len()))
    };

    let date_str = field(columns.date)?;
    // "1960-01-01 12:00:00" and "1960-01-01" both resolve to the date part.
    let date_part = date_str.get(..10).unwrap_or(date_str);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("unparseable date '{date_str}': {e}"))?;

    let parse_f64 = |name: &str, raw: &str| {
        raw.parse::<f64>()
            .map_err(|_| format!("unparseable {name} '{raw}'"))
    };
    let latitude = parse_f64("latitude", field(columns.latitude)?)?;
    let longitude = parse_f64("longitude", field(columns.longitude)?)?;
    let value = parse_f64("value", field(columns.value)?)?;

    Ok(Observation::new(date, latitude, longitude, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(y: i32, m: u32, d: u32, lat: f64, lon: f64, v: f64) -> Observation {
        Observation::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), lat, lon, v)
    }

    fn sample_store() -> RecordStore {
        RecordStore::from_observations(
            vec![
                obs(1999, 12, 31, 14.0, -17.0, 18.0),
                obs(2000, 1, 1, 14.0, -17.0, 19.0),
                obs(2000, 2, 1, 15.0, -17.0, 20.0),
                obs(2001, 1, 1, 14.0, -17.0, 21.0),
                obs(2002, 1, 1, 15.0, -16.0, 22.0),
            ],
            vec![obs(2000, 1, 1, 14.0, -17.0, 31.0)],
        )
    }

    #[test]
    fn test_filter_by_year_range_is_inclusive() {
        let store = sample_store();
        let hits: Vec<_> = store
            .filter_by_year_range(Variable::Minimum, 2000, 2001)
            .collect();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|o| o.year() >= 2000 && o.year() <= 2001));
    }

    #[test]
    fn test_filter_by_month() {
        let store = sample_store();
        // January rows exist in 2000, 2001 and 2002; February must not leak in.
        let hits: Vec<_> = store
            .filter_by_year_range_and_month(Variable::Minimum, 2000, 2002, 1)
            .collect();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|o| o.month() == 1));

        let narrowed: Vec<_> = store
            .filter_by_year_range_and_month(Variable::Minimum, 2000, 2001, 1)
            .collect();
        assert_eq!(narrowed.len(), 2);
    }

    #[test]
    fn test_filter_by_point_exact_match() {
        let store = sample_store();
        let hits: Vec<_> = store
            .filter_by_point(Variable::Minimum, 14.0, -17.0, 1999, 2002)
            .collect();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_scan_counter_increments_per_filter() {
        let store = sample_store();
        assert_eq!(store.scan_count(), 0);
        let _ = store.filter_by_year_range(Variable::Minimum, 2000, 2001).count();
        let _ = store
            .filter_by_point(Variable::Maximum, 14.0, -17.0, 2000, 2000)
            .count();
        assert_eq!(store.scan_count(), 2);
    }

    #[test]
    fn test_parse_csv_basic() {
        let csv = "time,latitude,longitude,tasmin\n\
                   2000-01-01,14.0,-17.0,19.5\n\
                   2000-01-02,14.0,-17.0,19.8\n";
        let rows = parse_csv(Variable::Minimum, csv, false).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, 19.5);
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2000, 1, 2).unwrap());
    }

    #[test]
    fn test_parse_csv_tolerates_datetime_and_order() {
        let csv = "latitude,time,tasmax,longitude\n\
                   14.0,2000-06-01 00:00:00,33.2,-17.0\n";
        let rows = parse_csv(Variable::Maximum, csv, false).unwrap();
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2000, 6, 1).unwrap());
        assert_eq!(rows[0].value, 33.2);
        assert_eq!(rows[0].longitude, -17.0);
    }

    #[test]
    fn test_parse_csv_strict_reports_line() {
        let csv = "time,latitude,longitude,tasmin\n\
                   2000-01-01,14.0,-17.0,19.5\n\
                   not-a-date,14.0,-17.0,20.0\n";
        match parse_csv(Variable::Minimum, csv, false) {
            Err(ClimError::LoadFailure { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected LoadFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_csv_lenient_skips_bad_rows() {
        let csv = "time,latitude,longitude,tasmin\n\
                   2000-01-01,14.0,-17.0,19.5\n\
                   2000-01-02,14.0,-17.0,oops\n\
                   2000-01-03,14.0,-17.0,20.1\n";
        let rows = parse_csv(Variable::Minimum, csv, true).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_csv_missing_column_fails() {
        let csv = "time,latitude,tasmin\n2000-01-01,14.0,19.5\n";
        assert!(matches!(
            parse_csv(Variable::Minimum, csv, false),
            Err(ClimError::LoadFailure { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_csv_path_round_trip() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "time,latitude,longitude,tasmin\n2000-01-01,14.0,-17.0,19.5\n"
        )
        .unwrap();
        let rows = load_csv_path(Variable::Minimum, file.path(), false).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_load_csv_path_missing_file() {
        assert!(matches!(
            load_csv_path(Variable::Minimum, "/nonexistent/tasmin.csv", false),
            Err(ClimError::Io(_))
        ));
    }
}
