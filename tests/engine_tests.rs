use chrono::{Datelike, NaiveDate};
use climgrid::{
    ClimateEngine, Config, DistanceMetric, GridCell, Observation, Variable,
};
use std::time::Duration;

const LATS: [f64; 3] = [13.5, 14.69, 15.5];
const LONS: [f64; 3] = [-17.44, -16.5, -15.5];

fn value_for(variable: Variable, year: i32, month: u32, lat: f64) -> f64 {
    let base = match variable {
        Variable::Minimum => 18.0,
        Variable::Maximum => 31.0,
    };
    base + (year - 2000) as f64 * 0.05 + month as f64 * 0.1 + (lat - 14.0) * 0.2
}

/// One observation per cell on the 15th of every month, 2000..=2005.
fn synthetic_rows(variable: Variable) -> Vec<Observation> {
    let mut rows = Vec::new();
    for year in 2000..=2005 {
        for month in 1..=12 {
            for lat in LATS {
                for lon in LONS {
                    rows.push(Observation::new(
                        NaiveDate::from_ymd_opt(year, month, 15).unwrap(),
                        lat,
                        lon,
                        value_for(variable, year, month, lat),
                    ));
                }
            }
        }
    }
    rows
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn engine() -> ClimateEngine {
    init_logs();
    ClimateEngine::builder()
        .observations(Variable::Minimum, synthetic_rows(Variable::Minimum))
        .observations(Variable::Maximum, synthetic_rows(Variable::Maximum))
        .build()
        .unwrap()
}

#[test]
fn time_series_returns_each_year_in_range_exactly_once() {
    let engine = engine();
    let series = engine.time_series(Variable::Maximum, 2000, 2005).unwrap();

    assert_eq!(series.years, vec![2000, 2001, 2002, 2003, 2004, 2005]);
    assert_eq!(series.values.len(), 6);
    assert_eq!(series.unit, "°C");
    // 12 months x 9 cells x 6 years.
    assert_eq!(series.data_points_used, 12 * 9 * 6);

    // Each year's mean comes only from that year's rows.
    let rows = synthetic_rows(Variable::Maximum);
    for (year, value) in series.years.iter().zip(&series.values) {
        let year_rows: Vec<f64> = rows
            .iter()
            .filter(|o| o.date.year() == *year)
            .map(|o| o.value)
            .collect();
        let expected = year_rows.iter().sum::<f64>() / year_rows.len() as f64;
        assert!((value - expected).abs() < 1e-9, "year {year}");
    }
}

#[test]
fn time_series_subrange_stays_within_bounds() {
    let engine = engine();
    let series = engine.time_series(Variable::Minimum, 2002, 2003).unwrap();
    assert!(series.years.iter().all(|y| (2002..=2003).contains(y)));
    let mut sorted = series.years.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted, series.years);
}

#[test]
fn repeated_queries_are_idempotent_and_served_from_cache() {
    let engine = engine();

    let first = engine.time_series(Variable::Minimum, 2000, 2005).unwrap();
    let scans_after_first = engine.scan_count();

    let second = engine.time_series(Variable::Minimum, 2000, 2005).unwrap();
    assert_eq!(first, second);
    // The second call must not rescan the store.
    assert_eq!(engine.scan_count(), scans_after_first);

    let stats = engine.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.insertions, 1);
}

#[test]
fn cache_entries_expire_after_ttl() {
    let config = Config::default().with_cache_ttl(Duration::from_millis(50));
    let engine = ClimateEngine::builder()
        .observations(Variable::Minimum, synthetic_rows(Variable::Minimum))
        .observations(Variable::Maximum, synthetic_rows(Variable::Maximum))
        .config(config)
        .build()
        .unwrap();

    engine.statistics(Variable::Minimum, 2000, 2001).unwrap();
    assert_eq!(engine.scan_count(), 1);

    engine.statistics(Variable::Minimum, 2000, 2001).unwrap();
    assert_eq!(engine.scan_count(), 1);

    std::thread::sleep(Duration::from_millis(80));

    engine.statistics(Variable::Minimum, 2000, 2001).unwrap();
    assert_eq!(engine.scan_count(), 2);
    assert_eq!(engine.cache_stats().evictions, 1);
}

#[test]
fn statistics_hold_ordering_invariant() {
    let engine = engine();
    let stats = engine.statistics(Variable::Maximum, 2000, 2005).unwrap();

    let mean = stats.stats.mean.unwrap();
    assert!(stats.stats.max.unwrap() >= mean);
    assert!(mean >= stats.stats.min.unwrap());
    assert_eq!(stats.stats.count, 12 * 9 * 6);
    assert!(stats.stats.std_dev.unwrap() > 0.0);
}

#[test]
fn climatology_orders_months_and_marks_empty_months_missing() {
    // Only January and June carry data here.
    let date = |y, m| NaiveDate::from_ymd_opt(y, m, 15).unwrap();
    let rows = vec![
        Observation::new(date(1990, 1), 14.69, -17.44, 20.0),
        Observation::new(date(1991, 1), 14.69, -17.44, 22.0),
        Observation::new(date(1990, 6), 14.69, -17.44, 28.0),
    ];
    let engine = ClimateEngine::builder()
        .observations(Variable::Minimum, rows.clone())
        .observations(Variable::Maximum, rows)
        .build()
        .unwrap();

    let clim = engine.climatology(Variable::Minimum, 1990, 1991).unwrap();
    assert_eq!(clim.months, (1..=12).collect::<Vec<u32>>());
    assert_eq!(clim.values[0], Some(21.0));
    assert_eq!(clim.values[5], Some(28.0));
    // Months with no observations are explicitly missing, not 0 °C.
    assert_eq!(clim.values[1], None);
    assert_eq!(clim.data_points_used, 3);
}

#[test]
fn spatial_flags_cells_without_data_as_missing() {
    let date = |m, d| NaiveDate::from_ymd_opt(1990, m, d).unwrap();
    // Two-cell grid; only (14.0, -17.0) has January-1990 data.
    let rows = vec![
        Observation::new(date(1, 10), 14.0, -17.0, 20.0),
        Observation::new(date(1, 20), 14.0, -17.0, 24.0),
        Observation::new(date(6, 10), 15.0, -16.0, 30.0),
    ];
    let engine = ClimateEngine::builder()
        .observations(Variable::Minimum, rows.clone())
        .observations(Variable::Maximum, rows)
        .build()
        .unwrap();

    let field = engine.spatial(Variable::Minimum, 1, 1990, 1990).unwrap();
    assert_eq!(field.cells.len(), 4);
    assert_eq!(field.cells_with_data, 1);
    assert_eq!(field.data_points_used, 2);

    let populated = field
        .cells
        .iter()
        .find(|c| c.latitude == 14.0 && c.longitude == -17.0)
        .unwrap();
    assert_eq!(populated.mean, Some(22.0));

    for cell in field.cells.iter().filter(|c| c.cell != populated.cell) {
        assert_eq!(cell.mean, None);
    }
}

#[test]
fn spatial_covers_full_grid_cross_product() {
    let engine = engine();
    let field = engine.spatial(Variable::Maximum, 1, 2000, 2005).unwrap();
    assert_eq!(field.cells.len(), LATS.len() * LONS.len());
    assert_eq!(field.cells_with_data, field.cells.len());
    // Row-major ordering: lat_idx * lon_count + lon_idx.
    for (i, cell) in field.cells.iter().enumerate() {
        assert_eq!(cell.cell.lat_idx * LONS.len() + cell.cell.lon_idx, i);
    }
}

#[test]
fn locality_time_series_is_restricted_to_one_cell() {
    let engine = engine();
    let cell = GridCell::new(1, 0); // (14.69, -17.44)
    let series = engine
        .locality_time_series(Variable::Minimum, cell, 2000, 2002)
        .unwrap();

    assert_eq!(series.latitude, 14.69);
    assert_eq!(series.longitude, -17.44);
    assert_eq!(series.years, vec![2000, 2001, 2002]);
    // 12 monthly rows per year for one cell.
    assert_eq!(series.data_points_used, 36);
}

#[test]
fn locality_statistics_match_cell_data() {
    let engine = engine();
    let cell = GridCell::new(0, 0);
    let stats = engine
        .locality_statistics(Variable::Maximum, cell, 2000, 2000)
        .unwrap();
    assert_eq!(stats.stats.count, 12);
    assert!(stats.stats.max.unwrap() >= stats.stats.mean.unwrap());
}

#[test]
fn find_locality_respects_tolerance() {
    let engine = engine();

    let hit = engine.find_locality(14.70, -17.45, 0.5).unwrap();
    assert_eq!(hit.latitude, 14.69);
    assert_eq!(hit.longitude, -17.44);
    assert_eq!(hit.metric, DistanceMetric::Haversine);
    assert!(hit.distance_km > 1.0 && hit.distance_km < 2.0);

    assert!(engine.find_locality(14.70, -17.45, 0.005).is_none());
}

#[test]
fn localities_registry_is_eager_and_ordered() {
    let engine = engine();
    let localities = engine.localities();
    assert_eq!(localities.len(), 15);
    assert_eq!(localities[0].name, "Dakar");
    // Dakar's reference point resolves onto this grid.
    assert_eq!(localities[0].nearest.latitude, 14.69);
}

#[test]
fn export_streams_raw_rows_uncached() {
    let engine = engine();
    let csv = engine.export(Variable::Minimum, 2000, 2000).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "date,year,month,day,latitude,longitude,tasmin");
    // 12 months x 9 cells.
    assert_eq!(lines.len() - 1, 108);

    let scans = engine.scan_count();
    let _ = engine.export(Variable::Minimum, 2000, 2000).unwrap();
    // Export is never cached: every call rescans.
    assert_eq!(engine.scan_count(), scans + 1);
}

#[test]
fn export_cell_contains_only_that_cell() {
    let engine = engine();
    let csv = engine
        .export_cell(Variable::Minimum, GridCell::new(1, 0), 2000, 2000)
        .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len() - 1, 12);
    assert!(lines[1..].iter().all(|l| l.contains("14.69,-17.44")));
}

#[test]
fn distinct_parameters_do_not_share_cache_entries() {
    let engine = engine();
    let a = engine.time_series(Variable::Minimum, 2000, 2001).unwrap();
    let b = engine.time_series(Variable::Minimum, 2000, 2002).unwrap();
    let c = engine.time_series(Variable::Maximum, 2000, 2001).unwrap();
    assert_ne!(a.years.len(), b.years.len());
    assert_ne!(a.values, c.values);
    assert_eq!(engine.cache_stats().insertions, 3);
}
