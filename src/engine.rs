//! The query façade composing store, grid, aggregator, cache, and
//! localities.
//!
//! One engine instance is constructed at process start and shared by
//! reference across request handlers; there are no ambient singletons, so
//! tests construct isolated instances freely. Every operation validates its
//! own parameters, consults the cache under a typed key, and computes on a
//! miss. Export is the exception: it streams raw rows and is never cached.

use crate::aggregate::{
    self, Climatology, GlobalStats, LocalityStats, LocalityTimeSeries, SpatialCell, SpatialField,
    TimeSeries,
};
use crate::cache::{CacheStats, QueryKey, ResultCache};
use crate::error::{ClimError, Result};
use crate::grid::{DistanceMetric, GridIndex, NearestCell};
use crate::locality::{Locality, LocalityResolver};
use crate::store::RecordStore;
use crate::types::{Config, GridCell, Variable, UNIT_CELSIUS};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

/// Available variables plus the dataset's overall time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCatalog {
    pub variables: Vec<Variable>,
    pub start_year: i32,
    pub end_year: i32,
}

/// One cached value; the variant always matches its key's operation.
#[derive(Clone)]
enum CachedResult {
    TimeSeries(TimeSeries),
    Climatology(Climatology),
    Spatial(SpatialField),
    Statistics(GlobalStats),
    LocalitySeries(LocalityTimeSeries),
    LocalityStats(LocalityStats),
}

/// Query engine over two fixed daily temperature grids.
///
/// Immutable after construction apart from the result cache; safe to share
/// across threads (`ClimateEngine: Send + Sync`).
pub struct ClimateEngine {
    store: RecordStore,
    grid: Arc<GridIndex>,
    localities: LocalityResolver,
    cache: ResultCache<CachedResult>,
    config: Config,
    // Distinct reference-variable years, sorted. The store never changes
    // after load, so this is computed once here instead of per call.
    years: Vec<i32>,
}

impl ClimateEngine {
    /// Build an engine from a loaded store.
    ///
    /// The grid axes are derived from the minimum-temperature set (the
    /// reference variable); an empty reference set is
    /// [`ClimError::GridNotReady`] and the engine refuses to start.
    pub fn new(store: RecordStore, config: Config) -> Result<Self> {
        config.validate().map_err(ClimError::InvalidConfig)?;

        let grid = Arc::new(GridIndex::build(store.observations(Variable::Minimum))?);
        let localities = LocalityResolver::new(Arc::clone(&grid), DistanceMetric::Haversine);
        let cache = ResultCache::new(config.cache_ttl());

        let mut years: Vec<i32> = store
            .observations(Variable::Minimum)
            .iter()
            .map(|o| o.year())
            .collect();
        years.sort_unstable();
        years.dedup();

        log::info!(
            "engine ready: {} minimum / {} maximum observations over a {}x{} grid, cache ttl {:?}",
            store.len(Variable::Minimum),
            store.len(Variable::Maximum),
            grid.lat_count(),
            grid.lon_count(),
            cache.ttl(),
        );

        Ok(Self {
            store,
            grid,
            localities,
            cache,
            config,
            years,
        })
    }

    /// Builder entry point mirroring [`EngineBuilder`](crate::EngineBuilder).
    pub fn builder() -> crate::builder::EngineBuilder {
        crate::builder::EngineBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Raw scans performed against the store (instrumentation; cache hits
    /// do not advance this).
    pub fn scan_count(&self) -> u64 {
        self.store.scan_count()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Supported variables and the dataset's overall year span.
    pub fn list_variables(&self) -> VariableCatalog {
        VariableCatalog {
            variables: Variable::ALL.to_vec(),
            // Construction guarantees a non-empty reference set.
            start_year: self.years.first().copied().unwrap_or(0),
            end_year: self.years.last().copied().unwrap_or(0),
        }
    }

    /// Distinct years present in the reference variable, sorted ascending.
    /// Answered from the list memoized at construction; no store scan.
    pub fn list_years(&self) -> Vec<i32> {
        self.years.clone()
    }

    /// Annual mean time series over a year range.
    pub fn time_series(
        &self,
        variable: Variable,
        start_year: i32,
        end_year: i32,
    ) -> Result<TimeSeries> {
        validate_year_range(start_year, end_year)?;
        let key = QueryKey::TimeSeries {
            variable,
            start_year,
            end_year,
        };
        if let Some(CachedResult::TimeSeries(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let (series, count) = aggregate::annual_mean(self.store.filter_by_year_range(
            variable,
            start_year,
            end_year,
        ));
        let (years, values): (Vec<i32>, Vec<f64>) = series.into_iter().unzip();
        let result = TimeSeries {
            variable,
            start_year,
            end_year,
            years,
            values,
            unit: UNIT_CELSIUS.to_string(),
            data_points_used: count,
        };
        self.cache.put(key, CachedResult::TimeSeries(result.clone()));
        Ok(result)
    }

    /// Long-run monthly means across all years of a range.
    ///
    /// Months without observations are `None`, never zero.
    pub fn climatology(
        &self,
        variable: Variable,
        start_year: i32,
        end_year: i32,
    ) -> Result<Climatology> {
        validate_year_range(start_year, end_year)?;
        let key = QueryKey::Climatology {
            variable,
            start_year,
            end_year,
        };
        if let Some(CachedResult::Climatology(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let (means, count) = aggregate::monthly_climatology(self.store.filter_by_year_range(
            variable,
            start_year,
            end_year,
        ));
        let result = Climatology {
            variable,
            start_year,
            end_year,
            months: (1..=12).collect(),
            values: means.to_vec(),
            unit: UNIT_CELSIUS.to_string(),
            data_points_used: count,
        };
        self.cache.put(key, CachedResult::Climatology(result.clone()));
        Ok(result)
    }

    /// Per-cell means for one calendar month over a year range, covering
    /// the full grid cross product. Cells without observations are flagged
    /// missing.
    pub fn spatial(
        &self,
        variable: Variable,
        month: u32,
        start_year: i32,
        end_year: i32,
    ) -> Result<SpatialField> {
        validate_year_range(start_year, end_year)?;
        validate_month(month)?;
        let key = QueryKey::Spatial {
            variable,
            month,
            start_year,
            end_year,
        };
        if let Some(CachedResult::Spatial(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let (means, count) = aggregate::cell_means(self.store.filter_by_year_range_and_month(
            variable,
            start_year,
            end_year,
            month,
        ));

        let mut cells = Vec::with_capacity(self.grid.cell_count());
        let mut cells_with_data = 0;
        for (lat_idx, &latitude) in self.grid.latitudes().iter().enumerate() {
            for (lon_idx, &longitude) in self.grid.longitudes().iter().enumerate() {
                let mean = means
                    .get(&(latitude.to_bits(), longitude.to_bits()))
                    .copied();
                if mean.is_some() {
                    cells_with_data += 1;
                }
                cells.push(SpatialCell {
                    cell: GridCell::new(lat_idx, lon_idx),
                    latitude,
                    longitude,
                    mean,
                });
            }
        }

        let result = SpatialField {
            variable,
            month,
            start_year,
            end_year,
            latitudes: self.grid.latitudes().to_vec(),
            longitudes: self.grid.longitudes().to_vec(),
            cells,
            cells_with_data,
            unit: UNIT_CELSIUS.to_string(),
            data_points_used: count,
        };
        self.cache.put(key, CachedResult::Spatial(result.clone()));
        Ok(result)
    }

    /// Domain-wide descriptive statistics over a year range.
    pub fn statistics(
        &self,
        variable: Variable,
        start_year: i32,
        end_year: i32,
    ) -> Result<GlobalStats> {
        validate_year_range(start_year, end_year)?;
        let key = QueryKey::Statistics {
            variable,
            start_year,
            end_year,
        };
        if let Some(CachedResult::Statistics(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let stats =
            aggregate::describe(self.store.filter_by_year_range(variable, start_year, end_year));
        let result = GlobalStats {
            variable,
            start_year,
            end_year,
            stats,
            unit: UNIT_CELSIUS.to_string(),
        };
        self.cache.put(key, CachedResult::Statistics(result.clone()));
        Ok(result)
    }

    /// Annual mean series restricted to one grid cell.
    pub fn locality_time_series(
        &self,
        variable: Variable,
        cell: GridCell,
        start_year: i32,
        end_year: i32,
    ) -> Result<LocalityTimeSeries> {
        validate_year_range(start_year, end_year)?;
        let (latitude, longitude) = self.grid.cell_coords(cell)?;
        let key = QueryKey::LocalityTimeSeries {
            variable,
            cell,
            start_year,
            end_year,
        };
        if let Some(CachedResult::LocalitySeries(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let (series, count) = aggregate::annual_mean(self.store.filter_by_point(
            variable,
            latitude,
            longitude,
            start_year,
            end_year,
        ));
        let (years, values): (Vec<i32>, Vec<f64>) = series.into_iter().unzip();
        let result = LocalityTimeSeries {
            variable,
            cell,
            latitude,
            longitude,
            start_year,
            end_year,
            years,
            values,
            unit: UNIT_CELSIUS.to_string(),
            data_points_used: count,
        };
        self.cache
            .put(key, CachedResult::LocalitySeries(result.clone()));
        Ok(result)
    }

    /// Descriptive statistics restricted to one grid cell.
    pub fn locality_statistics(
        &self,
        variable: Variable,
        cell: GridCell,
        start_year: i32,
        end_year: i32,
    ) -> Result<LocalityStats> {
        validate_year_range(start_year, end_year)?;
        let (latitude, longitude) = self.grid.cell_coords(cell)?;
        let key = QueryKey::LocalityStatistics {
            variable,
            cell,
            start_year,
            end_year,
        };
        if let Some(CachedResult::LocalityStats(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let stats = aggregate::describe(self.store.filter_by_point(
            variable,
            latitude,
            longitude,
            start_year,
            end_year,
        ));
        let result = LocalityStats {
            variable,
            cell,
            latitude,
            longitude,
            start_year,
            end_year,
            stats,
            unit: UNIT_CELSIUS.to_string(),
        };
        self.cache
            .put(key, CachedResult::LocalityStats(result.clone()));
        Ok(result)
    }

    /// Nearest grid cell for an arbitrary coordinate, gated per axis by
    /// `tolerance_degrees`. `None` means no cell within tolerance, which is
    /// a valid answer rather than an error.
    pub fn find_locality(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance_degrees: f64,
    ) -> Option<NearestCell> {
        self.localities.find_nearest(
            latitude,
            longitude,
            tolerance_degrees,
            DistanceMetric::Haversine,
        )
    }

    /// [`find_locality`](Self::find_locality) with the configured default
    /// tolerance.
    pub fn find_locality_default(&self, latitude: f64, longitude: f64) -> Option<NearestCell> {
        self.find_locality(latitude, longitude, self.config.locality_tolerance_degrees)
    }

    /// The fixed locality registry, resolved at startup, in insertion
    /// order.
    pub fn localities(&self) -> &[Locality] {
        self.localities.localities()
    }

    /// Serialize the filtered raw rows as CSV.
    ///
    /// Header: `date,year,month,day,latitude,longitude,<dataset name>`;
    /// values to two decimals, matching the upstream export format. This
    /// can carry the entire dataset and is deliberately uncached.
    pub fn export(&self, variable: Variable, start_year: i32, end_year: i32) -> Result<String> {
        validate_year_range(start_year, end_year)?;
        let rows = self.store.filter_by_year_range(variable, start_year, end_year);
        Ok(render_csv(variable, rows))
    }

    /// CSV export of one grid cell's raw rows, for per-locality downloads.
    /// Uncached for the same reason as [`export`](Self::export).
    pub fn export_cell(
        &self,
        variable: Variable,
        cell: GridCell,
        start_year: i32,
        end_year: i32,
    ) -> Result<String> {
        validate_year_range(start_year, end_year)?;
        let (latitude, longitude) = self.grid.cell_coords(cell)?;
        let rows = self
            .store
            .filter_by_point(variable, latitude, longitude, start_year, end_year);
        Ok(render_csv(variable, rows))
    }
}

fn render_csv<'a>(
    variable: Variable,
    rows: impl Iterator<Item = &'a crate::types::Observation>,
) -> String {
    let mut out = format!(
        "date,year,month,day,latitude,longitude,{}\n",
        variable.dataset_name()
    );
    for obs in rows {
        // Infallible: writing to a String cannot error.
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{:.2}",
            obs.date.format("%Y-%m-%d"),
            obs.year(),
            obs.month(),
            chrono::Datelike::day(&obs.date),
            obs.latitude,
            obs.longitude,
            obs.value,
        );
    }
    out
}

fn validate_year_range(start_year: i32, end_year: i32) -> Result<()> {
    if start_year > end_year {
        return Err(ClimError::InvalidYearRange {
            start: start_year,
            end: end_year,
        });
    }
    Ok(())
}

fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ClimError::InvalidMonth(month));
    }
    Ok(())
}
