//! Grid axis index and nearest-cell resolution.
//!
//! The grid is a fixed set of a few hundred (latitude, longitude) sample
//! points. Axes are derived once from the loaded observations and shared
//! read-only afterwards; nearest lookups are independent linear scans per
//! axis, which is the contract callers depend on for tie-breaking.

use crate::error::{ClimError, Result};
use crate::types::{GridCell, Observation};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude, used by the planar approximation.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Formula behind a reported distance.
///
/// Every [`NearestCell`] names the metric that produced its `distance_km`,
/// so callers are never left guessing which formula a number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Great-circle distance on a spherical Earth.
    #[default]
    Haversine,
    /// Flat approximation: `sqrt(dlat² + dlon²) × 111 km`. Matches the
    /// upstream tool's reporting.
    Planar,
}

/// Outcome of a nearest-cell lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestCell {
    pub cell: GridCell,
    /// Actual grid coordinate resolved to, not the query coordinate.
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
    pub metric: DistanceMetric,
}

/// Sorted, de-duplicated latitude and longitude axes of the dataset.
///
/// Built once from the reference variable's observations; immutable and
/// freely shareable across concurrent queries afterwards.
#[derive(Debug, Clone)]
pub struct GridIndex {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
}

impl GridIndex {
    /// Derive the grid axes from an observation set.
    ///
    /// Returns [`ClimError::GridNotReady`] for an empty set: serving queries
    /// without a grid is a startup precondition violation, not a degraded
    /// mode.
    pub fn build(observations: &[Observation]) -> Result<Self> {
        if observations.is_empty() {
            return Err(ClimError::GridNotReady);
        }

        let mut latitudes: Vec<f64> = observations.iter().map(|o| o.latitude).collect();
        let mut longitudes: Vec<f64> = observations.iter().map(|o| o.longitude).collect();
        latitudes.sort_by(f64::total_cmp);
        latitudes.dedup();
        longitudes.sort_by(f64::total_cmp);
        longitudes.dedup();

        log::info!(
            "grid index built: {} latitudes x {} longitudes",
            latitudes.len(),
            longitudes.len()
        );

        Ok(Self {
            latitudes,
            longitudes,
        })
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn lat_count(&self) -> usize {
        self.latitudes.len()
    }

    pub fn lon_count(&self) -> usize {
        self.longitudes.len()
    }

    /// Total number of addressable cells (not all need carry data).
    pub fn cell_count(&self) -> usize {
        self.latitudes.len() * self.longitudes.len()
    }

    pub fn latitude_range(&self) -> (f64, f64) {
        (self.latitudes[0], self.latitudes[self.latitudes.len() - 1])
    }

    pub fn longitude_range(&self) -> (f64, f64) {
        (
            self.longitudes[0],
            self.longitudes[self.longitudes.len() - 1],
        )
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.lat_idx < self.latitudes.len() && cell.lon_idx < self.longitudes.len()
    }

    /// Coordinates of a cell, bounds-checked.
    pub fn cell_coords(&self, cell: GridCell) -> Result<(f64, f64)> {
        if !self.contains(cell) {
            return Err(ClimError::CellOutOfBounds {
                lat_idx: cell.lat_idx,
                lon_idx: cell.lon_idx,
                lat_count: self.latitudes.len(),
                lon_count: self.longitudes.len(),
            });
        }
        Ok((self.latitudes[cell.lat_idx], self.longitudes[cell.lon_idx]))
    }

    /// Resolve a coordinate to its nearest grid cell.
    ///
    /// Each axis is scanned independently for the value minimizing the
    /// absolute difference; on an exact tie the lowest index wins. The
    /// reported distance is between the query point and the resolved grid
    /// point, computed with `metric`.
    pub fn resolve(&self, latitude: f64, longitude: f64, metric: DistanceMetric) -> NearestCell {
        let lat_idx = nearest_index(&self.latitudes, latitude);
        let lon_idx = nearest_index(&self.longitudes, longitude);
        let grid_lat = self.latitudes[lat_idx];
        let grid_lon = self.longitudes[lon_idx];

        let distance_km = match metric {
            DistanceMetric::Haversine => {
                Haversine.distance(
                    Point::new(longitude, latitude),
                    Point::new(grid_lon, grid_lat),
                ) / 1000.0
            }
            DistanceMetric::Planar => {
                let dlat = latitude - grid_lat;
                let dlon = longitude - grid_lon;
                (dlat * dlat + dlon * dlon).sqrt() * KM_PER_DEGREE
            }
        };

        NearestCell {
            cell: GridCell::new(lat_idx, lon_idx),
            latitude: grid_lat,
            longitude: grid_lon,
            distance_km,
            metric,
        }
    }

    /// Resolve a coordinate, rejecting matches farther than
    /// `tolerance_degrees` from the query point on either axis.
    ///
    /// The gate is a per-axis degree difference, not a geodesic radius; the
    /// returned `distance_km` still uses `metric`. The two are intentionally
    /// separate: the gate reproduces the upstream difference check while the
    /// distance is for human-facing reporting.
    pub fn resolve_within(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance_degrees: f64,
        metric: DistanceMetric,
    ) -> Option<NearestCell> {
        let nearest = self.resolve(latitude, longitude, metric);
        if (latitude - nearest.latitude).abs() > tolerance_degrees
            || (longitude - nearest.longitude).abs() > tolerance_degrees
        {
            return None;
        }
        Some(nearest)
    }
}

/// Index of the axis value closest to `target`. Lowest index wins ties.
fn nearest_index(axis: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_diff = f64::INFINITY;
    for (i, value) in axis.iter().enumerate() {
        let diff = (value - target).abs();
        if diff < best_diff {
            best = i;
            best_diff = diff;
        }
    }
    best
}
