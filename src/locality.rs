//! Named localities and their resolution to grid cells.
//!
//! The registry is a fixed list of Senegalese regional capitals covered by
//! the dataset. It is small and static, so every locality is
//! resolved against the grid eagerly at construction; the hot query path
//! never recomputes a nearest-cell lookup for a known city.

use crate::grid::{DistanceMetric, GridIndex, NearestCell};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reference coordinates for one registry entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalityDef {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

const fn def(name: &'static str, latitude: f64, longitude: f64) -> LocalityDef {
    LocalityDef {
        name,
        latitude,
        longitude,
    }
}

/// Fixed registry, insertion order preserved through the public API.
pub(crate) static LOCALITY_REGISTRY: Lazy<Vec<LocalityDef>> = Lazy::new(|| {
    vec![
        def("Dakar", 14.7167, -17.4677),
        def("Thiès", 14.7886, -16.9260),
        def("Kaolack", 14.1612, -16.0734),
        def("Saint-Louis", 16.0469, -16.4814),
        def("Ziguinchor", 12.5681, -16.2736),
        def("Diourbel", 14.6594, -16.2353),
        def("Tambacounda", 13.7671, -13.6681),
        def("Kolda", 12.8939, -14.9406),
        def("Fatick", 14.3341, -16.4069),
        def("Louga", 15.6181, -16.2463),
        def("Matam", 15.6554, -13.2550),
        def("Kaffrine", 14.1058, -15.5500),
        def("Kédougou", 12.5601, -12.1756),
        def("Sédhiou", 12.7081, -15.5569),
        def("Mbour", 14.4198, -16.9613),
    ]
});

/// A named place with its reference coordinates and the grid cell it
/// resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    /// Reference coordinates of the place itself.
    pub latitude: f64,
    pub longitude: f64,
    /// Nearest grid cell, with the distance between the reference point and
    /// the cell's actual coordinates.
    pub nearest: NearestCell,
}

/// Registry of named localities resolved against a grid.
pub struct LocalityResolver {
    grid: Arc<GridIndex>,
    localities: Vec<Locality>,
}

impl LocalityResolver {
    /// Resolve the full registry eagerly.
    pub fn new(grid: Arc<GridIndex>, metric: DistanceMetric) -> Self {
        let localities = LOCALITY_REGISTRY
            .iter()
            .map(|d| Locality {
                name: d.name.to_string(),
                latitude: d.latitude,
                longitude: d.longitude,
                nearest: grid.resolve(d.latitude, d.longitude, metric),
            })
            .collect();
        Self { grid, localities }
    }

    /// All localities in registry insertion order.
    pub fn localities(&self) -> &[Locality] {
        &self.localities
    }

    /// Nearest grid cell for an arbitrary coordinate, or `None` when the
    /// match is farther than `tolerance_degrees` from the query point on
    /// either axis.
    pub fn find_nearest(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance_degrees: f64,
        metric: DistanceMetric,
    ) -> Option<NearestCell> {
        self.grid
            .resolve_within(latitude, longitude, tolerance_degrees, metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;
    use chrono::NaiveDate;

    fn grid() -> Arc<GridIndex> {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let mut observations = Vec::new();
        for lat in [12.5, 14.0, 14.69, 15.5, 16.0] {
            for lon in [-17.44, -16.5, -15.5, -13.5, -12.5] {
                observations.push(Observation::new(date, lat, lon, 25.0));
            }
        }
        Arc::new(GridIndex::build(&observations).unwrap())
    }

    #[test]
    fn test_registry_resolved_eagerly_in_order() {
        let resolver = LocalityResolver::new(grid(), DistanceMetric::Haversine);
        let localities = resolver.localities();
        assert_eq!(localities.len(), 15);
        assert_eq!(localities[0].name, "Dakar");
        assert_eq!(localities[14].name, "Mbour");
        // Dakar sits near (14.69, -17.44) on this grid.
        assert_eq!(localities[0].nearest.latitude, 14.69);
        assert_eq!(localities[0].nearest.longitude, -17.44);
    }

    #[test]
    fn test_find_nearest_respects_tolerance() {
        let resolver = LocalityResolver::new(grid(), DistanceMetric::Haversine);
        let hit = resolver.find_nearest(14.70, -17.45, 0.5, DistanceMetric::Haversine);
        assert!(hit.is_some());
        assert!(hit.unwrap().distance_km < 2.0);

        let miss = resolver.find_nearest(14.70, -17.45, 0.005, DistanceMetric::Haversine);
        assert!(miss.is_none());
    }
}
