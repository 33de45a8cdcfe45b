//! Embedded query-and-cache engine for daily gridded temperature records.
//!
//! The engine loads two fixed observation sets (daily minimum and maximum
//! surface temperature over a rectangular grid), indexes the grid axes for
//! nearest-point lookup, and serves aggregate queries (annual time series,
//! monthly climatology, per-cell spatial means, global statistics)
//! memoized with a time-based expiry.
//!
//! ```rust
//! use climgrid::{ClimateEngine, Observation, Variable};
//! use chrono::NaiveDate;
//!
//! let rows = vec![Observation::new(
//!     NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
//!     14.69,
//!     -17.44,
//!     24.5,
//! )];
//! let engine = ClimateEngine::builder()
//!     .observations(Variable::Minimum, rows.clone())
//!     .observations(Variable::Maximum, rows)
//!     .build()?;
//!
//! let series = engine.time_series(Variable::Minimum, 2000, 2000)?;
//! assert_eq!(series.years, vec![2000]);
//! # Ok::<(), climgrid::ClimError>(())
//! ```

pub mod aggregate;
pub mod builder;
pub mod cache;
pub mod engine;
pub mod error;
pub mod grid;
pub mod locality;
pub mod store;
pub mod types;

pub use builder::EngineBuilder;
pub use engine::{ClimateEngine, VariableCatalog};
pub use error::{ClimError, Result};

pub use aggregate::{
    Climatology, GlobalStats, LocalityStats, LocalityTimeSeries, SpatialCell, SpatialField,
    StatsSummary, TimeSeries,
};
pub use cache::{CacheStats, QueryKey, ResultCache};
pub use grid::{DistanceMetric, GridIndex, NearestCell, KM_PER_DEGREE};
pub use locality::{Locality, LocalityResolver};
pub use store::RecordStore;
pub use types::{Config, GridCell, Observation, Variable, UNIT_CELSIUS};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{ClimError, ClimateEngine, EngineBuilder, Result};

    pub use crate::{Config, GridCell, Observation, Variable};

    pub use crate::{DistanceMetric, GridIndex, NearestCell};

    pub use crate::{Locality, RecordStore};

    pub use std::time::Duration;
}
