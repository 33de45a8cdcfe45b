//! Core value types and engine configuration.

use crate::error::ClimError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Unit string attached to every aggregation result.
pub const UNIT_CELSIUS: &str = "°C";

/// One of the two daily temperature grids served by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    /// Daily minimum surface temperature (source dataset `tasmin`).
    Minimum,
    /// Daily maximum surface temperature (source dataset `tasmax`).
    Maximum,
}

impl Variable {
    /// All supported variables, in catalog order.
    pub const ALL: [Variable; 2] = [Variable::Minimum, Variable::Maximum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Minimum => "minimum",
            Variable::Maximum => "maximum",
        }
    }

    /// Column/file naming used by the upstream dataset.
    pub fn dataset_name(&self) -> &'static str {
        match self {
            Variable::Minimum => "tasmin",
            Variable::Maximum => "tasmax",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = ClimError;

    /// Accepts both the public names and the upstream dataset names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimum" | "tasmin" => Ok(Variable::Minimum),
            "maximum" | "tasmax" => Ok(Variable::Maximum),
            other => Err(ClimError::UnknownVariable(other.to_string())),
        }
    }
}

/// A single daily temperature sample at one grid point, in °C.
///
/// Observations are created once at load time and never mutated. Their
/// coordinates are always exact members of the grid axes; there are no
/// off-grid or interpolated samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, latitude: f64, longitude: f64, value: f64) -> Self {
        Self {
            date,
            latitude,
            longitude,
            value,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Calendar month, 1..=12.
    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

/// Index pair addressing one position of the grid axes.
///
/// Cells are the stable addressing scheme exposed to callers; raw coordinate
/// equality across representations is unreliable for floats, indices are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub lat_idx: usize,
    pub lon_idx: usize,
}

impl GridCell {
    pub fn new(lat_idx: usize, lon_idx: usize) -> Self {
        Self { lat_idx, lon_idx }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat_idx, self.lon_idx)
    }
}

/// Engine configuration.
///
/// Serializable so deployments can load it from JSON alongside the data
/// files.
///
/// # Example
///
/// ```rust
/// use climgrid::Config;
/// use std::time::Duration;
///
/// let config = Config::default()
///     .with_cache_ttl(Duration::from_secs(600))
///     .with_lenient_loading(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long a cached query result stays valid, in seconds.
    #[serde(default = "Config::default_cache_ttl_seconds")]
    pub cache_ttl_seconds: f64,

    /// When true, malformed source rows are skipped with a warning instead
    /// of failing the load.
    #[serde(default)]
    pub lenient_loading: bool,

    /// Default per-axis tolerance (in degrees) for locality lookups that do
    /// not supply their own.
    #[serde(default = "Config::default_locality_tolerance")]
    pub locality_tolerance_degrees: f64,
}

impl Config {
    const fn default_cache_ttl_seconds() -> f64 {
        3600.0
    }

    const fn default_locality_tolerance() -> f64 {
        0.5
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_seconds = ttl.as_secs_f64();
        self
    }

    pub fn with_lenient_loading(mut self, lenient: bool) -> Self {
        self.lenient_loading = lenient;
        self
    }

    pub fn with_locality_tolerance(mut self, degrees: f64) -> Self {
        self.locality_tolerance_degrees = degrees;
        self
    }

    /// Cache TTL as a `Duration`. Falls back to the default for values that
    /// would not survive the conversion.
    pub fn cache_ttl(&self) -> Duration {
        let ttl = self.cache_ttl_seconds;
        if ttl.is_finite() && ttl > 0.0 && ttl <= u64::MAX as f64 {
            Duration::from_secs_f64(ttl)
        } else {
            Duration::from_secs_f64(Self::default_cache_ttl_seconds())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cache_ttl_seconds.is_finite() {
            return Err("Cache TTL must be finite (not NaN or infinity)".to_string());
        }
        if self.cache_ttl_seconds <= 0.0 {
            return Err("Cache TTL must be positive".to_string());
        }
        if self.cache_ttl_seconds > u64::MAX as f64 {
            return Err("Cache TTL is too large".to_string());
        }
        if !self.locality_tolerance_degrees.is_finite() || self.locality_tolerance_degrees <= 0.0 {
            return Err("Locality tolerance must be a positive number of degrees".to_string());
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: Self::default_cache_ttl_seconds(),
            lenient_loading: false,
            locality_tolerance_degrees: Self::default_locality_tolerance(),
        }
    }
}
