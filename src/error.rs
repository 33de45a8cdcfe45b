//! Error types for climgrid.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClimError>;

/// Errors surfaced by the engine.
///
/// Parameter errors carry enough context (which parameter, what constraint)
/// for the caller to correct the request. A filter that matches zero
/// observations is not an error; it produces a valid result with
/// `data_points_used == 0`.
#[derive(Error, Debug)]
pub enum ClimError {
    /// The requested climate variable does not exist.
    #[error("unknown variable '{0}', expected 'minimum' or 'maximum'")]
    UnknownVariable(String),

    /// `start_year` must be less than or equal to `end_year`.
    #[error("invalid year range: start_year {start} must be <= end_year {end}")]
    InvalidYearRange { start: i32, end: i32 },

    /// Months are numbered 1 through 12.
    #[error("invalid month {0}, expected a value in 1..=12")]
    InvalidMonth(u32),

    /// A grid cell index pair fell outside the loaded grid axes.
    #[error("grid cell ({lat_idx}, {lon_idx}) out of bounds for a {lat_count}x{lon_count} grid")]
    CellOutOfBounds {
        lat_idx: usize,
        lon_idx: usize,
        lat_count: usize,
        lon_count: usize,
    },

    /// The grid axes cannot be derived because no observations are loaded.
    /// Fatal at startup: the engine refuses to serve queries in this state.
    #[error("grid index not ready: no observations loaded for the reference variable")]
    GridNotReady,

    /// A source row could not be parsed during strict loading.
    #[error("load failure at line {line}: {reason}")]
    LoadFailure { line: usize, reason: String },

    /// Configuration rejected by [`Config::validate`](crate::Config::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
