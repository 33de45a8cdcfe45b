//! Engine builder for flexible data sources and configuration.
//!
//! Observation sets can come from CSV files (the shape produced by the
//! upstream converter) or be handed over pre-parsed; the two can be mixed
//! per variable. Loading happens once, in `build()`, and a malformed source
//! fails construction rather than producing a partially-loaded engine.

use crate::engine::ClimateEngine;
use crate::error::Result;
use crate::store::{self, RecordStore};
use crate::types::{Config, Observation, Variable};
use std::path::PathBuf;

/// Builder for [`ClimateEngine`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: Config,
    minimum_path: Option<PathBuf>,
    maximum_path: Option<PathBuf>,
    minimum_rows: Option<Vec<Observation>>,
    maximum_rows: Option<Vec<Observation>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine configuration (cache TTL, loading mode, tolerance).
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// CSV source file for one variable. Replaces any in-memory rows set
    /// earlier for that variable.
    pub fn csv_path<P: Into<PathBuf>>(mut self, variable: Variable, path: P) -> Self {
        match variable {
            Variable::Minimum => {
                self.minimum_path = Some(path.into());
                self.minimum_rows = None;
            }
            Variable::Maximum => {
                self.maximum_path = Some(path.into());
                self.maximum_rows = None;
            }
        }
        self
    }

    /// Pre-parsed observations for one variable. Replaces any CSV path set
    /// earlier for that variable.
    pub fn observations(mut self, variable: Variable, rows: Vec<Observation>) -> Self {
        match variable {
            Variable::Minimum => {
                self.minimum_rows = Some(rows);
                self.minimum_path = None;
            }
            Variable::Maximum => {
                self.maximum_rows = Some(rows);
                self.maximum_path = None;
            }
        }
        self
    }

    /// Load all sources and construct the engine.
    pub fn build(self) -> Result<ClimateEngine> {
        let lenient = self.config.lenient_loading;

        let minimum = Self::load(self.minimum_path, self.minimum_rows, Variable::Minimum, lenient)?;
        let maximum = Self::load(self.maximum_path, self.maximum_rows, Variable::Maximum, lenient)?;

        let store = RecordStore::from_observations(minimum, maximum);
        ClimateEngine::new(store, self.config)
    }

    fn load(
        path: Option<PathBuf>,
        rows: Option<Vec<Observation>>,
        variable: Variable,
        lenient: bool,
    ) -> Result<Vec<Observation>> {
        if let Some(path) = path {
            return store::load_csv_path(variable, path, lenient);
        }
        Ok(rows.unwrap_or_default())
    }
}
