//! Taxi fare feature pipeline
//!
//! Turns raw trip records into fixed-width feature vectors and fare labels,
//! batches them for a training collaborator and applies the same encoding
//! to serving requests.

pub mod data;
pub mod features;
pub mod predict;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::data::schema::Schema;
use crate::features::FeatureVariant;

/// A single raw trip parsed from one CSV line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTrip {
    pub fare_amount: f64,
    /// Day of week, 1 = first day
    pub dayofweek: i64,
    /// Hour of day, 0-23
    pub hourofday: i64,
    pub pickuplon: f64,
    pub pickuplat: f64,
    pub dropofflon: f64,
    pub dropofflat: f64,
}

impl RawTrip {
    /// Build a trip from request fields only; the fare is unknown at serving time
    pub fn unlabeled(
        dayofweek: i64,
        hourofday: i64,
        pickuplon: f64,
        pickuplat: f64,
        dropofflon: f64,
        dropofflat: f64,
    ) -> Self {
        RawTrip {
            fare_amount: 0.0,
            dayofweek,
            hourofday,
            pickuplon,
            pickuplat,
            dropofflon,
            dropofflat,
        }
    }
}

impl fmt::Display for RawTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:.2} day={} hour={} ({:.4}, {:.4}) -> ({:.4}, {:.4})",
            self.fare_amount,
            self.dayofweek,
            self.hourofday,
            self.pickuplon,
            self.pickuplat,
            self.dropofflon,
            self.dropofflat
        )
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TaxiFareError {
    #[error("Malformed record at line {line}: column {column} has value {value:?}")]
    MalformedRecord {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Serving input {field} has {found} values, expected {expected}")]
    ServingShape {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("No input files match pattern {0}")]
    NoInputFiles(String),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("File pattern error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaxiFareError>;

/// Pipeline configuration loaded from config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema: Schema,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub batching: BatchConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Feature vector layout and the bucketization bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub variant: FeatureVariant,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    /// Boundaries per lat/lon field; each field gets one more bucket than this
    pub num_boundaries: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            variant: FeatureVariant::Bucketized,
            lat_min: 38.0,
            lat_max: 42.0,
            lon_min: -76.0,
            lon_max: -72.0,
            num_boundaries: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Reservoir size for train-mode shuffling
    pub shuffle_buffer: usize,
    pub seed: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            batch_size: 512,
            shuffle_buffer: 1000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub train_pattern: String,
    pub eval_pattern: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            train_pattern: "data/taxi-train*.csv".to_string(),
            eval_pattern: "data/taxi-valid*.csv".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaxiFareError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TaxiFareError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TaxiFareError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot be built from
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        let f = &self.features;
        if f.num_boundaries < 2 {
            return Err(TaxiFareError::Config(format!(
                "num_boundaries must be at least 2, got {}",
                f.num_boundaries
            )));
        }
        if !(f.lat_min < f.lat_max) || !(f.lon_min < f.lon_max) {
            return Err(TaxiFareError::Config(
                "bounding box minimums must be below maximums".to_string(),
            ));
        }
        if self.batching.batch_size == 0 {
            return Err(TaxiFareError::Config("batch_size must be positive".to_string()));
        }
        if self.batching.shuffle_buffer == 0 {
            return Err(TaxiFareError::Config("shuffle_buffer must be positive".to_string()));
        }
        Ok(())
    }
}
