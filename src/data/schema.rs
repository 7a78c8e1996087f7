//! CSV column schema and record parsing
//!
//! Each column has a fixed position and a default that fills in for
//! empty or missing trailing fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{RawTrip, Result, TaxiFareError};

/// A column of the trip CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    FareAmount,
    #[serde(rename = "dayofweek")]
    DayOfWeek,
    #[serde(rename = "hourofday")]
    HourOfDay,
    #[serde(rename = "pickuplon")]
    PickupLon,
    #[serde(rename = "pickuplat")]
    PickupLat,
    #[serde(rename = "dropofflon")]
    DropoffLon,
    #[serde(rename = "dropofflat")]
    DropoffLat,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::FareAmount,
        Column::DayOfWeek,
        Column::HourOfDay,
        Column::PickupLon,
        Column::PickupLat,
        Column::DropoffLon,
        Column::DropoffLat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::FareAmount => "fare_amount",
            Column::DayOfWeek => "dayofweek",
            Column::HourOfDay => "hourofday",
            Column::PickupLon => "pickuplon",
            Column::PickupLat => "pickuplat",
            Column::DropoffLon => "dropofflon",
            Column::DropoffLat => "dropofflat",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::DayOfWeek | Column::HourOfDay => ColumnKind::Int,
            _ => ColumnKind::Float,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
}

/// Position and default value of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub column: Column,
    pub position: usize,
    pub default: f64,
}

/// Fixed schema of the trip CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSchema>,
}

/// Defaults for `Column::ALL`, in order
const BUILTIN_DEFAULTS: [f64; 7] = [0.0, 1.0, 0.0, -74.0, 40.0, -74.0, 40.7];

impl Default for Schema {
    fn default() -> Self {
        Schema {
            columns: Column::ALL
                .iter()
                .zip(BUILTIN_DEFAULTS)
                .enumerate()
                .map(|(position, (&column, default))| ColumnSchema {
                    column,
                    position,
                    default,
                })
                .collect(),
        }
    }
}

impl Schema {
    /// Check that every column appears once at a distinct position
    pub fn validate(&self) -> Result<()> {
        for column in Column::ALL {
            let count = self.columns.iter().filter(|c| c.column == column).count();
            if count != 1 {
                return Err(TaxiFareError::SchemaMismatch(format!(
                    "column {} declared {} times",
                    column, count
                )));
            }
        }
        if self.columns.len() != Column::ALL.len() {
            return Err(TaxiFareError::SchemaMismatch(format!(
                "expected {} columns, found {}",
                Column::ALL.len(),
                self.columns.len()
            )));
        }

        let mut positions: Vec<usize> = self.columns.iter().map(|c| c.position).collect();
        positions.sort_unstable();
        positions.dedup();
        if positions.len() != self.columns.len() {
            return Err(TaxiFareError::SchemaMismatch(
                "column positions must be unique".to_string(),
            ));
        }

        for c in &self.columns {
            if c.column.kind() == ColumnKind::Int && c.default.fract() != 0.0 {
                return Err(TaxiFareError::SchemaMismatch(format!(
                    "integer column {} has non-integral default {}",
                    c.column, c.default
                )));
            }
        }
        Ok(())
    }

    /// Column names in positional order, as they appear in a header line
    pub fn header(&self) -> Vec<&'static str> {
        let mut columns: Vec<&ColumnSchema> = self.columns.iter().collect();
        columns.sort_by_key(|c| c.position);
        columns.iter().map(|c| c.column.name()).collect()
    }

    /// Parse a single delimited line
    pub fn parse_line(&self, line: &str, line_number: u64) -> Result<RawTrip> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
        self.parse_fields(&fields, line_number)
    }

    /// A trip holding every column's declared default
    pub fn default_trip(&self) -> RawTrip {
        let mut trip = RawTrip {
            fare_amount: BUILTIN_DEFAULTS[0],
            dayofweek: BUILTIN_DEFAULTS[1] as i64,
            hourofday: BUILTIN_DEFAULTS[2] as i64,
            pickuplon: BUILTIN_DEFAULTS[3],
            pickuplat: BUILTIN_DEFAULTS[4],
            dropofflon: BUILTIN_DEFAULTS[5],
            dropofflat: BUILTIN_DEFAULTS[6],
        };
        for c in &self.columns {
            match c.column {
                Column::FareAmount => trip.fare_amount = c.default,
                Column::DayOfWeek => trip.dayofweek = c.default as i64,
                Column::HourOfDay => trip.hourofday = c.default as i64,
                Column::PickupLon => trip.pickuplon = c.default,
                Column::PickupLat => trip.pickuplat = c.default,
                Column::DropoffLon => trip.dropofflon = c.default,
                Column::DropoffLat => trip.dropofflat = c.default,
            }
        }
        trip
    }

    /// Parse already-split fields; short records fall back to defaults
    pub fn parse_fields<S: AsRef<str>>(&self, fields: &[S], line_number: u64) -> Result<RawTrip> {
        let mut trip = self.default_trip();

        for c in &self.columns {
            let Some(raw) = fields
                .get(c.position)
                .map(|f| f.as_ref().trim())
                .filter(|f| !f.is_empty())
            else {
                continue;
            };

            let malformed = || TaxiFareError::MalformedRecord {
                line: line_number,
                column: c.column.name().to_string(),
                value: raw.to_string(),
            };
            let int = || raw.parse::<i64>().map_err(|_| malformed());
            let float = || raw.parse::<f64>().map_err(|_| malformed());

            match c.column {
                Column::FareAmount => trip.fare_amount = float()?,
                Column::DayOfWeek => trip.dayofweek = int()?,
                Column::HourOfDay => trip.hourofday = int()?,
                Column::PickupLon => trip.pickuplon = float()?,
                Column::PickupLat => trip.pickuplat = float()?,
                Column::DropoffLon => trip.dropofflon = float()?,
                Column::DropoffLat => trip.dropofflat = float()?,
            }
        }

        Ok(trip)
    }
}
