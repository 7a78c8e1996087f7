//! Derived trip features
//!
//! The single implementation used by training, evaluation and serving.

use crate::RawTrip;

/// Engineered features for one trip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeredFeatures {
    /// Day of week shifted to 0-6
    pub dayofweek: i64,
    pub hourofday: i64,
    pub pickuplon: f64,
    pub pickuplat: f64,
    pub dropofflon: f64,
    pub dropofflat: f64,
    /// pickuplat - dropofflat
    pub latdiff: f64,
    /// pickuplon - dropofflon
    pub londiff: f64,
    /// Straight-line distance in degrees, not haversine
    pub euclidean_dist: f64,
}

impl EngineeredFeatures {
    /// Number of scalar fields
    pub const DIM: usize = 9;

    /// Derive features from a trip, leaving the fare aside
    pub fn from_trip(trip: &RawTrip) -> Self {
        let latdiff = trip.pickuplat - trip.dropofflat;
        let londiff = trip.pickuplon - trip.dropofflon;

        EngineeredFeatures {
            dayofweek: trip.dayofweek.saturating_sub(1),
            hourofday: trip.hourofday,
            pickuplon: trip.pickuplon,
            pickuplat: trip.pickuplat,
            dropofflon: trip.dropofflon,
            dropofflat: trip.dropofflat,
            latdiff,
            londiff,
            euclidean_dist: (latdiff * latdiff + londiff * londiff).sqrt(),
        }
    }

    /// Named values in declaration order
    pub fn named(&self) -> [(&'static str, f64); Self::DIM] {
        [
            ("dayofweek", self.dayofweek as f64),
            ("hourofday", self.hourofday as f64),
            ("pickuplon", self.pickuplon),
            ("pickuplat", self.pickuplat),
            ("dropofflon", self.dropofflon),
            ("dropofflat", self.dropofflat),
            ("latdiff", self.latdiff),
            ("londiff", self.londiff),
            ("euclidean_dist", self.euclidean_dist),
        ]
    }
}

/// Split a trip into its engineered features and the fare label
pub fn engineer(trip: &RawTrip) -> (EngineeredFeatures, f32) {
    (EngineeredFeatures::from_trip(trip), trip.fare_amount as f32)
}
