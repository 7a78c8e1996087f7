//! Serving input receiver
//!
//! Accepts the six raw request fields, scalar or array, and runs them
//! through the same `FeatureEncoder` the batch pipeline uses.

use serde::{Deserialize, Serialize};

use crate::features::{FeatureEncoder, FeatureVector};
use crate::{RawTrip, Result, TaxiFareError};

/// One value or a column of values for a request field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Values<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Copy> Values<T> {
    fn len(&self) -> usize {
        match self {
            Values::One(_) => 1,
            Values::Many(v) => v.len(),
        }
    }

    fn get(&self, i: usize) -> T {
        match self {
            Values::One(v) => *v,
            Values::Many(v) => v[i],
        }
    }
}

/// Raw inference request with the declared input names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingRequest {
    pub dayofweek: Values<i64>,
    pub hourofday: Values<i64>,
    pub pickuplon: Values<f64>,
    pub pickuplat: Values<f64>,
    pub dropofflon: Values<f64>,
    pub dropofflat: Values<f64>,
}

impl ServingRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Single-row request from a trip; the fare is dropped
    pub fn from_trip(trip: &RawTrip) -> Self {
        ServingRequest {
            dayofweek: Values::One(trip.dayofweek),
            hourofday: Values::One(trip.hourofday),
            pickuplon: Values::One(trip.pickuplon),
            pickuplat: Values::One(trip.pickuplat),
            dropofflon: Values::One(trip.dropofflon),
            dropofflat: Values::One(trip.dropofflat),
        }
    }

    /// Number of rows, checking that every field agrees
    pub fn rows(&self) -> Result<usize> {
        let lens = [
            ("dayofweek", self.dayofweek.len()),
            ("hourofday", self.hourofday.len()),
            ("pickuplon", self.pickuplon.len()),
            ("pickuplat", self.pickuplat.len()),
            ("dropofflon", self.dropofflon.len()),
            ("dropofflat", self.dropofflat.len()),
        ];
        let expected = lens[0].1;
        for (field, found) in lens {
            if found != expected {
                return Err(TaxiFareError::ServingShape {
                    field,
                    expected,
                    found,
                });
            }
        }
        Ok(expected)
    }

    /// Unlabeled trips, one per row
    pub fn trips(&self) -> Result<Vec<RawTrip>> {
        let rows = self.rows()?;
        Ok((0..rows)
            .map(|i| {
                RawTrip::unlabeled(
                    self.dayofweek.get(i),
                    self.hourofday.get(i),
                    self.pickuplon.get(i),
                    self.pickuplat.get(i),
                    self.dropofflon.get(i),
                    self.dropofflat.get(i),
                )
            })
            .collect())
    }
}

/// Turns serving requests into model inputs
#[derive(Debug, Clone)]
pub struct ServingReceiver {
    encoder: FeatureEncoder,
}

impl ServingReceiver {
    pub fn new(encoder: FeatureEncoder) -> Self {
        ServingReceiver { encoder }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn receive(&self, request: &ServingRequest) -> Result<Vec<FeatureVector>> {
        Ok(request
            .trips()?
            .iter()
            .map(|trip| self.encoder.encode(trip).features)
            .collect())
    }
}

/// A model that maps one feature vector to a fare
pub trait Regressor {
    fn predict(&self, features: &[f32]) -> f32;
}

impl<F> Regressor for F
where
    F: Fn(&[f32]) -> f32,
{
    fn predict(&self, features: &[f32]) -> f32 {
        self(features)
    }
}

/// Receiver plus model: raw request in, one fare per row out
pub struct Predictor<R: Regressor> {
    receiver: ServingReceiver,
    model: R,
}

impl<R: Regressor> Predictor<R> {
    pub fn new(receiver: ServingReceiver, model: R) -> Self {
        Predictor { receiver, model }
    }

    pub fn predict(&self, request: &ServingRequest) -> Result<Vec<f32>> {
        let vectors = self.receiver.receive(request)?;
        Ok(vectors
            .iter()
            .map(|v| self.model.predict(v.as_slice()))
            .collect())
    }
}
