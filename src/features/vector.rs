//! Fixed-order feature vector assembly
//!
//! `FeatureEncoder` is shared by the batch pipeline and the serving
//! receiver, so both always produce the same width and field order.

use serde::{Deserialize, Serialize};

use super::bucketize::{self, GeoBuckets, DAY_HOUR_BUCKETS};
use super::engineer::{engineer, EngineeredFeatures};
use crate::{FeatureConfig, RawTrip, Result, TaxiFareError};

/// Which feature layout to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureVariant {
    /// Day, hour and the four raw coordinates
    Simple,
    /// Day x hour cross, bucketized coordinates and distance features
    Bucketized,
}

impl FeatureVariant {
    pub const SIMPLE_DIM: usize = 6;
    /// 168 cross + 4 x 17 coordinate buckets + 3 numeric, with the default box
    pub const BUCKETIZED_DIM: usize = 239;
}

impl std::str::FromStr for FeatureVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(FeatureVariant::Simple),
            "bucketized" => Ok(FeatureVariant::Bucketized),
            _ => Err(format!("Unknown feature variant: {}. Use simple or bucketized.", s)),
        }
    }
}

/// Positional model input; carries no names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector(pub Vec<f32>);

impl FeatureVector {
    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// One labeled example ready for batching
#[derive(Debug, Clone, PartialEq)]
pub struct TripSample {
    pub features: FeatureVector,
    /// Fare amount
    pub label: f32,
}

/// Turns raw trips into feature vectors of a fixed layout
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    variant: FeatureVariant,
    geo: GeoBuckets,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(&FeatureConfig::default())
    }
}

impl FeatureEncoder {
    pub fn new(config: &FeatureConfig) -> Self {
        FeatureEncoder {
            variant: config.variant,
            geo: GeoBuckets::from_config(config),
        }
    }

    pub fn variant(&self) -> FeatureVariant {
        self.variant
    }

    /// Width of every vector this encoder produces
    pub fn width(&self) -> usize {
        match self.variant {
            FeatureVariant::Simple => FeatureVariant::SIMPLE_DIM,
            FeatureVariant::Bucketized => DAY_HOUR_BUCKETS + self.geo.width() + 3,
        }
    }

    /// Encode a trip into its feature vector and fare label
    pub fn encode(&self, trip: &RawTrip) -> TripSample {
        let (features, label) = engineer(trip);
        TripSample {
            features: self.assemble(&features),
            label,
        }
    }

    /// Lay engineered features out in the declared order
    pub fn assemble(&self, f: &EngineeredFeatures) -> FeatureVector {
        let mut out = Vec::with_capacity(self.width());

        match self.variant {
            FeatureVariant::Simple => {
                out.extend([
                    f.dayofweek as f32,
                    f.hourofday as f32,
                    f.pickuplon as f32,
                    f.pickuplat as f32,
                    f.dropofflon as f32,
                    f.dropofflat as f32,
                ]);
            }
            FeatureVariant::Bucketized => {
                bucketize::day_hour_cross_into(f.dayofweek, f.hourofday, &mut out);
                self.geo.lon.one_hot_into(f.pickuplon, &mut out);
                self.geo.lat.one_hot_into(f.pickuplat, &mut out);
                self.geo.lon.one_hot_into(f.dropofflon, &mut out);
                self.geo.lat.one_hot_into(f.dropofflat, &mut out);
                out.extend([f.latdiff as f32, f.londiff as f32, f.euclidean_dist as f32]);
            }
        }

        debug_assert_eq!(out.len(), self.width());
        FeatureVector(out)
    }

    /// Fail if a vector did not come from an encoder of this layout
    pub fn check_width(&self, vector: &FeatureVector) -> Result<()> {
        if vector.width() != self.width() {
            return Err(TaxiFareError::SchemaMismatch(format!(
                "feature vector has width {}, encoder produces {}",
                vector.width(),
                self.width()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trip() -> RawTrip {
        RawTrip {
            fare_amount: 10.0,
            dayofweek: 3,
            hourofday: 14,
            pickuplon: -73.99,
            pickuplat: 40.75,
            dropofflon: -73.98,
            dropofflat: 40.73,
        }
    }

    fn encoder(variant: FeatureVariant) -> FeatureEncoder {
        FeatureEncoder::new(&FeatureConfig {
            variant,
            ..FeatureConfig::default()
        })
    }

    #[test]
    fn test_simple_layout() {
        let sample = encoder(FeatureVariant::Simple).encode(&sample_trip());

        assert_eq!(sample.label, 10.0);
        assert_eq!(sample.features.width(), FeatureVariant::SIMPLE_DIM);
        assert_eq!(
            sample.features.as_slice(),
            &[2.0, 14.0, -73.99f32, 40.75f32, -73.98f32, 40.73f32]
        );
    }

    #[test]
    fn test_bucketized_width() {
        let enc = encoder(FeatureVariant::Bucketized);
        assert_eq!(enc.width(), FeatureVariant::BUCKETIZED_DIM);
        assert_eq!(enc.encode(&sample_trip()).features.width(), 239);
    }

    #[test]
    fn test_bucketized_layout() {
        let enc = encoder(FeatureVariant::Bucketized);
        let geo = GeoBuckets::default();
        let v = enc.encode(&sample_trip()).features;
        let v = v.as_slice();

        // Cross block: day 2, hour 14
        assert_eq!(v[..168].iter().sum::<f32>(), 1.0);
        assert_eq!(v[2 * 24 + 14], 1.0);

        // Four 17-wide coordinate blocks, one hot each
        let blocks = [
            (168, geo.lon.bucket(-73.99)),
            (185, geo.lat.bucket(40.75)),
            (202, geo.lon.bucket(-73.98)),
            (219, geo.lat.bucket(40.73)),
        ];
        for (start, bucket) in blocks {
            let block = &v[start..start + 17];
            assert_eq!(block.iter().sum::<f32>(), 1.0);
            assert_eq!(block[bucket], 1.0);
        }

        // Trailing numeric features
        assert!((v[236] - 0.02).abs() < 1e-5);
        assert!((v[237] + 0.01).abs() < 1e-5);
        assert!((v[238] - 0.022_360_68).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_box_coordinates_clamped() {
        let enc = encoder(FeatureVariant::Bucketized);
        let trip = RawTrip::unlabeled(1, 0, -80.0, 30.0, -60.0, 50.0);
        let v = enc.encode(&trip).features;
        let v = v.as_slice();

        assert_eq!(v[168], 1.0); // pickuplon below box
        assert_eq!(v[185], 1.0); // pickuplat below box
        assert_eq!(v[202 + 16], 1.0); // dropofflon above box
        assert_eq!(v[219 + 16], 1.0); // dropofflat above box
    }

    #[test]
    fn test_encode_deterministic() {
        let enc = encoder(FeatureVariant::Bucketized);
        let a = enc.encode(&sample_trip());
        let b = enc.encode(&sample_trip());
        assert_eq!(a, b);
    }

    #[test]
    fn test_check_width() {
        let simple = encoder(FeatureVariant::Simple);
        let bucketized = encoder(FeatureVariant::Bucketized);
        let v = simple.encode(&sample_trip()).features;

        assert!(simple.check_width(&v).is_ok());
        assert!(matches!(
            bucketized.check_width(&v),
            Err(TaxiFareError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("Simple".parse::<FeatureVariant>(), Ok(FeatureVariant::Simple));
        assert_eq!("bucketized".parse::<FeatureVariant>(), Ok(FeatureVariant::Bucketized));
        assert!("wide".parse::<FeatureVariant>().is_err());
    }
}
