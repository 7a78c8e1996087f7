//! Feature extraction and encoding
//!
//! Converts raw trips into model-ready feature vectors.

pub mod bucketize;
pub mod engineer;
pub mod vector;

pub use bucketize::{Boundaries, GeoBuckets};
pub use engineer::{engineer, EngineeredFeatures};
pub use vector::{FeatureEncoder, FeatureVariant, FeatureVector, TripSample};
