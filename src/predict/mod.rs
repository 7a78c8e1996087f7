//! Prediction and serving
//!
//! Serving-time feature construction and the model seam.

pub mod serving;

pub use serving::{Predictor, Regressor, ServingReceiver, ServingRequest};
