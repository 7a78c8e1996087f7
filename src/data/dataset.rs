//! Burn Dataset and Batcher for trip samples
//!
//! Materialises a finite source (evaluation files, a held-out set) and
//! turns sample batches into tensors for a training collaborator.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::batch::TripBatch;
use super::source::TripSource;
use crate::features::{FeatureEncoder, TripSample};
use crate::{Result, TaxiFareError};

/// Label statistics for a dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareSummary {
    pub count: usize,
    pub mean: f32,
    pub min: f32,
    pub max: f32,
}

/// In-memory trip samples
#[derive(Debug, Clone)]
pub struct TripDataset {
    samples: Vec<TripSample>,
    width: usize,
}

impl TripDataset {
    /// Encode every record of one pass over the source
    pub fn from_source<S: TripSource>(source: &S, encoder: &FeatureEncoder) -> Result<Self> {
        let mut samples = Vec::new();
        for trip in source.open()? {
            samples.push(encoder.encode(&trip?));
        }

        log::info!(
            "Created dataset with {} samples of width {}",
            samples.len(),
            encoder.width()
        );
        Ok(TripDataset {
            samples,
            width: encoder.width(),
        })
    }

    /// Wrap pre-computed samples; every vector must match the encoder width
    pub fn from_samples(samples: Vec<TripSample>, encoder: &FeatureEncoder) -> Result<Self> {
        for sample in &samples {
            encoder.check_width(&sample.features)?;
        }
        Ok(TripDataset {
            samples,
            width: encoder.width(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split into train/validation at a ratio, keeping order
    pub fn split(self, train_ratio: f32) -> (Self, Self) {
        let split_idx = (self.samples.len() as f32 * train_ratio.clamp(0.0, 1.0)) as usize;
        let mut train_samples = self.samples;
        let val_samples = train_samples.split_off(split_idx);

        (
            TripDataset {
                samples: train_samples,
                width: self.width,
            },
            TripDataset {
                samples: val_samples,
                width: self.width,
            },
        )
    }

    pub fn fare_summary(&self) -> Option<FareSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let labels = self.samples.iter().map(|s| s.label);
        let sum: f32 = labels.clone().sum();
        Some(FareSummary {
            count: self.samples.len(),
            mean: sum / self.samples.len() as f32,
            min: labels.clone().fold(f32::INFINITY, f32::min),
            max: labels.fold(f32::NEG_INFINITY, f32::max),
        })
    }
}

impl Dataset<TripSample> for TripDataset {
    fn get(&self, index: usize) -> Option<TripSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Tensor batch for a training collaborator
#[derive(Debug, Clone)]
pub struct TripTensorBatch<B: Backend> {
    /// Feature vectors: [batch, width]
    pub features: Tensor<B, 2>,
    /// Fare labels: [batch]
    pub labels: Tensor<B, 1>,
}

/// Batcher producing tensors from trip samples
#[derive(Clone)]
pub struct TripTensorBatcher<B: Backend> {
    device: B::Device,
    width: usize,
}

impl<B: Backend> TripTensorBatcher<B> {
    pub fn new(device: B::Device, encoder: &FeatureEncoder) -> Self {
        TripTensorBatcher {
            device,
            width: encoder.width(),
        }
    }

    /// Convert a streamed batch, rejecting vectors of the wrong width
    pub fn from_trip_batch(&self, batch: TripBatch) -> Result<TripTensorBatch<B>> {
        if let Some(bad) = batch.features.iter().find(|f| f.width() != self.width) {
            return Err(TaxiFareError::SchemaMismatch(format!(
                "feature vector has width {}, batcher expects {}",
                bad.width(),
                self.width
            )));
        }
        Ok(self.build(batch.into_samples()))
    }

    fn build(&self, items: Vec<TripSample>) -> TripTensorBatch<B> {
        let batch_size = items.len();

        let mut feature_data = Vec::with_capacity(batch_size * self.width);
        let mut label_data = Vec::with_capacity(batch_size);

        for sample in &items {
            feature_data.extend_from_slice(sample.features.as_slice());
            label_data.push(sample.label);
        }

        let features = Tensor::<B, 1>::from_floats(feature_data.as_slice(), &self.device)
            .reshape([batch_size, self.width]);
        let labels = Tensor::<B, 1>::from_floats(label_data.as_slice(), &self.device);

        TripTensorBatch { features, labels }
    }
}

impl<B: Backend> Batcher<B, TripSample, TripTensorBatch<B>> for TripTensorBatcher<B> {
    fn batch(&self, items: Vec<TripSample>, _device: &B::Device) -> TripTensorBatch<B> {
        self.build(items)
    }
}
