//! Batch assembly over a trip source
//!
//! Train mode shuffles through a bounded reservoir and cycles the source
//! forever; the consumer decides when to stop. Eval mode makes one ordered
//! pass and ends, with a possibly short final batch.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::source::TripSource;
use crate::features::{FeatureEncoder, FeatureVector, TripSample};
use crate::{BatchConfig, Result, TaxiFareError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// A batch of feature vectors and their fare labels
#[derive(Debug, Clone, PartialEq)]
pub struct TripBatch {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<f32>,
}

impl TripBatch {
    fn with_capacity(n: usize) -> Self {
        TripBatch {
            features: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, sample: TripSample) {
        self.features.push(sample.features);
        self.labels.push(sample.label);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Back into individual samples
    pub fn into_samples(self) -> Vec<TripSample> {
        self.features
            .into_iter()
            .zip(self.labels)
            .map(|(features, label)| TripSample { features, label })
            .collect()
    }
}

/// Builds batch streams from a source and an encoder
pub struct BatchAssembler<S: TripSource> {
    source: S,
    encoder: FeatureEncoder,
    config: BatchConfig,
    mode: Mode,
}

impl<S: TripSource> BatchAssembler<S> {
    /// Fails when the batch size is zero
    pub fn new(
        source: S,
        encoder: FeatureEncoder,
        config: BatchConfig,
        mode: Mode,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(TaxiFareError::Config("batch_size must be positive".to_string()));
        }
        Ok(BatchAssembler {
            source,
            encoder,
            config,
            mode,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// A fresh lazy stream; nothing is read until the first pull
    pub fn stream(&self) -> BatchStream<'_, S> {
        BatchStream {
            assembler: self,
            state: StreamState::Idle,
            reservoir: Vec::new(),
            rng: StdRng::seed_from_u64(self.config.seed),
            pass: 0,
            pass_records: 0,
            pending_error: None,
        }
    }
}

enum StreamState<R> {
    Idle,
    Streaming(R),
    Exhausted,
}

/// Lazy sequence of batches
pub struct BatchStream<'a, S: TripSource> {
    assembler: &'a BatchAssembler<S>,
    state: StreamState<S::Records>,
    /// Train-mode shuffle buffer
    reservoir: Vec<TripSample>,
    rng: StdRng,
    pass: usize,
    pass_records: usize,
    /// Record error held back until the partial batch before it is delivered
    pending_error: Option<TaxiFareError>,
}

impl<S: TripSource> BatchStream<'_, S> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, StreamState::Exhausted)
    }

    /// Number of passes started over the source
    pub fn passes(&self) -> usize {
        self.pass
    }

    fn start_pass(&mut self) -> Result<()> {
        match self.assembler.source.open() {
            Ok(records) => {
                self.pass += 1;
                self.pass_records = 0;
                log::debug!("Starting pass {} over source", self.pass);
                self.state = StreamState::Streaming(records);
                Ok(())
            }
            Err(e) => {
                self.state = StreamState::Exhausted;
                Err(e)
            }
        }
    }

    /// Next encoded sample, reopening the source at the end of a train pass
    fn next_sample(&mut self) -> Option<Result<TripSample>> {
        loop {
            match &mut self.state {
                StreamState::Idle => {
                    if let Err(e) = self.start_pass() {
                        return Some(Err(e));
                    }
                }
                StreamState::Streaming(records) => match records.next() {
                    Some(Ok(trip)) => {
                        self.pass_records += 1;
                        return Some(Ok(self.assembler.encoder.encode(&trip)));
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        let cycle = self.assembler.mode == Mode::Train && self.pass_records > 0;
                        if cycle {
                            if let Err(e) = self.start_pass() {
                                return Some(Err(e));
                            }
                        } else {
                            log::info!(
                                "Source exhausted after {} pass(es), {} records in last pass",
                                self.pass,
                                self.pass_records
                            );
                            self.state = StreamState::Exhausted;
                        }
                    }
                },
                StreamState::Exhausted => return None,
            }
        }
    }

    /// Deliver what was gathered before a record error; the error follows on the next pull
    fn fail(&mut self, batch: TripBatch, err: TaxiFareError) -> Option<Result<TripBatch>> {
        if batch.is_empty() {
            Some(Err(err))
        } else {
            self.pending_error = Some(err);
            Some(Ok(batch))
        }
    }

    fn next_eval(&mut self) -> Option<Result<TripBatch>> {
        let batch_size = self.assembler.config.batch_size;
        let mut batch = TripBatch::with_capacity(batch_size);

        while batch.len() < batch_size {
            match self.next_sample() {
                Some(Ok(sample)) => batch.push(sample),
                Some(Err(e)) => return self.fail(batch, e),
                None => break,
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }

    fn next_train(&mut self) -> Option<Result<TripBatch>> {
        let batch_size = self.assembler.config.batch_size;
        let capacity = self.assembler.config.shuffle_buffer.max(1);
        let mut batch = TripBatch::with_capacity(batch_size);

        while batch.len() < batch_size {
            while self.reservoir.len() < capacity && !self.is_exhausted() {
                match self.next_sample() {
                    Some(Ok(sample)) => self.reservoir.push(sample),
                    Some(Err(e)) => return self.fail(batch, e),
                    None => break,
                }
            }

            if self.reservoir.is_empty() {
                break;
            }
            let idx = self.rng.gen_range(0..self.reservoir.len());
            batch.push(self.reservoir.swap_remove(idx));
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

impl<S: TripSource> Iterator for BatchStream<'_, S> {
    type Item = Result<TripBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }
        match self.assembler.mode {
            Mode::Train => self.next_train(),
            Mode::Eval => self.next_eval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::MemorySource;
    use crate::features::FeatureVariant;
    use crate::{FeatureConfig, RawTrip};

    fn trips(n: usize) -> Vec<RawTrip> {
        (0..n)
            .map(|i| RawTrip {
                fare_amount: i as f64,
                dayofweek: (i % 7) as i64 + 1,
                hourofday: (i % 24) as i64,
                pickuplon: -73.99,
                pickuplat: 40.75,
                dropofflon: -73.98,
                dropofflat: 40.73,
            })
            .collect()
    }

    fn assembler(n: usize, batch_size: usize, mode: Mode) -> BatchAssembler<MemorySource> {
        let encoder = FeatureEncoder::new(&FeatureConfig {
            variant: FeatureVariant::Simple,
            ..FeatureConfig::default()
        });
        let config = BatchConfig {
            batch_size,
            ..BatchConfig::default()
        };
        BatchAssembler::new(MemorySource::new(trips(n)), encoder, config, mode).unwrap()
    }

    #[test]
    fn test_eval_batch_sizes() {
        let assembler = assembler(5, 2, Mode::Eval);
        let sizes: Vec<usize> = assembler.stream().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_eval_preserves_order() {
        let assembler = assembler(5, 2, Mode::Eval);
        let labels: Vec<f32> = assembler
            .stream()
            .flat_map(|b| b.unwrap().labels)
            .collect();
        assert_eq!(labels, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_eval_stays_exhausted() {
        let assembler = assembler(3, 2, Mode::Eval);
        let mut stream = assembler.stream();
        assert!(stream.next().is_some());
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.is_exhausted());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(stream.passes(), 1);
    }

    #[test]
    fn test_stream_is_lazy_and_restartable() {
        let assembler = assembler(4, 4, Mode::Eval);
        let stream = assembler.stream();
        assert_eq!(stream.passes(), 0);

        let first: Vec<TripBatch> = assembler.stream().map(|b| b.unwrap()).collect();
        let second: Vec<TripBatch> = assembler.stream().map(|b| b.unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_train_cycles_forever() {
        let assembler = assembler(5, 2, Mode::Train);
        let mut stream = assembler.stream();

        for _ in 0..50 {
            let batch = stream.next().unwrap().unwrap();
            assert_eq!(batch.len(), 2);
        }
        assert!(!stream.is_exhausted());
        assert!(stream.passes() >= 20);
    }

    #[test]
    fn test_train_single_slot_buffer_keeps_order() {
        let mut assembler = assembler(5, 7, Mode::Train);
        assembler.config.shuffle_buffer = 1;
        let batch = assembler.stream().next().unwrap().unwrap();
        assert_eq!(batch.labels, vec![0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn test_train_batch_labels_come_from_source() {
        let assembler = assembler(10, 64, Mode::Train);
        let mut stream = assembler.stream();
        for _ in 0..5 {
            let batch = stream.next().unwrap().unwrap();
            assert!(batch.labels.iter().all(|&l| (0.0..10.0).contains(&l) && l.fract() == 0.0));
        }
    }

    #[test]
    fn test_train_shuffles() {
        let assembler = assembler(200, 200, Mode::Train);
        let batch = assembler.stream().next().unwrap().unwrap();
        let ordered: Vec<f32> = (0..200).map(|i| i as f32).collect();
        assert_ne!(batch.labels, ordered);
    }

    #[test]
    fn test_train_seeded_reproducible() {
        let assembler = assembler(50, 8, Mode::Train);
        let a: Vec<TripBatch> = assembler.stream().take(10).map(|b| b.unwrap()).collect();
        let b: Vec<TripBatch> = assembler.stream().take(10).map(|b| b.unwrap()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_train_empty_source_ends() {
        let assembler = assembler(0, 4, Mode::Train);
        let mut stream = assembler.stream();
        assert!(stream.next().is_none());
        assert!(stream.is_exhausted());
    }

    #[test]
    fn test_batch_into_samples() {
        let assembler = assembler(3, 3, Mode::Eval);
        let batch = assembler.stream().next().unwrap().unwrap();
        let samples = batch.into_samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].label, 1.0);
        assert_eq!(samples[1].features.width(), 6);
    }

    /// Yields the given fares, with a malformed record wherever the fare is None
    struct FlakySource(Vec<Option<f64>>);

    impl TripSource for FlakySource {
        type Records = std::vec::IntoIter<Result<RawTrip>>;

        fn open(&self) -> Result<Self::Records> {
            let records: Vec<Result<RawTrip>> = self
                .0
                .iter()
                .enumerate()
                .map(|(i, fare)| match fare {
                    Some(fare) => Ok(RawTrip {
                        fare_amount: *fare,
                        ..RawTrip::unlabeled(1, 1, -73.9, 40.7, -73.9, 40.7)
                    }),
                    None => Err(TaxiFareError::MalformedRecord {
                        line: i as u64 + 2,
                        column: "fare_amount".to_string(),
                        value: "x".to_string(),
                    }),
                })
                .collect();
            Ok(records.into_iter())
        }
    }

    fn flaky(
        fares: Vec<Option<f64>>,
        batch_size: usize,
        shuffle_buffer: usize,
        mode: Mode,
    ) -> BatchAssembler<FlakySource> {
        let config = BatchConfig {
            batch_size,
            shuffle_buffer,
            ..BatchConfig::default()
        };
        BatchAssembler::new(FlakySource(fares), FeatureEncoder::default(), config, mode).unwrap()
    }

    #[test]
    fn test_record_error_surfaces() {
        let assembler = flaky(vec![Some(1.0), None], 4, 1, Mode::Eval);
        let mut stream = assembler.stream();

        assert_eq!(stream.next().unwrap().unwrap().labels, vec![1.0]);
        assert!(matches!(
            stream.next(),
            Some(Err(TaxiFareError::MalformedRecord { line: 3, .. }))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_eval_keeps_records_around_an_error() {
        let fares = vec![Some(0.0), Some(1.0), None, Some(3.0), Some(4.0)];
        let assembler = flaky(fares, 4, 1, Mode::Eval);

        let mut labels = Vec::new();
        let mut errors = 0;
        for batch in assembler.stream() {
            match batch {
                Ok(batch) => labels.extend(batch.labels),
                Err(_) => errors += 1,
            }
        }
        assert_eq!(labels, vec![0.0, 1.0, 3.0, 4.0]);
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_train_keeps_records_around_an_error() {
        let assembler = flaky(vec![Some(0.0), Some(1.0), None, Some(3.0)], 3, 1, Mode::Train);
        let mut stream = assembler.stream();

        assert_eq!(stream.next().unwrap().unwrap().labels, vec![0.0, 1.0]);
        assert!(stream.next().unwrap().is_err());
        // The stream carries on past the bad record and into the next pass
        assert_eq!(stream.next().unwrap().unwrap().labels, vec![3.0, 0.0, 1.0]);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let config = BatchConfig {
            batch_size: 0,
            ..BatchConfig::default()
        };
        let result = BatchAssembler::new(
            MemorySource::new(trips(3)),
            FeatureEncoder::default(),
            config,
            Mode::Train,
        );
        assert!(matches!(result, Err(TaxiFareError::Config(_))));
    }
}
