//! Data ingestion and batching
//!
//! CSV schema and sources, the batch assembler and the burn dataset types.

pub mod batch;
pub mod dataset;
pub mod schema;
pub mod source;

pub use batch::{BatchAssembler, BatchStream, Mode, TripBatch};
pub use dataset::{TripDataset, TripTensorBatch, TripTensorBatcher};
pub use schema::Schema;
pub use source::{CsvSource, MemorySource, TripSource};
