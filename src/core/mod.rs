pub mod cache;
pub mod chain;
pub mod engine;
pub mod pipeline;

pub use crate::domain::model::{AddressBatch, BatchSummary, GeocodeResult};
pub use crate::domain::ports::{ConfigProvider, Geocoder, GeocodedBatch, Pipeline, Storage};
pub use crate::utils::error::Result;
