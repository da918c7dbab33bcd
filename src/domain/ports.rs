use crate::domain::model::{AddressBatch, Coordinates, Provider};
use crate::utils::error::Result;
use async_trait::async_trait;

use super::model::BatchSummary;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_file(&self) -> &str;
    fn output_file(&self) -> &str;
    fn address_column(&self) -> &str;
    /// `Some(n)` caps the run at the first n records (test mode).
    fn record_limit(&self) -> Option<usize>;
}

/// A single geocoding backend. `Ok(None)` means the provider answered
/// but found nothing; errors are transport or service failures.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn provider(&self) -> Provider;
    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>>;
}

/// A batch annotated with geocode columns plus its run statistics.
#[derive(Debug, Clone)]
pub struct GeocodedBatch {
    pub batch: AddressBatch,
    pub summary: BatchSummary,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<AddressBatch>;
    async fn transform(&self, batch: AddressBatch) -> Result<GeocodedBatch>;
    async fn load(&self, result: GeocodedBatch) -> Result<String>;
}
