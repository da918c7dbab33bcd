use crate::core::cache::GeocodeCache;
use crate::core::chain::FallbackChain;
use crate::domain::model::{AddressBatch, BatchSummary, GeocodeResult, GeocodeStatus};
use crate::domain::ports::{ConfigProvider, GeocodedBatch, Pipeline, Storage};
use crate::utils::error::{GeocodeError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

pub fn parse_csv(data: &[u8]) -> Result<AddressBatch> {
    let mut reader = csv::Reader::from_reader(data);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(AddressBatch { headers, rows })
}

pub fn write_csv(batch: &AddressBatch) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&batch.headers)?;
    for row in &batch.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| GeocodeError::ProcessingError {
            message: format!("CSV writer error: {}", e),
        })
}

pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{prefix} {bar:40.cyan/blue} {pos}/{len} ({eta})").unwrap(),
    );
    pb.set_prefix("Geocoding");
    pb
}

/// Extract the address CSV, run every row through the fallback chain
/// (consulting the cache first), and load the annotated CSV back out.
pub struct GeocodePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    chain: FallbackChain,
    cache: Mutex<GeocodeCache>,
}

impl<S: Storage, C: ConfigProvider> GeocodePipeline<S, C> {
    pub fn new(storage: S, config: C, chain: FallbackChain, cache: GeocodeCache) -> Self {
        Self {
            storage,
            config,
            chain,
            cache: Mutex::new(cache),
        }
    }

    async fn resolve_one(&self, address: &str, summary: &mut BatchSummary) -> GeocodeResult {
        if address.is_empty() {
            return GeocodeResult::unresolved(GeocodeStatus::NoAddress);
        }

        if let Some(hit) = self.cache.lock().await.get(address) {
            summary.cache_hits += 1;
            return hit;
        }

        let result = self.chain.resolve(address).await;
        self.cache.lock().await.put(address, &result);
        result
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for GeocodePipeline<S, C> {
    async fn extract(&self) -> Result<AddressBatch> {
        tracing::debug!("Reading address records from {}", self.config.input_file());
        let data = self.storage.read_file(self.config.input_file()).await?;
        let batch = parse_csv(&data)?;
        tracing::debug!(
            "Parsed {} records with {} columns",
            batch.len(),
            batch.headers.len()
        );
        Ok(batch)
    }

    async fn transform(&self, mut batch: AddressBatch) -> Result<GeocodedBatch> {
        let address_idx = batch
            .column_index(self.config.address_column())
            .ok_or_else(|| GeocodeError::ProcessingError {
                message: format!(
                    "address column '{}' not found in input",
                    self.config.address_column()
                ),
            })?;

        if let Some(limit) = self.config.record_limit() {
            tracing::info!("TEST MODE: geocoding first {} records only", limit);
            batch.truncate(limit);
        }

        let columns = batch.ensure_geocode_columns();
        let mut summary = BatchSummary::default();

        tracing::info!("Starting geocoding for {} addresses...", batch.len());
        let pb = progress_bar(batch.len() as u64);

        for row_idx in 0..batch.len() {
            let address = batch.rows[row_idx][address_idx].trim().to_string();
            let result = self.resolve_one(&address, &mut summary).await;
            batch.apply_result(row_idx, &columns, &result);
            summary.record(&result);
            pb.inc(1);
        }
        pb.finish_and_clear();

        {
            let cache = self.cache.lock().await;
            match cache.save() {
                Ok(()) => tracing::info!("Final cache saved with {} entries", cache.len()),
                Err(e) => tracing::warn!("Failed to save cache: {}", e),
            }
        }

        summary.paid_requests = self.chain.paid_requests();
        Ok(GeocodedBatch { batch, summary })
    }

    async fn load(&self, result: GeocodedBatch) -> Result<String> {
        let data = write_csv(&result.batch)?;
        tracing::debug!(
            "Writing {} annotated records ({} bytes) to {}",
            result.batch.len(),
            data.len(),
            self.config.output_file()
        );
        self.storage
            .write_file(self.config.output_file(), &data)
            .await?;
        Ok(self.config.output_file().to_string())
    }
}
