use crate::core::Pipeline;
use crate::domain::model::BatchSummary;
use crate::utils::error::Result;

/// The result of a completed run: where the output landed plus the stats.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output_path: String,
    pub summary: BatchSummary,
}

pub struct GeocodeEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> GeocodeEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Loading address records...");
        let batch = self.pipeline.extract().await?;
        tracing::info!("Loaded {} records", batch.len());

        let geocoded = self.pipeline.transform(batch).await?;
        let summary = geocoded.summary.clone();
        log_summary(&summary);

        let output_path = self.pipeline.load(geocoded).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(RunReport {
            output_path,
            summary,
        })
    }
}

fn log_summary(summary: &BatchSummary) {
    tracing::info!("=== GEOCODING SUMMARY ===");
    tracing::info!("Total addresses: {}", summary.total);
    tracing::info!(
        "Successfully geocoded: {} ({:.1}%)",
        summary.success,
        summary.success_rate()
    );
    tracing::info!("Cache hits: {}", summary.cache_hits);

    tracing::info!("Precision levels:");
    for (precision, count) in &summary.precision_counts {
        tracing::info!("  {}: {}", precision, count);
    }

    tracing::info!("Status distribution:");
    for (status, count) in &summary.status_counts {
        tracing::info!("  {}: {}", status, count);
    }

    if summary.paid_requests > 0 {
        tracing::info!(
            "Paid requests: {} (estimated cost ${:.2})",
            summary.paid_requests,
            summary.estimated_cost()
        );
    }
}
