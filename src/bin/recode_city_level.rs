//! Re-geocode rows that only resolved to city level, typically after
//! enabling the paid tier. Clears their cache entries, runs just those
//! rows back through the chain, and merges the results in place.

use anyhow::Context;
use clap::Parser;
use geocode_addresses::config::file::{Settings, TomlConfig};
use geocode_addresses::core::cache::GeocodeCache;
use geocode_addresses::core::pipeline::{parse_csv, progress_bar, write_csv};
use geocode_addresses::domain::model::Precision;
use geocode_addresses::utils::{logger, validation::Validate};

#[derive(Debug, Parser)]
#[command(name = "recode_city_level")]
#[command(about = "Re-geocode city-level rows, usually with the paid tier enabled")]
struct Args {
    #[arg(long, default_value = "data/processed/geocoded_licenses.csv")]
    input: String,

    #[arg(long, default_value = "data/processed/geocoded_licenses.csv")]
    output: String,

    #[arg(long, default_value = "address")]
    address_column: String,

    #[arg(long, env = "GOOGLE_MAPS_API_KEY")]
    google_api_key: Option<String>,

    #[arg(long, default_value = "data/cache/geocode_cache.json")]
    cache_file: String,

    #[arg(long, help = "Optional TOML tuning file")]
    config: Option<String>,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    tracing::info!("=== Re-geocode City-Level Addresses ===");

    let file_config = match &args.config {
        Some(path) => Some(TomlConfig::from_file(path).with_context(|| format!("loading {}", path))?),
        None => None,
    };
    let settings = Settings::from_sources(args.google_api_key.as_deref(), file_config.as_ref());
    settings.validate()?;

    if settings.google_api_key.is_none() {
        tracing::warn!(
            "No Google API key configured; re-geocoding will only retry the free tiers"
        );
    }

    let data = std::fs::read(&args.input).with_context(|| format!("reading {}", args.input))?;
    let mut batch = parse_csv(&data)?;
    tracing::info!("Loaded {} total records", batch.len());

    let precision_idx = batch
        .column_index("geocode_precision")
        .context("input has no geocode_precision column; run geocode-addresses first")?;
    let address_idx = batch
        .column_index(&args.address_column)
        .with_context(|| format!("input has no {} column", args.address_column))?;

    let city_rows: Vec<usize> = batch
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row[precision_idx] == "city")
        .map(|(i, _)| i)
        .collect();

    tracing::info!(
        "Found {} city-level addresses to re-geocode ({} kept as-is)",
        city_rows.len(),
        batch.len() - city_rows.len()
    );
    if city_rows.is_empty() {
        println!("No city-level addresses to re-geocode!");
        return Ok(());
    }

    // Drop stale cache entries so the chain actually re-resolves them.
    let mut cache = GeocodeCache::load(&args.cache_file, settings.checkpoint_interval);
    let mut cleared = 0usize;
    for &row_idx in &city_rows {
        let address = batch.rows[row_idx][address_idx].trim().to_string();
        if cache.remove(&address) {
            cleared += 1;
        }
    }
    cache.save()?;
    tracing::info!("Cleared {} cache entries", cleared);

    let chain = settings.build_chain()?;
    let columns = batch.ensure_geocode_columns();

    let pb = progress_bar(city_rows.len() as u64);
    let mut improved = 0usize;
    let mut still_city = 0usize;
    let mut failed = 0usize;
    for &row_idx in &city_rows {
        let address = batch.rows[row_idx][address_idx].trim().to_string();
        let result = chain.resolve(&address).await;
        cache.put(&address, &result);

        match result.precision {
            Precision::Address => improved += 1,
            Precision::City => still_city += 1,
            Precision::Failed => failed += 1,
        }
        batch.apply_result(row_idx, &columns, &result);
        pb.inc(1);
    }
    pb.finish_and_clear();
    cache.save()?;

    let total = city_rows.len();
    println!("\n=== RE-GEOCODING RESULTS ===");
    println!(
        "Improved to address-level: {} ({:.1}%)",
        improved,
        improved as f64 / total as f64 * 100.0
    );
    println!(
        "Still city-level: {} ({:.1}%)",
        still_city,
        still_city as f64 / total as f64 * 100.0
    );
    if failed > 0 {
        println!("No longer resolving: {}", failed);
    }
    if chain.paid_requests() > 0 {
        println!(
            "Paid requests: {} (estimated cost ${:.2})",
            chain.paid_requests(),
            chain.paid_requests() as f64 / 1000.0
                * geocode_addresses::domain::model::PAID_COST_PER_THOUSAND
        );
    }

    let address_level = batch
        .rows
        .iter()
        .filter(|row| row[precision_idx] == "address")
        .count();
    let city_level = batch
        .rows
        .iter()
        .filter(|row| row[precision_idx] == "city")
        .count();
    println!("\n=== OVERALL STATISTICS ===");
    println!("Total records: {}", batch.len());
    println!(
        "Address-level: {} ({:.1}%)",
        address_level,
        address_level as f64 / batch.len() as f64 * 100.0
    );
    println!(
        "City-level: {} ({:.1}%)",
        city_level,
        city_level as f64 / batch.len() as f64 * 100.0
    );

    let output_data = write_csv(&batch)?;
    if let Some(parent) = std::path::Path::new(&args.output).parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, output_data).with_context(|| format!("writing {}", args.output))?;

    println!("\n✅ Updated file saved to: {}", args.output);
    Ok(())
}
