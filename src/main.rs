use clap::Parser;
use geocode_addresses::config::file::{Settings, TomlConfig};
use geocode_addresses::core::cache::GeocodeCache;
use geocode_addresses::utils::{logger, validation::Validate};
use geocode_addresses::{CliConfig, GeocodeEngine, GeocodePipeline, LocalStorage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting geocode-addresses CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let file_config = match &config.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::error!("❌ Failed to load config file {}: {}", path, e);
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(1);
            }
        },
        None => None,
    };

    let settings = Settings::from_sources(config.google_api_key.as_deref(), file_config.as_ref());
    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.test {
        tracing::info!("[TEST MODE] Will geocode first {} records", config.limit);
        tracing::info!("This is recommended before running full geocoding");
    }
    if settings.google_api_key.is_some() {
        tracing::info!("💳 Paid Google tier enabled ($5 per 1,000 requests)");
    } else {
        tracing::info!("No Google API key configured; running free tiers only");
    }

    let chain = match settings.build_chain() {
        Ok(chain) => chain,
        Err(e) => {
            tracing::error!("❌ Failed to initialize geocoding providers: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let cache = GeocodeCache::load(&config.cache_file, settings.checkpoint_interval);

    let storage = LocalStorage::new(".");
    let pipeline = GeocodePipeline::new(storage, config.clone(), chain, cache);
    let engine = GeocodeEngine::new(pipeline);

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ Geocoding completed successfully!");
            println!("✅ Geocoding completed successfully!");
            println!("📁 Output saved to: {}", report.output_path);
            println!(
                "📊 Success rate: {:.1}% ({}/{})",
                report.summary.success_rate(),
                report.summary.success,
                report.summary.total
            );
            if report.summary.paid_requests > 0 {
                println!(
                    "💰 Paid requests: {} (estimated cost ${:.2})",
                    report.summary.paid_requests,
                    report.summary.estimated_cost()
                );
            }
            if config.test {
                println!();
                println!("This was a test run. Re-run without --test to geocode all addresses.");
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Geocoding failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                geocode_addresses::utils::error::ErrorSeverity::Low => 0,
                geocode_addresses::utils::error::ErrorSeverity::Medium => 2,
                geocode_addresses::utils::error::ErrorSeverity::High => 1,
                geocode_addresses::utils::error::ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
