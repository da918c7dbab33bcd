pub mod cli;
pub mod file;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extensions, validate_non_empty_string, validate_path, validate_positive_number,
    Validate,
};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "geocode-addresses")]
#[command(about = "Geocode address CSVs through a free/paid/city-level fallback chain")]
pub struct CliConfig {
    #[arg(long, default_value = "data/processed/consolidated_licenses.csv")]
    pub input: String,

    #[arg(long, default_value = "data/processed/geocoded_licenses.csv")]
    pub output: String,

    #[arg(long, default_value = "address")]
    pub address_column: String,

    #[arg(long, help = "Test mode: geocode only the first --limit records")]
    pub test: bool,

    #[arg(long, default_value = "100", help = "Number of records in test mode")]
    pub limit: usize,

    #[arg(
        long,
        env = "GOOGLE_MAPS_API_KEY",
        help = "Enables the paid Google tier on free-tier failures"
    )]
    pub google_api_key: Option<String>,

    #[arg(long, default_value = "data/cache/geocode_cache.json")]
    pub cache_file: String,

    #[arg(long, help = "Optional TOML tuning file")]
    pub config: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn input_file(&self) -> &str {
        &self.input
    }

    fn output_file(&self) -> &str {
        &self.output
    }

    fn address_column(&self) -> &str {
        &self.address_column
    }

    fn record_limit(&self) -> Option<usize> {
        if self.test {
            Some(self.limit)
        } else {
            None
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input", &self.input)?;
        validate_path("output", &self.output)?;
        validate_path("cache_file", &self.cache_file)?;
        validate_file_extensions("input", std::slice::from_ref(&self.input), &["csv"])?;
        validate_file_extensions("output", std::slice::from_ref(&self.output), &["csv"])?;
        validate_non_empty_string("address_column", &self.address_column)?;
        validate_positive_number("limit", self.limit, 1)?;

        if let Some(key) = &self.google_api_key {
            validate_non_empty_string("google_api_key", key)?;
        }
        if let Some(config) = &self.config {
            validate_path("config", config)?;
        }

        Ok(())
    }
}
