use crate::adapters::{
    GoogleClient, NominatimClient, DEFAULT_GOOGLE_ENDPOINT, DEFAULT_NOMINATIM_ENDPOINT,
};
use crate::core::chain::{ChainOptions, FallbackChain};
use crate::domain::model::CoordBounds;
use crate::domain::ports::Geocoder;
use crate::utils::error::{GeocodeError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Optional TOML tuning file. Every field has a default; the file only
/// overrides what it names. Values support `${VAR}` environment substitution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub geocoding: Option<GeocodingSection>,
    pub bounds: Option<BoundsSection>,
    pub providers: Option<ProvidersSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodingSection {
    pub user_agent: Option<String>,
    pub rate_limit_ms: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_pause_seconds: Option<u64>,
    pub checkpoint_interval: Option<usize>,
    pub region_suffix: Option<String>,
    pub state_abbr: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundsSection {
    pub lat_min: Option<f64>,
    pub lat_max: Option<f64>,
    pub lon_min: Option<f64>,
    pub lon_max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersSection {
    pub nominatim_endpoint: Option<String>,
    pub google_endpoint: Option<String>,
    pub google_api_key: Option<String>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeocodeError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeocodeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR_NAME}` occurrences with the environment value.
    /// Unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

/// Fully resolved runtime settings: defaults, overridden by the TOML file,
/// overridden by the CLI.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user_agent: String,
    pub rate_limit: Duration,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_pause: Duration,
    pub checkpoint_interval: usize,
    pub region_suffix: String,
    pub state_abbr: String,
    pub bounds: CoordBounds,
    pub nominatim_endpoint: String,
    pub google_endpoint: String,
    pub google_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: "geocode_addresses_v1".to_string(),
            rate_limit: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
            retry_attempts: 2,
            retry_pause: Duration::from_secs(2),
            checkpoint_interval: 100,
            region_suffix: "Michigan, USA".to_string(),
            state_abbr: "MI".to_string(),
            bounds: CoordBounds::default(),
            nominatim_endpoint: DEFAULT_NOMINATIM_ENDPOINT.to_string(),
            google_endpoint: DEFAULT_GOOGLE_ENDPOINT.to_string(),
            google_api_key: None,
        }
    }
}

impl Settings {
    pub fn from_sources(cli_api_key: Option<&str>, file: Option<&TomlConfig>) -> Self {
        let mut settings = Self::default();

        if let Some(file) = file {
            if let Some(g) = &file.geocoding {
                if let Some(v) = &g.user_agent {
                    settings.user_agent = v.clone();
                }
                if let Some(v) = g.rate_limit_ms {
                    settings.rate_limit = Duration::from_millis(v);
                }
                if let Some(v) = g.timeout_seconds {
                    settings.timeout = Duration::from_secs(v);
                }
                if let Some(v) = g.retry_attempts {
                    settings.retry_attempts = v;
                }
                if let Some(v) = g.retry_pause_seconds {
                    settings.retry_pause = Duration::from_secs(v);
                }
                if let Some(v) = g.checkpoint_interval {
                    settings.checkpoint_interval = v;
                }
                if let Some(v) = &g.region_suffix {
                    settings.region_suffix = v.clone();
                }
                if let Some(v) = &g.state_abbr {
                    settings.state_abbr = v.clone();
                }
            }
            if let Some(b) = &file.bounds {
                if let Some(v) = b.lat_min {
                    settings.bounds.lat_min = v;
                }
                if let Some(v) = b.lat_max {
                    settings.bounds.lat_max = v;
                }
                if let Some(v) = b.lon_min {
                    settings.bounds.lon_min = v;
                }
                if let Some(v) = b.lon_max {
                    settings.bounds.lon_max = v;
                }
            }
            if let Some(p) = &file.providers {
                if let Some(v) = &p.nominatim_endpoint {
                    settings.nominatim_endpoint = v.clone();
                }
                if let Some(v) = &p.google_endpoint {
                    settings.google_endpoint = v.clone();
                }
                if let Some(v) = &p.google_api_key {
                    settings.google_api_key = Some(v.clone());
                }
            }
        }

        // CLI flag (or GOOGLE_MAPS_API_KEY) wins over the file.
        if let Some(key) = cli_api_key {
            settings.google_api_key = Some(key.to_string());
        }

        settings
    }

    /// Construct the fallback chain these settings describe. The paid tier
    /// is present only when an API key was supplied.
    pub fn build_chain(&self) -> Result<FallbackChain> {
        let free: Box<dyn Geocoder> = Box::new(NominatimClient::new(
            &self.nominatim_endpoint,
            &self.user_agent,
            self.timeout,
        )?);
        let paid: Option<Box<dyn Geocoder>> = match &self.google_api_key {
            Some(key) => Some(Box::new(GoogleClient::new(
                &self.google_endpoint,
                key,
                self.timeout,
            )?)),
            None => None,
        };
        Ok(FallbackChain::new(free, paid, self.chain_options()))
    }

    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            bounds: self.bounds,
            region_suffix: self.region_suffix.clone(),
            state_abbr: self.state_abbr.clone(),
            retry_attempts: self.retry_attempts,
            retry_pause: self.retry_pause,
            min_interval: self.rate_limit,
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("providers.nominatim_endpoint", &self.nominatim_endpoint)?;
        validate_url("providers.google_endpoint", &self.google_endpoint)?;
        validate_non_empty_string("geocoding.user_agent", &self.user_agent)?;
        validate_non_empty_string("geocoding.region_suffix", &self.region_suffix)?;
        validate_non_empty_string("geocoding.state_abbr", &self.state_abbr)?;
        validate_positive_number("geocoding.checkpoint_interval", self.checkpoint_interval, 1)?;
        validate_range("bounds.lat_min", self.bounds.lat_min, -90.0, 90.0)?;
        validate_range("bounds.lat_max", self.bounds.lat_max, -90.0, 90.0)?;
        validate_range("bounds.lon_min", self.bounds.lon_min, -180.0, 180.0)?;
        validate_range("bounds.lon_max", self.bounds.lon_max, -180.0, 180.0)?;

        if self.bounds.lat_min >= self.bounds.lat_max {
            return Err(GeocodeError::InvalidConfigValueError {
                field: "bounds.lat_min".to_string(),
                value: self.bounds.lat_min.to_string(),
                reason: "lat_min must be below lat_max".to_string(),
            });
        }
        if self.bounds.lon_min >= self.bounds.lon_max {
            return Err(GeocodeError::InvalidConfigValueError {
                field: "bounds.lon_min".to_string(),
                value: self.bounds.lon_min.to_string(),
                reason: "lon_min must be below lon_max".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[geocoding]
rate_limit_ms = 500
checkpoint_interval = 25
region_suffix = "Ohio, USA"
state_abbr = "OH"

[bounds]
lat_min = 38.0
lat_max = 42.5

[providers]
nominatim_endpoint = "http://localhost:8080/search"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = Settings::from_sources(None, Some(&config));

        assert_eq!(settings.rate_limit, Duration::from_millis(500));
        assert_eq!(settings.checkpoint_interval, 25);
        assert_eq!(settings.region_suffix, "Ohio, USA");
        assert_eq!(settings.state_abbr, "OH");
        assert_eq!(settings.bounds.lat_min, 38.0);
        assert_eq!(settings.bounds.lat_max, 42.5);
        // Untouched fields keep their defaults.
        assert_eq!(settings.bounds.lon_min, -90.0);
        assert_eq!(settings.nominatim_endpoint, "http://localhost:8080/search");
        assert_eq!(settings.google_endpoint, DEFAULT_GOOGLE_ENDPOINT);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GEOCODE_TEST_KEY", "secret-from-env");

        let toml_content = r#"
[providers]
google_api_key = "${GEOCODE_TEST_KEY}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = Settings::from_sources(None, Some(&config));
        assert_eq!(settings.google_api_key.as_deref(), Some("secret-from-env"));

        std::env::remove_var("GEOCODE_TEST_KEY");
    }

    #[test]
    fn test_cli_key_overrides_file_key() {
        let toml_content = r#"
[providers]
google_api_key = "file-key"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = Settings::from_sources(Some("cli-key"), Some(&config));
        assert_eq!(settings.google_api_key.as_deref(), Some("cli-key"));
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        let settings = Settings::from_sources(None, Some(&config));
        assert_eq!(settings.rate_limit, Duration::from_millis(1000));
        assert_eq!(settings.retry_attempts, 2);
        assert_eq!(settings.region_suffix, "Michigan, USA");
        assert!(settings.google_api_key.is_none());
    }

    #[test]
    fn test_invalid_endpoint_fails_validation() {
        let mut settings = Settings::default();
        settings.nominatim_endpoint = "not-a-url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds_fail_validation() {
        let mut settings = Settings::default();
        settings.bounds.lat_min = 50.0;
        settings.bounds.lat_max = 40.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[geocoding]
timeout_seconds = 30
"#;
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        let settings = Settings::from_sources(None, Some(&config));
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }
}
