use crate::domain::model::{Coordinates, Provider};
use crate::domain::ports::Geocoder;
use crate::utils::error::{GeocodeError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

/// Free tier: OpenStreetMap Nominatim search API.
///
/// Nominatim requires a descriptive User-Agent and tolerates at most one
/// request per second; throttling is handled by the fallback chain.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[allow(dead_code)]
    display_name: String,
}

impl NominatimClient {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    fn provider(&self) -> Provider {
        Provider::Nominatim
    }

    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>> {
        tracing::debug!("Nominatim lookup: {}", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::ProviderError {
                provider: "nominatim".to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let latitude: f64 = place.lat.parse().map_err(|_| GeocodeError::ProviderError {
            provider: "nominatim".to_string(),
            message: format!("unparseable latitude: {}", place.lat),
        })?;
        let longitude: f64 = place.lon.parse().map_err(|_| GeocodeError::ProviderError {
            provider: "nominatim".to_string(),
            message: format!("unparseable longitude: {}", place.lon),
        })?;

        Ok(Some(Coordinates {
            latitude,
            longitude,
        }))
    }
}
