use crate::domain::model::{Coordinates, Provider};
use crate::domain::ports::Geocoder;
use crate::utils::error::{GeocodeError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_GOOGLE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Paid tier: Google Geocoding API. Billed per request, so the chain only
/// calls this after the free tier has failed.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GoogleClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleClient {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>> {
        tracing::debug!("Google lookup: {}", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", query), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(GeocodeError::ProviderError {
                provider: "google".to_string(),
                message: format!("HTTP {}", http_status),
            });
        }

        let body: GoogleResponse = response.json().await?;
        match body.status.as_str() {
            "OK" => Ok(body.results.into_iter().next().map(|r| Coordinates {
                latitude: r.geometry.location.lat,
                longitude: r.geometry.location.lng,
            })),
            "ZERO_RESULTS" => Ok(None),
            status => Err(GeocodeError::ProviderError {
                provider: "google".to_string(),
                message: match body.error_message {
                    Some(detail) => format!("{}: {}", status, detail),
                    None => status.to_string(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> GoogleClient {
        GoogleClient::new(&server.url("/geocode"), "test-key", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_sends_key_and_parses_location() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/geocode")
                .query_param("address", "500 Ottawa St, Lansing MI 48933, Michigan, USA")
                .query_param("key", "test-key");
            then.status(200).json_body(serde_json::json!({
                "status": "OK",
                "results": [
                    {"geometry": {"location": {"lat": 42.7335, "lng": -84.5539}}}
                ]
            }));
        });

        let coords = client(&server)
            .lookup("500 Ottawa St, Lansing MI 48933, Michigan, USA")
            .await
            .unwrap()
            .unwrap();

        api_mock.assert();
        assert!((coords.latitude - 42.7335).abs() < 1e-9);
        assert!((coords.longitude - -84.5539).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_zero_results_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/geocode");
            then.status(200)
                .json_body(serde_json::json!({"status": "ZERO_RESULTS", "results": []}));
        });

        let result = client(&server).lookup("nowhere").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_denied_request_surfaces_error_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/geocode");
            then.status(200).json_body(serde_json::json!({
                "status": "REQUEST_DENIED",
                "results": [],
                "error_message": "The provided API key is invalid."
            }));
        });

        let err = client(&server).lookup("anything").await.unwrap_err();
        match err {
            GeocodeError::ProviderError { provider, message } => {
                assert_eq!(provider, "google");
                assert!(message.contains("REQUEST_DENIED"));
                assert!(message.contains("invalid"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
