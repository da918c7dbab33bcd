use crate::domain::model::{CoordBounds, GeocodeResult, GeocodeStatus, Precision};
use crate::domain::ports::Geocoder;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tuning knobs for the fallback chain.
#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub bounds: CoordBounds,
    /// Appended to every lookup query, e.g. "123 Main St" -> "123 Main St, Michigan, USA".
    pub region_suffix: String,
    /// State abbreviation stripped when reducing an address to its city.
    pub state_abbr: String,
    /// Extra attempts after a transient failure.
    pub retry_attempts: u32,
    pub retry_pause: Duration,
    /// Minimum spacing between outbound requests (Nominatim policy: 1/s).
    pub min_interval: Duration,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            bounds: CoordBounds::default(),
            region_suffix: "Michigan, USA".to_string(),
            state_abbr: "MI".to_string(),
            retry_attempts: 2,
            retry_pause: Duration::from_secs(2),
            min_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
enum TierOutcome {
    Found(crate::domain::model::Coordinates),
    NotFound,
    OutOfBounds,
    Error,
}

impl TierOutcome {
    fn status(&self) -> GeocodeStatus {
        match self {
            Self::Found(_) => GeocodeStatus::Success,
            Self::NotFound => GeocodeStatus::NotFound,
            Self::OutOfBounds => GeocodeStatus::OutOfBounds,
            Self::Error => GeocodeStatus::Error,
        }
    }
}

/// Three-tier resolution: free full-address lookup, then the paid provider
/// (only when configured), then a free city-level approximation. A failure
/// at one tier drops through to the next; total failure leaves the address
/// unresolved with the last tier's status.
pub struct FallbackChain {
    free: Box<dyn Geocoder>,
    paid: Option<Box<dyn Geocoder>>,
    options: ChainOptions,
    city_re: Regex,
    throttle: Mutex<Option<Instant>>,
    paid_requests: AtomicU64,
}

impl FallbackChain {
    pub fn new(free: Box<dyn Geocoder>, paid: Option<Box<dyn Geocoder>>, options: ChainOptions) -> Self {
        // Strips a trailing "<STATE> <zip>" from the city component of
        // "Street, City MI 48901" style addresses.
        let city_re = Regex::new(&format!(
            r"(^|\s+){}(\s+\d{{5}}(-\d{{4}})?)?\s*$",
            regex::escape(&options.state_abbr)
        ))
        .unwrap();
        Self {
            free,
            paid,
            options,
            city_re,
            throttle: Mutex::new(None),
            paid_requests: AtomicU64::new(0),
        }
    }

    pub fn has_paid_tier(&self) -> bool {
        self.paid.is_some()
    }

    /// Total requests sent to the paid provider, including retries;
    /// each one is billed.
    pub fn paid_requests(&self) -> u64 {
        self.paid_requests.load(Ordering::Relaxed)
    }

    pub async fn resolve(&self, address: &str) -> GeocodeResult {
        let address = address.trim();
        if address.is_empty() {
            return GeocodeResult::unresolved(GeocodeStatus::NoAddress);
        }
        let query = format!("{}, {}", address, self.options.region_suffix);

        // Tier 1: free full-address lookup
        let (outcome, _) = self.attempt(self.free.as_ref(), &query).await;
        if let TierOutcome::Found(coords) = outcome {
            return GeocodeResult::resolved(coords, Precision::Address, self.free.provider());
        }
        let mut last_status = outcome.status();

        // Tier 2: paid full-address lookup, only on tier-1 failure
        if let Some(paid) = &self.paid {
            let (outcome, requests) = self.attempt(paid.as_ref(), &query).await;
            self.paid_requests
                .fetch_add(u64::from(requests), Ordering::Relaxed);
            if let TierOutcome::Found(coords) = outcome {
                return GeocodeResult::resolved(coords, Precision::Address, paid.provider());
            }
            last_status = outcome.status();
        }

        // Tier 3: free city-level approximation
        if let Some(city) = self.extract_city(address) {
            let city_query = format!("{}, {}", city, self.options.region_suffix);
            let (outcome, _) = self.attempt(self.free.as_ref(), &city_query).await;
            if let TierOutcome::Found(coords) = outcome {
                tracing::warn!("Geocoded to city level: {} -> {}", address, city);
                return GeocodeResult::resolved(coords, Precision::City, self.free.provider());
            }
            last_status = outcome.status();
        }

        GeocodeResult::unresolved(last_status)
    }

    /// One tier: lookup with retries on transient failures and a bounds
    /// check on hits. Returns the outcome and the number of requests sent.
    async fn attempt(&self, geocoder: &dyn Geocoder, query: &str) -> (TierOutcome, u32) {
        let mut requests = 0u32;
        for attempt in 0..=self.options.retry_attempts {
            self.wait_turn().await;
            requests += 1;
            match geocoder.lookup(query).await {
                Ok(Some(coords)) => {
                    if self.options.bounds.contains(&coords) {
                        return (TierOutcome::Found(coords), requests);
                    }
                    tracing::warn!(
                        "Coordinates outside configured bounds: {} -> ({}, {})",
                        query,
                        coords.latitude,
                        coords.longitude
                    );
                    return (TierOutcome::OutOfBounds, requests);
                }
                Ok(None) => return (TierOutcome::NotFound, requests),
                Err(e) if e.is_transient() && attempt < self.options.retry_attempts => {
                    tracing::warn!(
                        "{} lookup timed out, retry {}/{}: {}",
                        geocoder.provider(),
                        attempt + 1,
                        self.options.retry_attempts,
                        query
                    );
                    tokio::time::sleep(self.options.retry_pause).await;
                }
                Err(e) => {
                    tracing::error!("{} lookup failed: {} - {}", geocoder.provider(), query, e);
                    return (TierOutcome::Error, requests);
                }
            }
        }
        (TierOutcome::Error, requests)
    }

    /// Enforce the minimum spacing between outbound requests. The lock is
    /// held across the sleep so concurrent callers serialize.
    async fn wait_turn(&self) {
        if self.options.min_interval.is_zero() {
            return;
        }
        let mut last = self.throttle.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.options.min_interval {
                tokio::time::sleep(self.options.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Reduce "Street, City MI Zip" to "City". None when the address has
    /// no city component, which skips the city-level tier.
    pub fn extract_city(&self, address: &str) -> Option<String> {
        let parts: Vec<&str> = address.split(',').collect();
        if parts.len() < 2 {
            return None;
        }
        let city_part = parts[1].trim();
        let city = self.city_re.replace(city_part, "").trim().to_string();
        if city.is_empty() {
            None
        } else {
            Some(city)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{GoogleClient, NominatimClient};
    use crate::domain::model::Provider;
    use httpmock::prelude::*;

    const FULL_QUERY: &str = "123 Main St, Lansing MI 48901, Michigan, USA";
    const CITY_QUERY: &str = "Lansing, Michigan, USA";

    fn test_options() -> ChainOptions {
        ChainOptions {
            retry_attempts: 1,
            retry_pause: Duration::ZERO,
            min_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn free_client(server: &MockServer) -> Box<dyn Geocoder> {
        Box::new(
            NominatimClient::new(
                &server.url("/nominatim"),
                "geocode_addresses_test",
                Duration::from_secs(5),
            )
            .unwrap(),
        )
    }

    fn paid_client(server: &MockServer) -> Box<dyn Geocoder> {
        Box::new(
            GoogleClient::new(&server.url("/google"), "test-key", Duration::from_secs(5)).unwrap(),
        )
    }

    fn nominatim_hit<'a>(
        server: &'a MockServer,
        query: &str,
        lat: &str,
        lon: &str,
    ) -> httpmock::Mock<'a> {
        let q = query.to_string();
        let (lat, lon) = (lat.to_string(), lon.to_string());
        server.mock(move |when, then| {
            when.method(GET).path("/nominatim").query_param("q", &q);
            then.status(200).json_body(serde_json::json!([
                {"lat": lat, "lon": lon, "display_name": "somewhere"}
            ]));
        })
    }

    fn nominatim_miss<'a>(server: &'a MockServer, query: &str) -> httpmock::Mock<'a> {
        let q = query.to_string();
        server.mock(move |when, then| {
            when.method(GET).path("/nominatim").query_param("q", &q);
            then.status(200).json_body(serde_json::json!([]));
        })
    }

    fn google_hit(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET).path("/google");
            then.status(200).json_body(serde_json::json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": 42.7325, "lng": -84.5555}}}]
            }));
        })
    }

    fn google_miss(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET).path("/google");
            then.status(200)
                .json_body(serde_json::json!({"status": "ZERO_RESULTS", "results": []}));
        })
    }

    #[tokio::test]
    async fn test_free_tier_success_skips_paid() {
        let server = MockServer::start();
        let free = nominatim_hit(&server, FULL_QUERY, "42.7325", "-84.5555");
        let paid = google_hit(&server);

        let chain = FallbackChain::new(free_client(&server), Some(paid_client(&server)), test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        free.assert();
        paid.assert_hits(0);
        assert!(result.is_success());
        assert_eq!(result.precision, Precision::Address);
        assert_eq!(result.source, Some(Provider::Nominatim));
        assert_eq!(chain.paid_requests(), 0);
    }

    #[tokio::test]
    async fn test_paid_tier_used_after_free_miss() {
        let server = MockServer::start();
        nominatim_miss(&server, FULL_QUERY);
        let paid = google_hit(&server);

        let chain = FallbackChain::new(free_client(&server), Some(paid_client(&server)), test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        paid.assert();
        assert!(result.is_success());
        assert_eq!(result.precision, Precision::Address);
        assert_eq!(result.source, Some(Provider::Google));
        assert_eq!(chain.paid_requests(), 1);
    }

    #[tokio::test]
    async fn test_city_fallback_when_both_address_tiers_miss() {
        let server = MockServer::start();
        nominatim_miss(&server, FULL_QUERY);
        google_miss(&server);
        let city = nominatim_hit(&server, CITY_QUERY, "42.7325", "-84.5555");

        let chain = FallbackChain::new(free_client(&server), Some(paid_client(&server)), test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        city.assert();
        assert!(result.is_success());
        assert_eq!(result.precision, Precision::City);
        assert_eq!(result.source, Some(Provider::Nominatim));
    }

    #[tokio::test]
    async fn test_city_fallback_without_paid_tier() {
        let server = MockServer::start();
        nominatim_miss(&server, FULL_QUERY);
        let city = nominatim_hit(&server, CITY_QUERY, "42.7325", "-84.5555");

        let chain = FallbackChain::new(free_client(&server), None, test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        city.assert();
        assert!(!chain.has_paid_tier());
        assert_eq!(result.precision, Precision::City);
        assert_eq!(chain.paid_requests(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_when_every_tier_misses() {
        let server = MockServer::start();
        nominatim_miss(&server, FULL_QUERY);
        google_miss(&server);
        nominatim_miss(&server, CITY_QUERY);

        let chain = FallbackChain::new(free_client(&server), Some(paid_client(&server)), test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        assert!(!result.is_success());
        assert_eq!(result.status, GeocodeStatus::NotFound);
        assert_eq!(result.precision, Precision::Failed);
        assert!(result.coordinates.is_none());
        assert!(result.source.is_none());
    }

    #[tokio::test]
    async fn test_out_of_bounds_hit_is_rejected() {
        let server = MockServer::start();
        // London coordinates: a plausible hit, but nowhere near Michigan.
        nominatim_hit(&server, "10 Downing St, Michigan, USA", "51.5034", "-0.1276");

        let chain = FallbackChain::new(free_client(&server), None, test_options());
        let result = chain.resolve("10 Downing St").await;

        assert_eq!(result.status, GeocodeStatus::OutOfBounds);
        assert_eq!(result.precision, Precision::Failed);
    }

    #[tokio::test]
    async fn test_out_of_bounds_free_hit_falls_through_to_paid() {
        let server = MockServer::start();
        // Free tier answers with London coordinates for a Michigan query.
        let free = nominatim_hit(&server, FULL_QUERY, "51.5034", "-0.1276");
        let paid = google_hit(&server);

        let chain = FallbackChain::new(free_client(&server), Some(paid_client(&server)), test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        free.assert();
        paid.assert();
        assert!(result.is_success());
        assert_eq!(result.precision, Precision::Address);
        assert_eq!(result.source, Some(Provider::Google));
        assert_eq!(chain.paid_requests(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_free_tier_falls_through_to_paid() {
        let server = MockServer::start();
        let paid = google_hit(&server);

        // Nothing listens on port 9; every connect fails and is retried.
        let dead = Box::new(
            NominatimClient::new(
                "http://127.0.0.1:9/search",
                "geocode_addresses_test",
                Duration::from_secs(1),
            )
            .unwrap(),
        );
        let chain = FallbackChain::new(dead, Some(paid_client(&server)), test_options());
        let result = chain.resolve("123 Main St, Lansing MI 48901").await;

        paid.assert();
        assert!(result.is_success());
        assert_eq!(result.source, Some(Provider::Google));
    }

    #[tokio::test]
    async fn test_empty_address_short_circuits() {
        let server = MockServer::start();
        let free = nominatim_miss(&server, FULL_QUERY);

        let chain = FallbackChain::new(free_client(&server), None, test_options());
        let result = chain.resolve("   ").await;

        free.assert_hits(0);
        assert_eq!(result.status, GeocodeStatus::NoAddress);
    }

    #[test]
    fn test_extract_city() {
        let server = MockServer::start();
        let chain = FallbackChain::new(free_client(&server), None, test_options());

        assert_eq!(
            chain.extract_city("123 Main St, Lansing MI 48901"),
            Some("Lansing".to_string())
        );
        assert_eq!(
            chain.extract_city("123 Main St, Grand Rapids MI 49503-1234"),
            Some("Grand Rapids".to_string())
        );
        assert_eq!(
            chain.extract_city("123 Main St, Detroit MI"),
            Some("Detroit".to_string())
        );
        assert_eq!(chain.extract_city("just a street"), None);
        assert_eq!(chain.extract_city("street, MI 48901"), None);
    }
}
