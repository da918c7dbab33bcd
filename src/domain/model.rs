use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Billing rate for the paid tier: $5 per 1,000 requests.
pub const PAID_COST_PER_THOUSAND: f64 = 5.0;

/// Columns appended to the output CSV.
pub const GEOCODE_COLUMNS: [&str; 5] = [
    "latitude",
    "longitude",
    "geocode_status",
    "geocode_precision",
    "geocode_source",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStatus {
    Success,
    NotFound,
    OutOfBounds,
    Error,
    NoAddress,
}

impl fmt::Display for GeocodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::OutOfBounds => "out_of_bounds",
            Self::Error => "error",
            Self::NoAddress => "no_address",
        };
        write!(f, "{}", s)
    }
}

/// How precise the accepted coordinates are: exact street address,
/// city centroid, or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Address,
    City,
    Failed,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Address => "address",
            Self::City => "city",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Which provider produced the accepted coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Nominatim,
    Google,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Nominatim => "nominatim",
            Self::Google => "google",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Bounding box used to reject wildly wrong provider hits.
/// Defaults to the Michigan state bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Default for CoordBounds {
    fn default() -> Self {
        Self {
            lat_min: 41.0,
            lat_max: 48.0,
            lon_min: -90.0,
            lon_max: -82.0,
        }
    }
}

impl CoordBounds {
    pub fn contains(&self, coords: &Coordinates) -> bool {
        (self.lat_min..=self.lat_max).contains(&coords.latitude)
            && (self.lon_min..=self.lon_max).contains(&coords.longitude)
    }
}

/// The outcome of running one address through the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinates: Option<Coordinates>,
    pub status: GeocodeStatus,
    pub precision: Precision,
    pub source: Option<Provider>,
}

impl GeocodeResult {
    pub fn resolved(coordinates: Coordinates, precision: Precision, source: Provider) -> Self {
        Self {
            coordinates: Some(coordinates),
            status: GeocodeStatus::Success,
            precision,
            source: Some(source),
        }
    }

    pub fn unresolved(status: GeocodeStatus) -> Self {
        Self {
            coordinates: None,
            status,
            precision: Precision::Failed,
            source: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GeocodeStatus::Success
    }
}

/// An address CSV held in memory: ordered headers plus rows of cells.
/// Extra columns pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct AddressBatch {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AddressBatch {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Ensure the five geocode columns exist, appending missing ones and
    /// padding every row so it stays rectangular. Returns the column
    /// indices in `GEOCODE_COLUMNS` order.
    pub fn ensure_geocode_columns(&mut self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(GEOCODE_COLUMNS.len());
        for name in GEOCODE_COLUMNS {
            let idx = match self.column_index(name) {
                Some(idx) => idx,
                None => {
                    self.headers.push(name.to_string());
                    self.headers.len() - 1
                }
            };
            indices.push(idx);
        }
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        indices
    }

    /// Write a geocode result into a row at the given column indices.
    pub fn apply_result(&mut self, row_idx: usize, columns: &[usize], result: &GeocodeResult) {
        let (lat, lon) = match result.coordinates {
            Some(c) => (c.latitude.to_string(), c.longitude.to_string()),
            None => (String::new(), String::new()),
        };
        let source = result
            .source
            .map(|s| s.to_string())
            .unwrap_or_default();
        let values = [
            lat,
            lon,
            result.status.to_string(),
            result.precision.to_string(),
            source,
        ];
        for (col, value) in columns.iter().zip(values) {
            self.rows[row_idx][*col] = value;
        }
    }
}

/// Aggregate statistics for one geocoding run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub cache_hits: usize,
    pub paid_requests: u64,
    pub precision_counts: BTreeMap<String, usize>,
    pub status_counts: BTreeMap<String, usize>,
}

impl BatchSummary {
    pub fn record(&mut self, result: &GeocodeResult) {
        self.total += 1;
        if result.is_success() {
            self.success += 1;
        }
        *self
            .precision_counts
            .entry(result.precision.to_string())
            .or_insert(0) += 1;
        *self
            .status_counts
            .entry(result.status.to_string())
            .or_insert(0) += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.success as f64 / self.total as f64 * 100.0
    }

    /// Estimated spend on the paid tier for this run.
    pub fn estimated_cost(&self) -> f64 {
        self.paid_requests as f64 / 1000.0 * PAID_COST_PER_THOUSAND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_accept_michigan_reject_elsewhere() {
        let bounds = CoordBounds::default();
        let detroit = Coordinates {
            latitude: 42.3314,
            longitude: -83.0458,
        };
        let london = Coordinates {
            latitude: 51.5074,
            longitude: -0.1278,
        };
        assert!(bounds.contains(&detroit));
        assert!(!bounds.contains(&london));
    }

    #[test]
    fn test_paid_cost_matches_billing_rate() {
        // 2,800 paid lookups at $5/1,000 come to $14.00
        let summary = BatchSummary {
            paid_requests: 2800,
            ..Default::default()
        };
        assert!((summary.estimated_cost() - 14.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_counts_precision_and_status() {
        let mut summary = BatchSummary::default();
        summary.record(&GeocodeResult::resolved(
            Coordinates {
                latitude: 42.0,
                longitude: -84.0,
            },
            Precision::Address,
            Provider::Nominatim,
        ));
        summary.record(&GeocodeResult::unresolved(GeocodeStatus::NotFound));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.success, 1);
        assert!((summary.success_rate() - 50.0).abs() < f64::EPSILON);
        assert_eq!(summary.precision_counts.get("address"), Some(&1));
        assert_eq!(summary.precision_counts.get("failed"), Some(&1));
        assert_eq!(summary.status_counts.get("not_found"), Some(&1));
    }

    #[test]
    fn test_ensure_geocode_columns_appends_and_pads() {
        let mut batch = AddressBatch {
            headers: vec!["business_name".to_string(), "address".to_string()],
            rows: vec![vec![
                "Acme".to_string(),
                "123 Main St, Lansing MI 48901".to_string(),
            ]],
        };
        let columns = batch.ensure_geocode_columns();

        assert_eq!(batch.headers.len(), 7);
        assert_eq!(batch.rows[0].len(), 7);
        assert_eq!(columns, vec![2, 3, 4, 5, 6]);

        // A second call finds the existing columns instead of duplicating them.
        let again = batch.ensure_geocode_columns();
        assert_eq!(again, columns);
        assert_eq!(batch.headers.len(), 7);
    }

    #[test]
    fn test_apply_result_writes_cells() {
        let mut batch = AddressBatch {
            headers: vec!["address".to_string()],
            rows: vec![vec!["123 Main St".to_string()]],
        };
        let columns = batch.ensure_geocode_columns();
        let result = GeocodeResult::resolved(
            Coordinates {
                latitude: 42.5,
                longitude: -84.5,
            },
            Precision::City,
            Provider::Nominatim,
        );
        batch.apply_result(0, &columns, &result);

        assert_eq!(batch.rows[0][1], "42.5");
        assert_eq!(batch.rows[0][2], "-84.5");
        assert_eq!(batch.rows[0][3], "success");
        assert_eq!(batch.rows[0][4], "city");
        assert_eq!(batch.rows[0][5], "nominatim");
    }
}
