use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tripwise_core::Coordinates;

use crate::geocode::Geocoder;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

// Nominatim's usage policy requires an identifying User-Agent.
const CLIENT_USER_AGENT: &str = "tripwise-trip-planner/0.1";

/// OpenStreetMap Nominatim search client, limited to the single best match.
pub struct NominatimClient {
    http: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Nominatim serializes coordinates as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

impl SearchHit {
    fn coordinates(&self) -> Option<Coordinates> {
        let lat = self.lat.parse::<f64>().ok()?;
        let lng = self.lon.parse::<f64>().ok()?;
        if lat.is_finite() && lng.is_finite() {
            Some(Coordinates { lat, lng })
        } else {
            None
        }
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn lookup(&self, query: &str) -> anyhow::Result<Option<Coordinates>> {
        let url = format!("{}/search", self.base_url);
        let hits: Vec<SearchHit> = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT_LANGUAGE, "en")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(hits.first().and_then(SearchHit::coordinates))
    }
}
