//! Structured-data fallback provider.
//!
//! When live scraping fails or comes back thin, the orchestrator can query a
//! places text-search API instead. This is a plain HTTP JSON call; results
//! carry [`LeadSource::ApiFallback`] provenance so ranking and cache policy
//! can tell them apart from scraped leads.

use std::time::Duration;

use serde::Deserialize;

use crate::rate_limit::retry_with_backoff;
use leadscout_core::{Lead, LeadSource};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum PlacesError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from places API")]
    UnexpectedStatus { status: u16 },

    #[error("places API rejected the request: {status}")]
    Api { status: String },
}

fn is_retriable(err: &PlacesError) -> bool {
    matches!(
        err,
        PlacesError::Http(_) | PlacesError::UnexpectedStatus { status: 500..=599 }
    )
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    formatted_phone_number: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    rating: f64,
    #[serde(default)]
    user_ratings_total: u32,
    #[serde(default)]
    place_id: String,
}

impl PlaceResult {
    fn into_lead(self) -> Lead {
        let mut lead = Lead {
            name: self.name.trim().to_string(),
            address: self.formatted_address,
            phone: self.formatted_phone_number,
            website: self.website,
            rating: self.rating.clamp(0.0, 5.0),
            review_count: self.user_ratings_total,
            place_id: self.place_id,
            source: LeadSource::ApiFallback,
            ..Lead::default()
        };
        lead.recompute_quality();
        lead
    }
}

/// Minimal text-search client for the fallback provider.
pub struct PlacesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl PlacesClient {
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: String, timeout_secs: u64, user_agent: &str) -> Result<Self, PlacesError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(PlacesClient {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 2,
        })
    }

    /// Point the client at a different API origin. Test seam.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Text-search for businesses; at most `max_results` leads. Results
    /// without a usable name (fewer than three characters) are dropped.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::UnexpectedStatus`] — non-2xx HTTP status (5xx retried).
    /// - [`PlacesError::Api`] — the API answered with an error status field.
    /// - [`PlacesError::Http`] — network failure after retries.
    pub async fn search(
        &self,
        business_type: &str,
        location: &str,
        max_results: usize,
    ) -> Result<Vec<Lead>, PlacesError> {
        let url = format!("{}/maps/api/place/textsearch/json", self.base_url);
        let query = format!("{business_type} in {location}");

        let response: PlacesResponse = retry_with_backoff(
            self.max_retries,
            Duration::from_millis(500),
            is_retriable,
            || async {
                let response = self
                    .http
                    .get(&url)
                    .query(&[("query", query.as_str()), ("key", self.api_key.as_str())])
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(PlacesError::UnexpectedStatus {
                        status: status.as_u16(),
                    });
                }
                Ok(response.json::<PlacesResponse>().await?)
            },
        )
        .await?;

        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(response
                .results
                .into_iter()
                .map(PlaceResult::into_lead)
                .filter(|lead| lead.name.chars().count() >= 3)
                .take(max_results)
                .collect()),
            other => Err(PlacesError::Api {
                status: other.to_string(),
            }),
        }
    }
}
