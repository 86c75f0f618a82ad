//! Google Places API (New) text search provider
//!
//! Wire format notes:
//!   - Text Search: POST {base}/places:searchText
//!   - API key via X-Goog-Api-Key, field projection via X-Goog-FieldMask
//!   - Pagination via nextPageToken in the response body

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, ProviderError};
use crate::traits::SearchProvider;
use crate::types::{CandidateRecord, Coordinate, ProviderQuery};

const DEFAULT_BASE_URL: &str = "https://places.googleapis.com/v1";
/// Pause between result pages; the token endpoint dislikes rapid-fire reads
const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Places API (New) client with built-in pagination
pub struct GooglePlacesProvider {
    api_key: String,
    base_url: String,
    page_size: u32,
    client: reqwest::Client,
}

impl GooglePlacesProvider {
    pub fn new(api_key: String, page_size: u32) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::InvalidConfiguration {
                field: format!("http client: {}", e),
            })?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size,
            client,
        })
    }

    /// Point the client at a different endpoint (test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search_page(
        &self,
        query: &ProviderQuery,
        page_token: Option<&str>,
    ) -> Result<SearchTextResponse, ProviderError> {
        let body = SearchTextRequest {
            text_query: &query.query,
            page_size: self.page_size,
            location_bias: LocationBias {
                circle: Circle {
                    center: LatLng {
                        latitude: query.center.latitude,
                        longitude: query.center.longitude,
                    },
                    radius: query.radius_m,
                },
            },
            page_token,
        };

        let response = self
            .client
            .post(format!("{}/places:searchText", self.base_url))
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", query.field_mask)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed {
                message: format!("response body: {}", e),
            })
    }
}

#[async_trait::async_trait]
impl SearchProvider for GooglePlacesProvider {
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<CandidateRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..query.max_pages.max(1) {
            let parsed = self.search_page(query, page_token.as_deref()).await?;
            let raw_count = parsed.places.len();
            records.extend(parsed.places.into_iter().filter_map(normalize_place));
            tracing::debug!(
                page = page + 1,
                raw = raw_count,
                total = records.len(),
                "places page fetched"
            );

            page_token = parsed.next_page_token;
            if page_token.is_none() {
                break;
            }
            tokio::time::sleep(PAGE_DELAY).await;
        }

        Ok(records)
    }
}

/// Map a Places HTTP status onto the engine's failure taxonomy
fn map_http_status(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited,
        403 => ProviderError::QuotaExceeded,
        400..=499 => ProviderError::Malformed {
            message: format!("HTTP {}: {}", status, truncate(&body, 200)),
        },
        _ => ProviderError::Transport {
            message: format!("HTTP {}", status),
        },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Flatten a raw Places object into a candidate record
///
/// Records without an id or a location cannot be deduplicated or gridded
/// and are dropped; that is a per-record issue, not a cell failure.
fn normalize_place(raw: RawPlace) -> Option<CandidateRecord> {
    let place_id = raw.id.filter(|id| !id.is_empty())?;
    let location = raw.location?;
    Some(CandidateRecord {
        place_id,
        name: raw.display_name.map(|d| d.text).unwrap_or_default(),
        location: Coordinate::new(location.latitude, location.longitude),
        categories: raw.types,
        metadata: serde_json::Value::Object(raw.extra),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextRequest<'a> {
    text_query: &'a str,
    page_size: u32,
    location_bias: LocationBias,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationBias {
    circle: Circle,
}

#[derive(Serialize)]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Serialize, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    id: Option<String>,
    display_name: Option<LocalizedText>,
    location: Option<LatLng>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: String,
}
