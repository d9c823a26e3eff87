//! Catalog client — anime search against the Jikan v4 API.
//!
//! Thin HTTP wrapper for `GET /anime?q=..&limit=..`. Pure parsing lives in
//! `parse_search_response` for testability. `CatalogSearch` is the seam the
//! search coordinator calls through, so tests swap in a scripted catalog.

use crate::board::model::{Item, ItemId};
use crate::config::CatalogConfig;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (DNS, connect, timeout).
    #[error("catalog request failed: {0}")]
    Request(String),

    /// The catalog answered with a non-success status.
    #[error("catalog response error: status {status}")]
    Response { status: u16, body: String },

    /// The response body was not the expected shape.
    #[error("catalog response parse failed: {0}")]
    Parse(String),
}

impl crate::error::ErrorCode for CatalogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Request(_) => "E_CATALOG_REQUEST",
            Self::Response { .. } => "E_CATALOG_RESPONSE",
            Self::Parse(_) => "E_CATALOG_PARSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Search the catalog by title.
    ///
    /// # Errors
    ///
    /// Returns a catalog error when the request, status, or body is bad.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Item>, CatalogError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct JikanClient {
    http: reqwest::Client,
    base_url: String,
}

impl JikanClient {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| CatalogError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned() })
    }
}

#[async_trait::async_trait]
impl CatalogSearch for JikanClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Item>, CatalogError> {
        let limit = limit.to_string();
        let response = self
            .http
            .get(format!("{}/anime", self.base_url))
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        if status != 200 {
            return Err(CatalogError::Response { status, body: text });
        }

        parse_search_response(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Anime>,
}

#[derive(serde::Deserialize)]
struct Anime {
    mal_id: i64,
    title: String,
    #[serde(default)]
    images: Option<Images>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(serde::Deserialize)]
struct Images {
    #[serde(default)]
    jpg: Option<ImageSet>,
}

#[derive(serde::Deserialize)]
struct ImageSet {
    #[serde(default)]
    image_url: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_search_response(json: &str) -> Result<Vec<Item>, CatalogError> {
    let response: SearchResponse = serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;

    Ok(response.data.into_iter().map(Item::from).collect())
}

impl From<Anime> for Item {
    fn from(anime: Anime) -> Self {
        let image_url = anime
            .images
            .and_then(|images| images.jpg)
            .and_then(|jpg| jpg.image_url)
            .unwrap_or_default();
        Self {
            id: ItemId(anime.mal_id),
            title: anime.title,
            image_url,
            score: anime.score,
            synopsis: anime.synopsis,
            year: anime.year,
            kind: anime.kind,
        }
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
