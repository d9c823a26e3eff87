//! Search service — debounced catalog search with stale-response suppression.
//!
//! DESIGN
//! ======
//! Every submission takes the next value of a per-session generation
//! counter. A submission waits out the debounce window, then checks that no
//! newer submission arrived; only then does it call the catalog. When the
//! catalog answers, the generation is checked again: a response for an older
//! query is dropped, never merged with newer results.
//!
//! Queries whose trimmed length is below the configured minimum are never
//! sent. Catalog failures come back as `SearchOutcome::ConnectionError` and
//! are not retried; the next submission is the retry.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, warn};

use crate::board::model::Item;
use crate::config::SearchConfig;
use crate::services::catalog::{CatalogError, CatalogSearch};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query shorter than {min} characters")]
    TooShort { min: usize },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl crate::error::ErrorCode for SearchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TooShort { .. } => "E_QUERY_TOO_SHORT",
            Self::Catalog(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::TooShort { .. } => false,
            Self::Catalog(e) => e.retryable(),
        }
    }
}

/// Result of one search submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    Results { generation: u64, query: String, items: Vec<Item> },
    TooShort { min_query_len: usize },
    Superseded { generation: u64 },
    ConnectionError { generation: u64, message: String },
}

// =============================================================================
// ONE-SHOT SEARCH
// =============================================================================

/// Trim and length-check a query, then hit the catalog once.
///
/// # Errors
///
/// Returns `TooShort` for queries below the minimum, or the catalog error.
pub async fn search_now(catalog: &dyn CatalogSearch, config: &SearchConfig, query: &str) -> Result<Vec<Item>, SearchError> {
    let query = query.trim();
    if query.chars().count() < config.min_query_len {
        return Err(SearchError::TooShort { min: config.min_query_len });
    }
    Ok(catalog.search(query, config.limit).await?)
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct SearchCoordinator {
    config: SearchConfig,
    generation: AtomicU64,
    latest: Mutex<Option<SearchOutcome>>,
}

impl SearchCoordinator {
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self { config, generation: AtomicU64::new(0), latest: Mutex::new(None) }
    }

    /// Generation of the most recent submission.
    #[cfg(test)]
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Last outcome published by a current (non-superseded) submission.
    #[must_use]
    pub fn latest(&self) -> Option<SearchOutcome> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    /// Submit a query typed by the user.
    pub async fn submit(&self, catalog: &dyn CatalogSearch, query: &str) -> SearchOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let trimmed = query.trim();

        if trimmed.chars().count() < self.config.min_query_len {
            let outcome = SearchOutcome::TooShort { min_query_len: self.config.min_query_len };
            self.publish(generation, &outcome);
            return outcome;
        }

        if !self.config.debounce.is_zero() {
            tokio::time::sleep(self.config.debounce).await;
        }
        if self.is_stale(generation) {
            debug!(generation, "search superseded before send");
            return SearchOutcome::Superseded { generation };
        }

        let result = catalog.search(trimmed, self.config.limit).await;
        if self.is_stale(generation) {
            debug!(generation, "search response dropped as stale");
            return SearchOutcome::Superseded { generation };
        }

        let outcome = match result {
            Ok(items) => SearchOutcome::Results { generation, query: trimmed.to_owned(), items },
            Err(e) => {
                warn!(error = %e, generation, "catalog search failed");
                SearchOutcome::ConnectionError { generation, message: e.to_string() }
            }
        };
        self.publish(generation, &outcome);
        outcome
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn publish(&self, generation: u64, outcome: &SearchOutcome) {
        if let Ok(mut latest) = self.latest.lock() {
            if !self.is_stale(generation) {
                *latest = Some(outcome.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
