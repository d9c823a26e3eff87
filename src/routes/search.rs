//! Direct catalog search, without debounce or supersession.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use crate::board::model::Item;
use crate::error::ApiError;
use crate::routes::boards::SearchParams;
use crate::services::catalog::CatalogError;
use crate::services::search::{self, SearchError};
use crate::state::AppState;

pub(crate) fn search_error_to_status(err: &SearchError) -> StatusCode {
    match err {
        SearchError::TooShort { .. } => StatusCode::BAD_REQUEST,
        SearchError::Catalog(CatalogError::HttpClientBuild(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        SearchError::Catalog(_) => StatusCode::BAD_GATEWAY,
    }
}

/// `GET /api/catalog/search?q=`
pub async fn catalog_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = search::search_now(state.catalog.as_ref(), &state.config.search, &params.q)
        .await
        .map_err(|e| ApiError::new(search_error_to_status(&e), &e))?;
    Ok(Json(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::app;
    use crate::state::test_helpers::{self, StubCatalog};
    use axum::body::{self, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[test]
    fn search_error_to_status_maps_variants() {
        assert_eq!(search_error_to_status(&SearchError::TooShort { min: 3 }), StatusCode::BAD_REQUEST);
        let err = SearchError::Catalog(CatalogError::Response { status: 500, body: String::new() });
        assert_eq!(search_error_to_status(&err), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn catalog_search_returns_items() {
        let router = app(test_helpers::test_app_state());
        let request = Request::get("/api/catalog/search?q=akira").body(Body::empty()).expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let items: Vec<Item> = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "akira one");
    }

    #[tokio::test]
    async fn catalog_search_short_query_is_not_sent() {
        let catalog = Arc::new(StubCatalog::default());
        let router = app(test_helpers::test_app_state_with_catalog(catalog.clone()));
        let request = Request::get("/api/catalog/search?q=ak").body(Body::empty()).expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test]
    async fn catalog_failure_is_bad_gateway() {
        let catalog = Arc::new(StubCatalog { fail: true, ..StubCatalog::default() });
        let router = app(test_helpers::test_app_state_with_catalog(catalog));
        let request = Request::get("/api/catalog/search?q=akira").body(Body::empty()).expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["code"], "E_CATALOG_REQUEST");
        assert_eq!(json["retryable"], true);
    }
}
