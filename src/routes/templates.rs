//! Template listing and publishing routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::boards::board_error_to_status;
use crate::services::board;
use crate::services::templates::{self, Author, NewTemplate, TemplateError, TemplateQuery, TemplateRecord};
use crate::state::AppState;

pub(crate) fn template_error_to_status(err: &TemplateError) -> StatusCode {
    match err {
        TemplateError::EmptyTitle
        | TemplateError::TitleTooLong
        | TemplateError::DescriptionTooLong
        | TemplateError::EmptyItems => StatusCode::UNPROCESSABLE_ENTITY,
        TemplateError::NotFound(_) => StatusCode::NOT_FOUND,
        TemplateError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        TemplateError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
pub struct PublishBody {
    pub board_id: Uuid,
    pub author: Author,
    #[serde(flatten)]
    pub template: NewTemplate,
}

/// `GET /api/templates?search=&author=` — newest first.
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<TemplateRecord>>, ApiError> {
    let unavailable = TemplateError::Unavailable;
    let Some(pool) = state.pool.as_ref() else {
        return Err(ApiError::new(template_error_to_status(&unavailable), &unavailable));
    };
    let records = templates::list(pool, &query)
        .await
        .map_err(|e| ApiError::new(template_error_to_status(&e), &e))?;
    Ok(Json(records))
}

/// `POST /api/templates` — publish a board as a template.
pub async fn publish_template(
    State(state): State<AppState>,
    Json(body): Json<PublishBody>,
) -> Result<(StatusCode, Json<TemplateRecord>), ApiError> {
    let record = board::publish_template(&state, body.board_id, &body.author, &body.template)
        .await
        .map_err(|e| ApiError::new(board_error_to_status(&e), &e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[cfg(test)]
#[path = "templates_test.rs"]
mod tests;
