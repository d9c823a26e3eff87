//! Board session routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::board::BoardAction;
use crate::board::drag::DragEntity;
use crate::board::model::ItemId;
use crate::error::ApiError;
use crate::routes::templates::template_error_to_status;
use crate::services::board::{self, BoardServiceError, BoardView, ConfirmStep, Mutation};
use crate::services::search::SearchOutcome;
use crate::state::AppState;

pub(crate) fn board_error_to_status(err: &BoardServiceError) -> StatusCode {
    match err {
        BoardServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        BoardServiceError::Store(_) | BoardServiceError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BoardServiceError::Template(e) => template_error_to_status(e),
    }
}

fn api_error(err: BoardServiceError) -> ApiError {
    ApiError::new(board_error_to_status(&err), &err)
}

#[derive(Deserialize)]
pub struct DragEndBody {
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Deserialize)]
pub struct HoverBody {
    #[serde(default)]
    pub item_id: Option<ItemId>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// `POST /api/boards` — create a board with default rows.
pub async fn create_board(State(state): State<AppState>) -> Result<(StatusCode, Json<BoardView>), ApiError> {
    let view = board::create_board(&state).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/boards/:id` — current board view.
pub async fn get_board(State(state): State<AppState>, Path(board_id): Path<Uuid>) -> Result<Json<BoardView>, ApiError> {
    let view = board::view(&state, board_id).await.map_err(api_error)?;
    Ok(Json(view))
}

/// `POST /api/boards/:id/actions` — apply one board action.
pub async fn dispatch_action(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(action): Json<BoardAction>,
) -> Result<Json<Mutation>, ApiError> {
    let result = board::dispatch(&state, board_id, action).await.map_err(api_error)?;
    Ok(Json(result))
}

/// `POST /api/boards/:id/drag/start`
pub async fn drag_start(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(entity): Json<DragEntity>,
) -> Result<Json<Mutation>, ApiError> {
    let result = board::drag_start(&state, board_id, entity).await.map_err(api_error)?;
    Ok(Json(result))
}

/// `POST /api/boards/:id/drag/end` — drop over `target`, or nowhere.
pub async fn drag_end(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(body): Json<DragEndBody>,
) -> Result<Json<Mutation>, ApiError> {
    let result = board::drag_end(&state, board_id, body.target).await.map_err(api_error)?;
    Ok(Json(result))
}

/// `POST /api/boards/:id/drag/cancel`
pub async fn drag_cancel(State(state): State<AppState>, Path(board_id): Path<Uuid>) -> Result<Json<Mutation>, ApiError> {
    let result = board::drag_cancel(&state, board_id).await.map_err(api_error)?;
    Ok(Json(result))
}

/// `POST /api/boards/:id/hover` — `{ "item_id": n }` to hover, `{}` to leave.
pub async fn hover(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(body): Json<HoverBody>,
) -> Result<Json<Mutation>, ApiError> {
    let result = board::hover(&state, board_id, body.item_id).await.map_err(api_error)?;
    Ok(Json(result))
}

/// `POST /api/boards/:id/confirm` — request, confirm, or cancel a reset or
/// row deletion.
pub async fn confirm(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(step): Json<ConfirmStep>,
) -> Result<Json<Mutation>, ApiError> {
    let result = board::confirm(&state, board_id, step).await.map_err(api_error)?;
    Ok(Json(result))
}

/// `GET /api/boards/:id/search?q=` — debounced search. Superseded and failed
/// searches still answer 200 with their status.
pub async fn search(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let outcome = board::search(&state, board_id, &params.q).await.map_err(api_error)?;
    Ok(Json(outcome))
}

/// `POST /api/boards/:id/templates/:template_id/import`
pub async fn import_template(
    State(state): State<AppState>,
    Path((board_id, template_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Mutation>, ApiError> {
    let result = board::import_template(&state, board_id, template_id)
        .await
        .map_err(api_error)?;
    Ok(Json(result))
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
