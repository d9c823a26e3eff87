//! Board service — session lifecycle, mutation, and persistence.
//!
//! DESIGN
//! ======
//! Sessions are hydrated from the key-value store on first access and then
//! kept in memory until they sit idle past the configured TTL. Only clean
//! sessions are evicted; the store already holds their latest revision. Every operation that changes the board follows the same
//! path: take the write lock, apply one synchronous operation, encode the
//! snapshot, release the lock, then write the snapshot before returning.
//!
//! Drag, hover, and confirmation requests go through the same path but only
//! persist when the board itself changed.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is reported to the caller with the in-memory board left
//! as is. Snapshots carry a revision, and a write is skipped when a newer
//! revision has already landed, so a slow write never clobbers a newer one.

use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::board::confirm::PendingAction;
use crate::board::drag::{DragEntity, DragState};
use crate::board::model::{Item, ItemId, Row, RowId};
use crate::board::snapshot::{self, BoardFields};
use crate::board::{Board, BoardAction, BoardStats};
use crate::services::persistence::StoreError;
use crate::services::search::SearchOutcome;
use crate::services::templates::{self, Author, NewTemplate, TemplateError, TemplateRecord};
use crate::state::{AppState, BoardSession};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BoardServiceError {
    #[error("board not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("snapshot encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl crate::error::ErrorCode for BoardServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
            Self::Store(e) => e.error_code(),
            Self::Encode(_) => "E_ENCODE",
            Self::Template(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            Self::Template(e) => e.retryable(),
            Self::NotFound(_) | Self::Encode(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub id: RowId,
    pub label: String,
    pub color: String,
    pub items: Vec<Item>,
}

/// Everything a client needs to render a board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub id: Uuid,
    pub title: String,
    pub rows: Vec<RowView>,
    pub bank: Vec<Item>,
    pub stats: BoardStats,
    pub pending: PendingAction,
    pub drag: DragState,
    pub preview: Option<Item>,
    /// Outcome of the session's most recent current search, if any.
    pub search: Option<SearchOutcome>,
}

/// Result of a mutating request.
#[derive(Debug, Clone, Serialize)]
pub struct Mutation {
    pub changed: bool,
    pub board: BoardView,
}

/// Confirmation step requested by a client.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ConfirmStep {
    Request { action: PendingAction },
    Confirm,
    Cancel,
}

fn build_view(board_id: Uuid, session: &mut BoardSession) -> BoardView {
    let now = Instant::now();
    session.last_access = now;
    let preview = session.preview.visible(now).cloned();
    let board = &session.board;
    BoardView {
        id: board_id,
        title: board.title().to_owned(),
        rows: board
            .rows()
            .iter()
            .map(|Row { id, label, color }| RowView {
                id: id.clone(),
                label: label.clone(),
                color: color.clone(),
                items: board.row_items(id).to_vec(),
            })
            .collect(),
        bank: board.bank().to_vec(),
        stats: board.stats(),
        pending: session.pending.clone(),
        drag: session.drag.clone(),
        preview,
        search: session.search.latest(),
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Create a board with default rows, persist it, and open its session.
///
/// # Errors
///
/// Returns a store error if the initial snapshot cannot be written.
pub async fn create_board(state: &AppState) -> Result<BoardView, BoardServiceError> {
    let board_id = Uuid::new_v4();
    let board = Board::new();
    let fields = BoardFields::encode(&board)?;
    state.store.save(board_id, &fields).await?;

    let mut session = BoardSession::new(board, &state.config);
    let view = build_view(board_id, &mut session);
    state.boards.write().await.insert(board_id, session);

    info!(%board_id, "board created");
    Ok(view)
}

/// Make sure a session exists for the board, hydrating it from the store.
///
/// # Errors
///
/// Returns `NotFound` if the store holds nothing for this board.
pub async fn ensure_loaded(state: &AppState, board_id: Uuid) -> Result<(), BoardServiceError> {
    if state.boards.read().await.contains_key(&board_id) {
        return Ok(());
    }

    let fields = state.store.load(board_id).await?;
    if fields.is_empty() {
        return Err(BoardServiceError::NotFound(board_id));
    }
    let board = snapshot::decode(&fields);

    let mut boards = state.boards.write().await;
    boards
        .entry(board_id)
        .or_insert_with(|| BoardSession::new(board, &state.config));
    info!(%board_id, "board hydrated");
    Ok(())
}

/// Current view of a board.
///
/// # Errors
///
/// Returns `NotFound` for an unknown board.
pub async fn view(state: &AppState, board_id: Uuid) -> Result<BoardView, BoardServiceError> {
    ensure_loaded(state, board_id).await?;
    let mut boards = state.boards.write().await;
    let session = boards
        .get_mut(&board_id)
        .ok_or(BoardServiceError::NotFound(board_id))?;
    Ok(build_view(board_id, session))
}

/// Drop sessions idle past the TTL whose changes have all been written.
/// Returns how many were evicted.
pub async fn evict_idle(state: &AppState, now: Instant) -> usize {
    let ttl = state.config.session_idle_ttl;
    let mut boards = state.boards.write().await;
    let before = boards.len();
    boards.retain(|board_id, session| {
        if now.saturating_duration_since(session.last_access) < ttl {
            return true;
        }
        if !session.is_clean() {
            debug!(%board_id, revision = session.revision, "idle board kept with unwritten changes");
            return true;
        }
        false
    });
    let evicted = before - boards.len();
    if evicted > 0 {
        info!(evicted, remaining = boards.len(), "evicted idle boards from memory");
    }
    evicted
}

/// Spawn the background task that evicts idle sessions.
pub fn spawn_eviction_task(state: AppState) -> JoinHandle<()> {
    let every = state.config.session_sweep_interval;
    info!(
        sweep_secs = every.as_secs(),
        idle_ttl_secs = state.config.session_idle_ttl.as_secs(),
        "board eviction configured"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            evict_idle(&state, Instant::now()).await;
        }
    })
}

// =============================================================================
// MUTATION
// =============================================================================

/// Apply one operation to a session and persist the board if it changed.
///
/// `op` returns whether the board changed.
///
/// # Errors
///
/// Returns `NotFound` for an unknown board, or a store error if the write
/// fails.
pub async fn mutate<F>(state: &AppState, board_id: Uuid, op: F) -> Result<Mutation, BoardServiceError>
where
    F: FnOnce(&mut BoardSession) -> bool,
{
    ensure_loaded(state, board_id).await?;

    let (changed, view, pending_write) = {
        let mut boards = state.boards.write().await;
        let session = boards
            .get_mut(&board_id)
            .ok_or(BoardServiceError::NotFound(board_id))?;

        let changed = op(session);
        let pending_write = if changed {
            if let Err(violation) = session.board.check_invariants() {
                error!(%board_id, %violation, "board invariant broken after mutation");
            }
            session.revision += 1;
            let fields = BoardFields::encode(&session.board)?;
            Some((session.revision, fields, session.persisted.clone()))
        } else {
            None
        };
        (changed, build_view(board_id, session), pending_write)
    };

    if let Some((revision, fields, persisted)) = pending_write {
        write_snapshot(state, board_id, revision, &fields, &persisted).await?;
    }

    debug!(%board_id, changed, "board mutation applied");
    Ok(Mutation { changed, board: view })
}

/// Write one snapshot unless a newer revision has already landed. The
/// `persisted` lock is held across the write. Returns whether the store was
/// written.
///
/// # Errors
///
/// Returns the store error; the recorded revision is left unchanged.
pub(crate) async fn write_snapshot(
    state: &AppState,
    board_id: Uuid,
    revision: u64,
    fields: &BoardFields,
    persisted: &Mutex<u64>,
) -> Result<bool, StoreError> {
    let mut written = persisted.lock().await;
    if *written >= revision {
        debug!(%board_id, revision, written = *written, "stale snapshot skipped");
        return Ok(false);
    }
    if let Err(e) = state.store.save(board_id, fields).await {
        warn!(%board_id, revision, error = %e, "board persist failed");
        return Err(e);
    }
    *written = revision;
    Ok(true)
}

/// Dispatch one board action.
///
/// # Errors
///
/// See [`mutate`].
pub async fn dispatch(state: &AppState, board_id: Uuid, action: BoardAction) -> Result<Mutation, BoardServiceError> {
    mutate(state, board_id, |session| {
        if let BoardAction::RemoveItem { item_id } = &action {
            session.preview.forget(*item_id);
        }
        session.board.apply(action)
    })
    .await
}

// =============================================================================
// GESTURES
// =============================================================================

/// Begin a drag gesture.
///
/// # Errors
///
/// See [`mutate`].
pub async fn drag_start(state: &AppState, board_id: Uuid, entity: DragEntity) -> Result<Mutation, BoardServiceError> {
    mutate(state, board_id, |session| {
        session.drag.start(&session.board, entity, &mut session.preview);
        false
    })
    .await
}

/// Finish a drag gesture, optionally over a drop target.
///
/// # Errors
///
/// See [`mutate`].
pub async fn drag_end(state: &AppState, board_id: Uuid, target: Option<String>) -> Result<Mutation, BoardServiceError> {
    mutate(state, board_id, |session| session.drag.end(&mut session.board, target.as_deref())).await
}

/// Abandon a drag gesture.
///
/// # Errors
///
/// See [`mutate`].
pub async fn drag_cancel(state: &AppState, board_id: Uuid) -> Result<Mutation, BoardServiceError> {
    mutate(state, board_id, |session| {
        session.drag.cancel();
        false
    })
    .await
}

/// Start hovering an item on the board, or stop hovering with `None`.
///
/// # Errors
///
/// See [`mutate`].
pub async fn hover(state: &AppState, board_id: Uuid, item_id: Option<ItemId>) -> Result<Mutation, BoardServiceError> {
    mutate(state, board_id, |session| {
        let hovered = item_id.and_then(|id| session.board.find_item(id).cloned());
        match hovered {
            Some(item) => {
                let dragging = session.drag.is_dragging();
                session.preview.hover_start(item, Instant::now(), dragging);
            }
            None => session.preview.hover_end(),
        }
        false
    })
    .await
}

/// Drive the two-phase confirmation for reset and row deletion.
///
/// # Errors
///
/// See [`mutate`].
pub async fn confirm(state: &AppState, board_id: Uuid, step: ConfirmStep) -> Result<Mutation, BoardServiceError> {
    let result = mutate(state, board_id, |session| match step {
        ConfirmStep::Request { action } => {
            session.pending.request(action);
            false
        }
        ConfirmStep::Confirm => {
            let changed = session.pending.confirm(&mut session.board);
            if changed {
                session.preview.hover_end();
            }
            changed
        }
        ConfirmStep::Cancel => {
            session.pending.cancel();
            false
        }
    })
    .await?;
    if result.changed {
        info!(%board_id, "destructive board action confirmed");
    }
    Ok(result)
}

// =============================================================================
// SEARCH
// =============================================================================

/// Debounced search on behalf of a board session. The board lock is not
/// held while waiting on the catalog.
///
/// # Errors
///
/// Returns `NotFound` for an unknown board.
pub async fn search(state: &AppState, board_id: Uuid, query: &str) -> Result<SearchOutcome, BoardServiceError> {
    ensure_loaded(state, board_id).await?;
    let coordinator = {
        let boards = state.boards.read().await;
        boards
            .get(&board_id)
            .ok_or(BoardServiceError::NotFound(board_id))?
            .search
            .clone()
    };
    Ok(coordinator.submit(state.catalog.as_ref(), query).await)
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// Load a published template into a board, replacing its contents.
///
/// # Errors
///
/// Returns `Unavailable` without a template store, `NotFound` for an unknown
/// template, or a store error if the board cannot be persisted.
pub async fn import_template(state: &AppState, board_id: Uuid, template_id: Uuid) -> Result<Mutation, BoardServiceError> {
    let pool = state.pool.as_ref().ok_or(TemplateError::Unavailable)?;
    ensure_loaded(state, board_id).await?;
    let template = templates::get(pool, template_id).await?;

    let result = mutate(state, board_id, |session| {
        session.board.import_template(&template.title, template.items);
        session.drag.cancel();
        session.pending.cancel();
        session.preview.hover_end();
        true
    })
    .await?;
    info!(%board_id, %template_id, "template imported");
    Ok(result)
}

/// Publish a board's items, flattened rows first, as a template.
///
/// # Errors
///
/// Returns `Unavailable` without a template store, `NotFound` for an unknown
/// board, or any publish error.
pub async fn publish_template(
    state: &AppState,
    board_id: Uuid,
    author: &Author,
    template: &NewTemplate,
) -> Result<TemplateRecord, BoardServiceError> {
    let pool = state.pool.as_ref().ok_or(TemplateError::Unavailable)?;
    ensure_loaded(state, board_id).await?;
    let items = {
        let boards = state.boards.read().await;
        boards
            .get(&board_id)
            .ok_or(BoardServiceError::NotFound(board_id))?
            .board
            .flattened_items()
    };
    Ok(templates::publish(pool, author, template, items).await?)
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
