use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use super::*;
use crate::board::drag::DragSource;
use crate::board::model::{BANK_KEY, ContainerId};
use crate::board::snapshot::TITLE_KEY;
use crate::error::ErrorCode;
use crate::services::persistence::{KvStore, MemoryKvStore};
use crate::state::test_helpers::{self, StubCatalog, dummy_item};

struct FailingStore;

#[async_trait::async_trait]
impl KvStore for FailingStore {
    async fn load(&self, _board_id: Uuid) -> Result<HashMap<String, String>, StoreError> {
        Ok(HashMap::new())
    }

    async fn save(&self, _board_id: Uuid, _fields: &BoardFields) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Store whose first save waits on `gate`. Records the title of every
/// snapshot in write order.
#[derive(Default)]
struct GatedStore {
    inner: MemoryKvStore,
    gate: Notify,
    entered: AtomicBool,
    titles: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl KvStore for GatedStore {
    async fn load(&self, board_id: Uuid) -> Result<HashMap<String, String>, StoreError> {
        self.inner.load(board_id).await
    }

    async fn save(&self, board_id: Uuid, fields: &BoardFields) -> Result<(), StoreError> {
        if !self.entered.swap(true, Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.titles.lock().unwrap().push(fields.title.clone());
        self.inner.save(board_id, fields).await
    }
}

async fn select(state: &AppState, board_id: Uuid, id: i64) -> Mutation {
    dispatch(state, board_id, BoardAction::SelectItem { item: dummy_item(id) }).await.unwrap()
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn create_board_persists_defaults() {
    let state = test_helpers::test_app_state();
    let view = create_board(&state).await.unwrap();

    assert_eq!(view.rows.len(), 5);
    assert!(view.bank.is_empty());
    let fields = state.store.load(view.id).await.unwrap();
    assert_eq!(fields.len(), 3);
    assert!(state.boards.read().await.contains_key(&view.id));
}

#[tokio::test]
async fn unknown_board_is_not_found() {
    let state = test_helpers::test_app_state();
    let err = view(&state, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, BoardServiceError::NotFound(_)));
    assert_eq!(err.error_code(), "E_BOARD_NOT_FOUND");
}

#[tokio::test]
async fn evicted_board_hydrates_from_store() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 7).await;
    dispatch(&state, board_id, BoardAction::SetTitle { title: "Winter 2024".into() }).await.unwrap();

    state.boards.write().await.remove(&board_id);

    let restored = view(&state, board_id).await.unwrap();
    assert_eq!(restored.title, "Winter 2024");
    assert_eq!(restored.bank.len(), 1);
    assert_eq!(restored.bank[0].id, ItemId(7));
}

#[tokio::test]
async fn idle_boards_are_evicted_and_rehydrate() {
    let state = test_helpers::test_app_state();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(create_board(&state).await.unwrap().id);
    }
    select(&state, ids[0], 11).await;

    let ttl = state.config.session_idle_ttl;
    assert_eq!(evict_idle(&state, Instant::now()).await, 0);
    assert_eq!(evict_idle(&state, Instant::now() + ttl).await, 3);
    assert!(state.boards.read().await.is_empty());

    let restored = view(&state, ids[0]).await.unwrap();
    assert_eq!(restored.bank[0].id, ItemId(11));
}

#[tokio::test]
async fn recently_touched_board_is_kept() {
    let state = test_helpers::test_app_state();
    let idle = create_board(&state).await.unwrap().id;
    let active = create_board(&state).await.unwrap().id;

    let sweep_at = Instant::now() + state.config.session_idle_ttl;
    state.boards.write().await.get_mut(&active).unwrap().last_access = sweep_at;

    assert_eq!(evict_idle(&state, sweep_at).await, 1);
    let boards = state.boards.read().await;
    assert!(!boards.contains_key(&idle));
    assert!(boards.contains_key(&active));
}

#[tokio::test]
async fn board_with_unwritten_change_is_not_evicted() {
    let state = AppState::new(
        None,
        Arc::new(FailingStore),
        Arc::new(StubCatalog::default()),
        test_helpers::test_config(),
    );
    let board_id = test_helpers::seed_board(&state).await;
    dispatch(&state, board_id, BoardAction::AddRow).await.unwrap_err();

    let later = Instant::now() + state.config.session_idle_ttl;
    assert_eq!(evict_idle(&state, later).await, 0);
    assert_eq!(state.boards.read().await[&board_id].board.rows().len(), 6);
}

// =============================================================================
// MUTATION
// =============================================================================

#[tokio::test]
async fn dispatch_persists_every_change() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;

    let result = dispatch(&state, board_id, BoardAction::SetTitle { title: "Seasonal".into() }).await.unwrap();
    assert!(result.changed);

    let fields = state.store.load(board_id).await.unwrap();
    assert_eq!(fields.get(TITLE_KEY).map(String::as_str), Some("Seasonal"));
}

#[tokio::test]
async fn no_op_dispatch_reports_unchanged() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    assert!(select(&state, board_id, 1).await.changed);
    assert!(!select(&state, board_id, 1).await.changed);

    let revision = state.boards.read().await[&board_id].revision;
    assert_eq!(revision, 1);
}

#[tokio::test]
async fn move_to_unknown_container_is_silent_no_op() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 1).await;

    let result = dispatch(
        &state,
        board_id,
        BoardAction::MoveItem {
            item_id: ItemId(1),
            from: ContainerId::Bank,
            to: ContainerId::from_key("tier-missing"),
            to_index: None,
        },
    )
    .await
    .unwrap();
    assert!(!result.changed);
    assert_eq!(result.board.bank.len(), 1);
}

#[tokio::test]
async fn persist_failure_keeps_in_memory_change() {
    let state = AppState::new(
        None,
        Arc::new(FailingStore),
        Arc::new(StubCatalog::default()),
        test_helpers::test_config(),
    );
    let board_id = test_helpers::seed_board(&state).await;

    let err = dispatch(&state, board_id, BoardAction::AddRow).await.unwrap_err();
    assert_eq!(err.error_code(), "E_STORE");
    assert!(err.retryable());
    assert_eq!(state.boards.read().await[&board_id].board.rows().len(), 6);
}

#[tokio::test]
async fn snapshots_land_in_change_order() {
    let store = Arc::new(GatedStore::default());
    let state = AppState::new(None, store.clone(), Arc::new(StubCatalog::default()), test_helpers::test_config());
    let board_id = test_helpers::seed_board(&state).await;

    let first = tokio::spawn({
        let state = state.clone();
        async move { dispatch(&state, board_id, BoardAction::SetTitle { title: "first".into() }).await }
    });
    while !store.entered.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }

    let second = tokio::spawn({
        let state = state.clone();
        async move { dispatch(&state, board_id, BoardAction::SetTitle { title: "second".into() }).await }
    });
    while state.boards.read().await[&board_id].revision < 2 {
        tokio::task::yield_now().await;
    }
    assert!(store.titles.lock().unwrap().is_empty());

    store.gate.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(*store.titles.lock().unwrap(), vec!["first", "second"]);
    let fields = store.load(board_id).await.unwrap();
    assert_eq!(fields.get(TITLE_KEY).map(String::as_str), Some("second"));
    assert!(state.boards.read().await[&board_id].is_clean());
}

#[tokio::test]
async fn stale_snapshot_does_not_overwrite_newer() {
    let state = test_helpers::test_app_state();
    let board_id = Uuid::new_v4();
    let persisted = Mutex::new(0);

    let mut board = Board::new();
    board.set_title("newer");
    let newer = BoardFields::encode(&board).unwrap();
    board.set_title("older");
    let older = BoardFields::encode(&board).unwrap();

    assert!(write_snapshot(&state, board_id, 2, &newer, &persisted).await.unwrap());
    assert!(!write_snapshot(&state, board_id, 1, &older, &persisted).await.unwrap());
    assert!(!write_snapshot(&state, board_id, 2, &older, &persisted).await.unwrap());

    assert_eq!(*persisted.lock().await, 2);
    let fields = state.store.load(board_id).await.unwrap();
    assert_eq!(fields.get(TITLE_KEY).map(String::as_str), Some("newer"));
}

#[tokio::test]
async fn failed_write_keeps_recorded_revision() {
    let state = AppState::new(
        None,
        Arc::new(FailingStore),
        Arc::new(StubCatalog::default()),
        test_helpers::test_config(),
    );
    let persisted = Mutex::new(3);
    let fields = BoardFields::encode(&Board::new()).unwrap();

    assert!(write_snapshot(&state, Uuid::new_v4(), 4, &fields, &persisted).await.is_err());
    assert_eq!(*persisted.lock().await, 3);
}

// =============================================================================
// GESTURES
// =============================================================================

#[tokio::test]
async fn drag_bank_item_onto_row() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 3).await;

    let started = drag_start(&state, board_id, DragEntity::Item { source: DragSource::Existing(ItemId(3)) })
        .await
        .unwrap();
    assert!(!started.changed);
    assert!(started.board.drag.is_dragging());

    let ended = drag_end(&state, board_id, Some("S".into())).await.unwrap();
    assert!(ended.changed);
    assert!(!ended.board.drag.is_dragging());
    assert_eq!(ended.board.rows[0].items[0].id, ItemId(3));
    assert!(ended.board.bank.is_empty());

    state.boards.write().await.remove(&board_id);
    let restored = view(&state, board_id).await.unwrap();
    assert_eq!(restored.rows[0].items.len(), 1);
}

#[tokio::test]
async fn drag_external_item_onto_bank() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;

    drag_start(&state, board_id, DragEntity::Item { source: DragSource::External(dummy_item(9)) })
        .await
        .unwrap();
    let ended = drag_end(&state, board_id, Some(BANK_KEY.into())).await.unwrap();
    assert!(ended.changed);
    assert_eq!(ended.board.stats.bank, 1);
}

#[tokio::test]
async fn drag_end_without_target_is_no_op() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    drag_start(&state, board_id, DragEntity::Row { row_id: RowId::new("S") }).await.unwrap();

    let ended = drag_end(&state, board_id, None).await.unwrap();
    assert!(!ended.changed);
    assert_eq!(ended.board.rows[0].id, RowId::new("S"));
}

#[tokio::test]
async fn drag_cancel_returns_to_idle() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    drag_start(&state, board_id, DragEntity::Row { row_id: RowId::new("A") }).await.unwrap();
    let cancelled = drag_cancel(&state, board_id).await.unwrap();
    assert!(!cancelled.board.drag.is_dragging());
}

#[tokio::test]
async fn hover_shows_preview_and_drag_suspends_it() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 4).await;

    let hovered = hover(&state, board_id, Some(ItemId(4))).await.unwrap();
    assert_eq!(hovered.board.preview.map(|i| i.id), Some(ItemId(4)));

    let dragging = drag_start(&state, board_id, DragEntity::Item { source: DragSource::Existing(ItemId(4)) })
        .await
        .unwrap();
    assert!(dragging.board.preview.is_none());

    let ignored = hover(&state, board_id, Some(ItemId(4))).await.unwrap();
    assert!(ignored.board.preview.is_none());
}

#[tokio::test]
async fn removing_previewed_item_clears_preview() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 5).await;
    hover(&state, board_id, Some(ItemId(5))).await.unwrap();

    let removed = dispatch(&state, board_id, BoardAction::RemoveItem { item_id: ItemId(5) }).await.unwrap();
    assert!(removed.changed);
    assert!(removed.board.preview.is_none());
}

// =============================================================================
// CONFIRMATION
// =============================================================================

#[tokio::test]
async fn reset_requires_confirmation() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 1).await;

    let requested = confirm(&state, board_id, ConfirmStep::Request { action: PendingAction::Reset }).await.unwrap();
    assert!(!requested.changed);
    assert_eq!(requested.board.pending, PendingAction::Reset);
    assert_eq!(requested.board.bank.len(), 1);

    let cancelled = confirm(&state, board_id, ConfirmStep::Cancel).await.unwrap();
    assert_eq!(cancelled.board.pending, PendingAction::None);
    assert_eq!(cancelled.board.bank.len(), 1);

    confirm(&state, board_id, ConfirmStep::Request { action: PendingAction::Reset }).await.unwrap();
    let confirmed = confirm(&state, board_id, ConfirmStep::Confirm).await.unwrap();
    assert!(confirmed.changed);
    assert!(confirmed.board.bank.is_empty());
    assert_eq!(confirmed.board.title, crate::board::model::DEFAULT_TITLE);
}

#[tokio::test]
async fn confirmed_row_delete_moves_items_to_bank() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 1).await;
    dispatch(
        &state,
        board_id,
        BoardAction::MoveItem {
            item_id: ItemId(1),
            from: ContainerId::Bank,
            to: ContainerId::from_key("B"),
            to_index: None,
        },
    )
    .await
    .unwrap();

    confirm(&state, board_id, ConfirmStep::Request { action: PendingAction::DeleteRow { row_id: RowId::new("B") } })
        .await
        .unwrap();
    let confirmed = confirm(&state, board_id, ConfirmStep::Confirm).await.unwrap();

    assert!(confirmed.changed);
    assert_eq!(confirmed.board.rows.len(), 4);
    assert_eq!(confirmed.board.bank[0].id, ItemId(1));
}

#[tokio::test]
async fn confirm_with_nothing_pending_is_no_op() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    let result = confirm(&state, board_id, ConfirmStep::Confirm).await.unwrap();
    assert!(!result.changed);
}

#[test]
fn confirm_step_deserializes() {
    let step: ConfirmStep =
        serde_json::from_value(serde_json::json!({ "step": "request", "action": { "type": "delete_row", "row_id": "C" } }))
            .unwrap();
    assert!(matches!(step, ConfirmStep::Request { action: PendingAction::DeleteRow { .. } }));
    let step: ConfirmStep = serde_json::from_value(serde_json::json!({ "step": "confirm" })).unwrap();
    assert!(matches!(step, ConfirmStep::Confirm));
}

// =============================================================================
// SEARCH / TEMPLATES
// =============================================================================

#[tokio::test]
async fn board_search_returns_results() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;
    let outcome = search(&state, board_id, "mononoke").await.unwrap();
    assert!(matches!(outcome, SearchOutcome::Results { ref items, .. } if items.len() == 2));
}

#[tokio::test]
async fn board_search_failure_leaves_board_untouched() {
    let catalog = Arc::new(StubCatalog { fail: true, ..StubCatalog::default() });
    let state = test_helpers::test_app_state_with_catalog(catalog);
    let board_id = create_board(&state).await.unwrap().id;
    select(&state, board_id, 1).await;

    let outcome = search(&state, board_id, "mononoke").await.unwrap();
    assert!(matches!(outcome, SearchOutcome::ConnectionError { .. }));
    assert_eq!(view(&state, board_id).await.unwrap().bank.len(), 1);
}

#[tokio::test]
async fn templates_unavailable_without_pool() {
    let state = test_helpers::test_app_state();
    let board_id = create_board(&state).await.unwrap().id;

    let err = import_template(&state, board_id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, BoardServiceError::Template(TemplateError::Unavailable)));

    let author = Author { id: Uuid::new_v4(), full_name: None, avatar_url: None };
    let template = NewTemplate { title: "Mine".into(), description: None };
    let err = publish_template(&state, board_id, &author, &template).await.unwrap_err();
    assert_eq!(err.error_code(), "E_TEMPLATE_UNAVAILABLE");
}
