//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the storage backends, the catalog client, and a map of live
//! board sessions. Each session owns its board plus the transient gesture,
//! confirmation, preview, and search state around it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::board::Board;
use crate::board::confirm::PendingAction;
use crate::board::drag::DragState;
use crate::board::preview::HoverPreview;
use crate::config::AppConfig;
use crate::services::catalog::CatalogSearch;
use crate::services::persistence::KvStore;
use crate::services::search::SearchCoordinator;

// =============================================================================
// BOARD SESSION
// =============================================================================

/// Per-board live state. The board itself is persisted after every change;
/// everything else here is transient.
pub struct BoardSession {
    pub board: Board,
    pub drag: DragState,
    pub pending: PendingAction,
    pub preview: HoverPreview,
    /// Shared with in-flight searches so they can run without the board lock.
    pub search: Arc<SearchCoordinator>,
    /// Bumped on every board change.
    pub revision: u64,
    /// Highest revision written to the store. Held across the write so
    /// snapshots land in revision order.
    pub persisted: Arc<Mutex<u64>>,
    /// Last time a request touched this session. Idle sessions are evicted.
    pub last_access: Instant,
}

impl BoardSession {
    #[must_use]
    pub fn new(board: Board, config: &AppConfig) -> Self {
        Self {
            board,
            drag: DragState::default(),
            pending: PendingAction::default(),
            preview: HoverPreview::new(config.hover_preview_delay),
            search: Arc::new(SearchCoordinator::new(config.search)),
            revision: 0,
            persisted: Arc::new(Mutex::new(0)),
            last_access: Instant::now(),
        }
    }

    /// True when every board change has reached the store and no write is
    /// in flight.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.persisted
            .try_lock()
            .is_ok_and(|written| *written == self.revision)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    /// Template store. `None` when no database is configured.
    pub pool: Option<PgPool>,
    pub store: Arc<dyn KvStore>,
    pub catalog: Arc<dyn CatalogSearch>,
    pub boards: Arc<RwLock<HashMap<Uuid, BoardSession>>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: Option<PgPool>,
        store: Arc<dyn KvStore>,
        catalog: Arc<dyn CatalogSearch>,
        config: AppConfig,
    ) -> Self {
        Self { pool, store, catalog, boards: Arc::new(RwLock::new(HashMap::new())), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_new_starts_idle() {
        let session = BoardSession::new(Board::new(), &AppConfig::default());
        assert!(!session.drag.is_dragging());
        assert!(!session.pending.is_pending());
        assert_eq!(session.search.current_generation(), 0);
        assert!(session.is_clean());
    }

    #[tokio::test]
    async fn session_with_unwritten_revision_is_dirty() {
        let mut session = BoardSession::new(Board::new(), &AppConfig::default());
        session.revision = 1;
        assert!(!session.is_clean());

        *session.persisted.lock().await = 1;
        assert!(session.is_clean());

        let _writing = session.persisted.lock().await;
        assert!(!session.is_clean());
    }

    #[tokio::test]
    async fn seed_board_registers_session() {
        let state = test_helpers::test_app_state();
        let board_id = test_helpers::seed_board(&state).await;
        assert!(state.boards.read().await.contains_key(&board_id));
        assert!(state.pool.is_none());
    }
}
