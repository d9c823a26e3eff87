//! Persistence service — key-value storage of board snapshots.
//!
//! DESIGN
//! ======
//! A board is stored as three independent string fields (see
//! `board::snapshot`). Every mutation rewrites all three before the request
//! returns, so the store never lags the in-memory board by more than the
//! request in flight.
//!
//! `KvStore` is the seam: `PgKvStore` writes to Postgres in one transaction,
//! `MemoryKvStore` keeps fields in process for tests and throwaway servers.
//!
//! ERROR HANDLING
//! ==============
//! A failed write leaves the in-memory board as is. The next successful
//! mutation rewrites every field, so nothing stays stale permanently.

use std::collections::HashMap;

use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::board::snapshot::BoardFields;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_STORE",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// Durable home of board snapshots, keyed by board id.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// All stored fields of a board. Empty when the board was never saved.
    ///
    /// # Errors
    ///
    /// Returns a store error if the backend cannot be read.
    async fn load(&self, board_id: Uuid) -> Result<HashMap<String, String>, StoreError>;

    /// Overwrite the three fields of a board.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails. No field is written then.
    async fn save(&self, board_id: Uuid, fields: &BoardFields) -> Result<(), StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KvStore for PgKvStore {
    async fn load(&self, board_id: Uuid) -> Result<HashMap<String, String>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM board_fields WHERE board_id = $1")
            .bind(board_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn save(&self, board_id: Uuid, fields: &BoardFields) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in fields.entries() {
            sqlx::query(
                "INSERT INTO board_fields (board_id, key, value, updated_at) VALUES ($1, $2, $3, now()) \
                 ON CONFLICT (board_id, key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
            )
            .bind(board_id)
            .bind(key)
            .bind(value)
            .execute(tx.as_mut())
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryKvStore {
    boards: RwLock<HashMap<Uuid, HashMap<String, String>>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn load(&self, board_id: Uuid) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.boards.read().await.get(&board_id).cloned().unwrap_or_default())
    }

    async fn save(&self, board_id: Uuid, fields: &BoardFields) -> Result<(), StoreError> {
        let mut boards = self.boards.write().await;
        let stored = boards.entry(board_id).or_default();
        for (key, value) in fields.entries() {
            stored.insert(key.to_owned(), value.to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
