//! Two-phase confirmation for destructive board operations.
//!
//! A destructive request only records intent. The board changes when the
//! pending action is confirmed; cancelling discards it.

use serde::{Deserialize, Serialize};

use super::Board;
use super::model::RowId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingAction {
    #[default]
    None,
    Reset,
    DeleteRow {
        row_id: RowId,
    },
}

impl PendingAction {
    #[cfg(test)]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Record a destructive intent, replacing any earlier one.
    pub fn request(&mut self, action: PendingAction) {
        *self = action;
    }

    /// Apply the pending action and clear it. Returns whether the board
    /// changed; confirming with nothing pending does nothing.
    pub fn confirm(&mut self, board: &mut Board) -> bool {
        match std::mem::take(self) {
            Self::None => false,
            Self::Reset => {
                board.reset();
                true
            }
            Self::DeleteRow { row_id } => board.delete_row(&row_id),
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::None;
    }
}
