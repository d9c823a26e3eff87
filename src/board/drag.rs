//! Drag gesture state machine: `Idle -> Dragging -> Idle`.
//!
//! Only the start and the end of a gesture reach the board. Nothing is
//! mutated or persisted while a drag is in flight.

use serde::{Deserialize, Serialize};

use super::Board;
use super::model::{ContainerId, Item, ItemId, RowId};
use super::preview::HoverPreview;

/// What is being dragged when the entity is an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragSource {
    /// A search result that is not on the board yet.
    External(Item),
    /// An item already placed in some container.
    Existing(ItemId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DragEntity {
    Item { source: DragSource },
    Row { row_id: RowId },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        entity: DragEntity,
        /// Container the item was in when the gesture started. `None` for
        /// rows and external items.
        origin: Option<ContainerId>,
    },
}

impl DragState {
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }

    /// Begin a gesture. Any pending or visible hover preview is dropped.
    /// Starting over an unfinished gesture replaces it.
    pub fn start(&mut self, board: &Board, entity: DragEntity, preview: &mut HoverPreview) {
        let origin = match &entity {
            DragEntity::Item { source: DragSource::Existing(id) } => board.container_of(*id).cloned(),
            DragEntity::Item { source: DragSource::External(_) } | DragEntity::Row { .. } => None,
        };
        preview.suspend();
        *self = Self::Dragging { entity, origin };
    }

    /// Finish the gesture. Without a target nothing changes; otherwise the
    /// drop is resolved and applied as one mutation. Returns whether the
    /// board changed.
    pub fn end(&mut self, board: &mut Board, target: Option<&str>) -> bool {
        let Self::Dragging { entity, origin } = std::mem::take(self) else {
            return false;
        };
        let Some(target) = target else {
            return false;
        };

        match entity {
            DragEntity::Row { row_id } => {
                if row_id.as_str() == target {
                    return false;
                }
                let Some(to_index) = board.row_index(&RowId::new(target)) else {
                    return false;
                };
                board.reorder_rows(&row_id, to_index)
            }
            DragEntity::Item { source } => board.drop_item(&source, origin.as_ref(), target),
        }
    }

    /// Abandon the gesture without touching the board.
    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }
}
