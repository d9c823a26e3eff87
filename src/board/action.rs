//! Board actions — the message form of every non-destructive mutation.
//!
//! Reset and row deletion are deliberately absent: they only happen through
//! the confirmation flow in [`super::confirm`].

use serde::Deserialize;

use super::Board;
use super::model::{ContainerId, Item, ItemId, RowId};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardAction {
    SelectItem {
        item: Item,
    },
    RemoveItem {
        item_id: ItemId,
    },
    MoveItem {
        item_id: ItemId,
        from: ContainerId,
        to: ContainerId,
        /// Absent means append to the end of `to`.
        #[serde(default)]
        to_index: Option<usize>,
    },
    ReorderRows {
        row_id: RowId,
        to_index: usize,
    },
    AddRow,
    RenameRow {
        row_id: RowId,
        label: String,
    },
    RecolorRow {
        row_id: RowId,
        color: String,
    },
    SetTitle {
        title: String,
    },
    ImportTemplate {
        title: String,
        items: Vec<Item>,
    },
}

impl Board {
    /// Dispatch one action. Returns whether the board changed.
    pub fn apply(&mut self, action: BoardAction) -> bool {
        match action {
            BoardAction::SelectItem { item } => self.select_item(item),
            BoardAction::RemoveItem { item_id } => self.remove_item(item_id),
            BoardAction::MoveItem { item_id, from, to, to_index } => {
                self.move_item(item_id, &from, &to, to_index.into())
            }
            BoardAction::ReorderRows { row_id, to_index } => self.reorder_rows(&row_id, to_index),
            BoardAction::AddRow => {
                self.add_row();
                true
            }
            BoardAction::RenameRow { row_id, label } => self.rename_row(&row_id, &label),
            BoardAction::RecolorRow { row_id, color } => self.recolor_row(&row_id, &color),
            BoardAction::SetTitle { title } => self.set_title(&title),
            BoardAction::ImportTemplate { title, items } => {
                self.import_template(&title, items);
                true
            }
        }
    }
}
