//! Board state manager — the ranked rows, the bank, and every placement.
//!
//! DESIGN
//! ======
//! A `Board` owns its containers plus an index `item id -> container`. Every
//! method that moves items updates both within the same `&mut self` call, so
//! a reader never sees an item in two places or in none. Operations that
//! name an unknown row, container, or item are silent no-ops: they can only
//! come from a stale gesture, so they return `false` instead of an error.
//!
//! Mutations return `true` when the board changed. Callers persist on `true`.

pub mod action;
pub mod confirm;
pub mod drag;
pub mod model;
pub mod preview;
pub mod snapshot;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

pub use action::BoardAction;
use drag::DragSource;
use model::{ContainerId, DEFAULT_TITLE, Item, ItemId, NEW_ROW_LABEL, Row, RowId, palette_color};

// =============================================================================
// TYPES
// =============================================================================

/// Where an item lands inside its target container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    /// Before the item currently at this position (clamped to the end).
    Index(usize),
    /// After the last item.
    End,
}

impl From<Option<usize>> for InsertAt {
    fn from(index: Option<usize>) -> Self {
        index.map_or(Self::End, Self::Index)
    }
}

/// Item counts for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardStats {
    pub ranked: usize,
    pub bank: usize,
    pub total: usize,
}

/// A broken structural invariant. Only produced by `check_invariants`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("item {0} appears more than once")]
    DuplicateItem(ItemId),
    #[error("index entry for item {0} does not match its container")]
    IndexMismatch(ItemId),
    #[error("index holds {indexed} entries but containers hold {stored} items")]
    IndexSize { indexed: usize, stored: usize },
    #[error("row {0} has no item list")]
    MissingRowItems(RowId),
    #[error("item list for unknown row {0}")]
    OrphanRowItems(RowId),
}

/// The persisted aggregate: title, ordered rows, and the bank.
#[derive(Debug, Clone)]
pub struct Board {
    title: String,
    rows: Vec<Row>,
    row_items: HashMap<RowId, Vec<Item>>,
    bank: Vec<Item>,
    index: HashMap<ItemId, ContainerId>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

impl Board {
    /// Fresh board: default title, the five default rows, empty bank.
    #[must_use]
    pub fn new() -> Self {
        let rows = Row::defaults();
        let row_items = rows.iter().map(|r| (r.id.clone(), Vec::new())).collect();
        Self { title: DEFAULT_TITLE.to_owned(), rows, row_items, bank: Vec::new(), index: HashMap::new() }
    }

    /// Rebuild a board from decoded parts, repairing anything that would
    /// break an invariant. Rows are filled in order, then the bank; a
    /// duplicate id keeps its first placement. Items filed under a container
    /// that is not a row land in the bank.
    #[must_use]
    pub fn from_parts(title: String, rows: Vec<Row>, mut placements: HashMap<ContainerId, Vec<Item>>) -> Self {
        let mut seen_rows = HashSet::new();
        let rows: Vec<Row> = rows
            .into_iter()
            .filter(|r| !ContainerId::from_key(r.id.as_str()).is_bank() && seen_rows.insert(r.id.clone()))
            .collect();
        let rows = if rows.is_empty() { Row::defaults() } else { rows };

        let mut board = Self { title, rows, row_items: HashMap::new(), bank: Vec::new(), index: HashMap::new() };

        for row in &board.rows {
            let items = placements.remove(&ContainerId::Row(row.id.clone())).unwrap_or_default();
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                if board.index.contains_key(&item.id) {
                    continue;
                }
                board.index.insert(item.id, ContainerId::Row(row.id.clone()));
                kept.push(item);
            }
            board.row_items.insert(row.id.clone(), kept);
        }

        let bank = placements.remove(&ContainerId::Bank).unwrap_or_default();
        let mut strays: Vec<(ContainerId, Vec<Item>)> = placements.into_iter().collect();
        strays.sort_by(|a, b| a.0.cmp(&b.0));
        for item in bank.into_iter().chain(strays.into_iter().flat_map(|(_, items)| items)) {
            if board.index.contains_key(&item.id) {
                continue;
            }
            board.index.insert(item.id, ContainerId::Bank);
            board.bank.push(item);
        }

        board
    }
}

// =============================================================================
// QUERIES
// =============================================================================

impl Board {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Rows in rank order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn bank(&self) -> &[Item] {
        &self.bank
    }

    /// Items of one row, empty for an unknown row.
    #[must_use]
    pub fn row_items(&self, row_id: &RowId) -> &[Item] {
        self.row_items.get(row_id).map_or(&[], Vec::as_slice)
    }

    /// Items of a container, `None` if it does not exist.
    #[must_use]
    pub fn container_items(&self, container: &ContainerId) -> Option<&[Item]> {
        match container {
            ContainerId::Bank => Some(&self.bank),
            ContainerId::Row(id) => self.row_items.get(id).map(Vec::as_slice),
        }
    }

    fn container_items_mut(&mut self, container: &ContainerId) -> Option<&mut Vec<Item>> {
        match container {
            ContainerId::Bank => Some(&mut self.bank),
            ContainerId::Row(id) => self.row_items.get_mut(id),
        }
    }

    #[must_use]
    pub fn has_container(&self, container: &ContainerId) -> bool {
        match container {
            ContainerId::Bank => true,
            ContainerId::Row(id) => self.row_items.contains_key(id),
        }
    }

    #[must_use]
    pub fn contains(&self, item_id: ItemId) -> bool {
        self.index.contains_key(&item_id)
    }

    #[must_use]
    pub fn container_of(&self, item_id: ItemId) -> Option<&ContainerId> {
        self.index.get(&item_id)
    }

    #[must_use]
    pub fn find_item(&self, item_id: ItemId) -> Option<&Item> {
        let container = self.index.get(&item_id)?;
        self.container_items(container)?.iter().find(|i| i.id == item_id)
    }

    fn position_in(&self, container: &ContainerId, item_id: ItemId) -> Option<usize> {
        self.container_items(container)?.iter().position(|i| i.id == item_id)
    }

    #[must_use]
    pub fn row_index(&self, row_id: &RowId) -> Option<usize> {
        self.rows.iter().position(|r| &r.id == row_id)
    }

    #[must_use]
    pub fn stats(&self) -> BoardStats {
        let ranked = self.row_items.values().map(Vec::len).sum();
        let bank = self.bank.len();
        BoardStats { ranked, bank, total: ranked + bank }
    }

    /// Every item on the board: rows top to bottom, then the bank.
    #[must_use]
    pub fn flattened_items(&self) -> Vec<Item> {
        self.rows
            .iter()
            .flat_map(|r| self.row_items(&r.id).iter().cloned())
            .chain(self.bank.iter().cloned())
            .collect()
    }
}

// =============================================================================
// ITEM OPERATIONS
// =============================================================================

impl Board {
    /// Add a catalog item to the bank unless it is already on the board.
    pub fn select_item(&mut self, item: Item) -> bool {
        if self.contains(item.id) {
            return false;
        }
        self.index.insert(item.id, ContainerId::Bank);
        self.bank.push(item);
        true
    }

    /// Remove an item from whichever container holds it.
    pub fn remove_item(&mut self, item_id: ItemId) -> bool {
        let Some(container) = self.index.remove(&item_id) else {
            debug!(%item_id, "remove_item: unknown item");
            return false;
        };
        if let Some(list) = self.container_items_mut(&container) {
            list.retain(|i| i.id != item_id);
        }
        true
    }

    /// Move an item out of `from` and into `to` at `at`.
    ///
    /// Within one container this is a reorder: the item is taken out and put
    /// back at the clamped index, and every other item keeps its relative
    /// order. `InsertAt::End` always appends.
    pub fn move_item(&mut self, item_id: ItemId, from: &ContainerId, to: &ContainerId, at: InsertAt) -> bool {
        if self.index.get(&item_id) != Some(from) {
            debug!(%item_id, %from, "move_item: item not in source container");
            return false;
        }
        if !self.has_container(to) {
            debug!(%item_id, %to, "move_item: unknown target container");
            return false;
        }
        let Some(from_pos) = self.position_in(from, item_id) else {
            return false;
        };

        if from == to {
            let len = self.container_items(from).map_or(0, <[Item]>::len);
            let target = match at {
                InsertAt::Index(k) => k.min(len - 1),
                InsertAt::End => len - 1,
            };
            if target == from_pos {
                return false;
            }
        }

        let Some(source) = self.container_items_mut(from) else {
            return false;
        };
        let item = source.remove(from_pos);
        let Some(dest) = self.container_items_mut(to) else {
            return false;
        };
        let index = match at {
            InsertAt::Index(k) => k.min(dest.len()),
            InsertAt::End => dest.len(),
        };
        dest.insert(index, item);
        self.index.insert(item_id, to.clone());
        true
    }
}

// =============================================================================
// ROW OPERATIONS
// =============================================================================

impl Board {
    /// Move a row to `to_index` (clamped). Row contents are untouched.
    pub fn reorder_rows(&mut self, row_id: &RowId, to_index: usize) -> bool {
        let Some(from) = self.row_index(row_id) else {
            debug!(%row_id, "reorder_rows: unknown row");
            return false;
        };
        let to = to_index.min(self.rows.len() - 1);
        if from == to {
            return false;
        }
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        true
    }

    /// Append a new empty row and return its id.
    pub fn add_row(&mut self) -> RowId {
        let id = RowId::generate();
        let color = palette_color(self.rows.len()).to_owned();
        self.rows.push(Row { id: id.clone(), label: NEW_ROW_LABEL.to_owned(), color });
        self.row_items.insert(id.clone(), Vec::new());
        id
    }

    pub fn rename_row(&mut self, row_id: &RowId, label: &str) -> bool {
        let Some(row) = self.rows.iter_mut().find(|r| &r.id == row_id) else {
            debug!(%row_id, "rename_row: unknown row");
            return false;
        };
        if row.label == label {
            return false;
        }
        label.clone_into(&mut row.label);
        true
    }

    pub fn recolor_row(&mut self, row_id: &RowId, color: &str) -> bool {
        let Some(row) = self.rows.iter_mut().find(|r| &r.id == row_id) else {
            debug!(%row_id, "recolor_row: unknown row");
            return false;
        };
        if row.color == color {
            return false;
        }
        color.clone_into(&mut row.color);
        true
    }

    /// Remove a row, appending its items to the bank in order.
    /// The last remaining row is never deleted.
    pub fn delete_row(&mut self, row_id: &RowId) -> bool {
        let Some(pos) = self.row_index(row_id) else {
            debug!(%row_id, "delete_row: unknown row");
            return false;
        };
        if self.rows.len() <= 1 {
            debug!(%row_id, "delete_row: refusing to delete the last row");
            return false;
        }
        self.rows.remove(pos);
        let items = self.row_items.remove(row_id).unwrap_or_default();
        for item in items {
            self.index.insert(item.id, ContainerId::Bank);
            self.bank.push(item);
        }
        true
    }
}

// =============================================================================
// WHOLE-BOARD OPERATIONS
// =============================================================================

impl Board {
    pub fn set_title(&mut self, title: &str) -> bool {
        if self.title == title {
            return false;
        }
        title.clone_into(&mut self.title);
        true
    }

    /// Default rows, empty containers, default title.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replace the board with a template: its title, default empty rows, and
    /// its items in the bank. Duplicate ids in the template keep the first.
    pub fn import_template(&mut self, title: &str, items: Vec<Item>) {
        let mut board = Self::new();
        board.title = title.to_owned();
        for item in items {
            board.select_item(item);
        }
        *self = board;
    }
}

// =============================================================================
// PLACEMENT
// =============================================================================

impl Board {
    /// Resolve a drop target id to a container and insertion point.
    ///
    /// An id naming a container directly (`"bank"` or a row id) appends to
    /// it. Otherwise the id is read as an item id and the drop lands at that
    /// item's position in whichever container holds it.
    #[must_use]
    pub fn resolve_target(&self, target: &str) -> Option<(ContainerId, InsertAt)> {
        let direct = ContainerId::from_key(target);
        if self.has_container(&direct) {
            return Some((direct, InsertAt::End));
        }
        let item_id = ItemId(target.trim().parse().ok()?);
        let container = self.index.get(&item_id)?.clone();
        let pos = self.position_in(&container, item_id)?;
        Some((container, InsertAt::Index(pos)))
    }

    /// Apply the drop of a dragged item onto `target`.
    ///
    /// External items are appended to the resolved container unless their id
    /// is already on the board. Existing items are moved out of `origin`
    /// (falling back to their indexed container) into the resolved position.
    pub fn drop_item(&mut self, source: &DragSource, origin: Option<&ContainerId>, target: &str) -> bool {
        let Some((container, at)) = self.resolve_target(target) else {
            debug!(drop_target = target, "drop_item: unresolvable target");
            return false;
        };

        match source {
            DragSource::External(item) => {
                if self.contains(item.id) {
                    return false;
                }
                let Some(list) = self.container_items_mut(&container) else {
                    return false;
                };
                list.push(item.clone());
                self.index.insert(item.id, container);
                true
            }
            DragSource::Existing(item_id) => {
                let item_id = *item_id;
                let Some(from) = origin.or_else(|| self.index.get(&item_id)).cloned() else {
                    return false;
                };
                if from == container && self.position_in(&from, item_id).map(InsertAt::Index) == Some(at) {
                    return false;
                }
                self.move_item(item_id, &from, &container, at)
            }
        }
    }
}

// =============================================================================
// INVARIANTS
// =============================================================================

impl Board {
    /// Verify that every item appears once and the index agrees with the
    /// containers.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for row in &self.rows {
            if !self.row_items.contains_key(&row.id) {
                return Err(InvariantViolation::MissingRowItems(row.id.clone()));
            }
        }
        for row_id in self.row_items.keys() {
            if self.row_index(row_id).is_none() {
                return Err(InvariantViolation::OrphanRowItems(row_id.clone()));
            }
        }

        let mut seen = HashSet::new();
        let containers = self
            .rows
            .iter()
            .map(|r| ContainerId::Row(r.id.clone()))
            .chain(std::iter::once(ContainerId::Bank));
        for container in containers {
            for item in self.container_items(&container).unwrap_or_default() {
                if !seen.insert(item.id) {
                    return Err(InvariantViolation::DuplicateItem(item.id));
                }
                if self.index.get(&item.id) != Some(&container) {
                    return Err(InvariantViolation::IndexMismatch(item.id));
                }
            }
        }
        if seen.len() != self.index.len() {
            return Err(InvariantViolation::IndexSize { indexed: self.index.len(), stored: seen.len() });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
