//! Board snapshot — three independent string fields for the key-value store.
//!
//! - `tierTitle`: the raw title
//! - `tierRows`: JSON array of `{id, label, color}`
//! - `tierItems`: JSON object of container key -> item array
//!
//! Each field decodes on its own. A missing or corrupt field falls back to
//! its default without discarding the others.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use super::Board;
use super::model::{ContainerId, DEFAULT_TITLE, Item, Row};

pub const TITLE_KEY: &str = "tierTitle";
pub const ROWS_KEY: &str = "tierRows";
pub const ITEMS_KEY: &str = "tierItems";

/// Encoded board, one string per stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardFields {
    pub title: String,
    pub rows: String,
    pub items: String,
}

impl BoardFields {
    /// Serialize a board into its three fields.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(board: &Board) -> Result<Self, serde_json::Error> {
        let mut placements: BTreeMap<&str, &[Item]> = BTreeMap::new();
        placements.insert(ContainerId::Bank.key(), board.bank());
        for row in board.rows() {
            placements.insert(row.id.as_str(), board.row_items(&row.id));
        }
        Ok(Self {
            title: board.title().to_owned(),
            rows: serde_json::to_string(board.rows())?,
            items: serde_json::to_string(&placements)?,
        })
    }

    /// Key/value pairs in storage order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [(TITLE_KEY, &self.title), (ROWS_KEY, &self.rows), (ITEMS_KEY, &self.items)]
    }
}

/// Rebuild a board from whatever fields are present.
#[must_use]
pub fn decode(fields: &HashMap<String, String>) -> Board {
    let title = fields.get(TITLE_KEY).cloned().unwrap_or_else(|| DEFAULT_TITLE.to_owned());

    let rows = match fields.get(ROWS_KEY).map(|raw| serde_json::from_str::<Vec<Row>>(raw)) {
        Some(Ok(rows)) => rows,
        Some(Err(e)) => {
            warn!(error = %e, "stored rows are corrupt; using defaults");
            Row::defaults()
        }
        None => Row::defaults(),
    };

    let placements = match fields.get(ITEMS_KEY).map(|raw| serde_json::from_str::<HashMap<ContainerId, Vec<Item>>>(raw)) {
        Some(Ok(placements)) => placements,
        Some(Err(e)) => {
            warn!(error = %e, "stored item placements are corrupt; starting empty");
            HashMap::new()
        }
        None => HashMap::new(),
    };

    Board::from_parts(title, rows, placements)
}
