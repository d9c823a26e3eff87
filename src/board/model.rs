//! Board model — items, rows, containers, and the default tier set.
//!
//! DESIGN
//! ======
//! Items are owned by exactly one container. A container is either the bank
//! or a row, and on the wire it is addressed by a single string: `"bank"` or
//! the row id. Row ids are generated with a `tier-` prefix so they can never
//! collide with the bank key.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Wire key of the unranked holding pool.
pub const BANK_KEY: &str = "bank";

/// Title of a fresh or reset board.
pub const DEFAULT_TITLE: &str = "MY ANIME TIER LIST";

/// Label given to rows created by `add_row`.
pub const NEW_ROW_LABEL: &str = "NEW";

/// Default tier set as `(id, color)`. The label of each default row is its id.
pub const DEFAULT_ROWS: [(&str, &str); 5] = [
    ("S", "from-yellow-300 via-amber-400 to-yellow-500"),
    ("A", "from-red-500 to-rose-600"),
    ("B", "from-orange-400 to-orange-600"),
    ("C", "from-emerald-400 to-teal-600"),
    ("D", "from-gray-400 to-gray-600"),
];

/// Colors handed out to added rows, indexed by how many rows exist beyond the
/// defaults. Disjoint from the default colors.
pub const ROW_COLOR_PALETTE: [&str; 5] = [
    "from-purple-500 to-indigo-600",
    "from-cyan-400 to-blue-500",
    "from-pink-500 to-fuchsia-600",
    "from-lime-400 to-green-500",
    "from-indigo-400 to-violet-600",
];

// =============================================================================
// ITEM
// =============================================================================

/// Catalog identifier of an item (the catalog's `mal_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An external catalog entry. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Catalog media type ("TV", "Movie", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Item {
    /// Minimal item with only the required display fields.
    #[cfg(test)]
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: ItemId(id),
            title: title.into(),
            image_url: image_url.into(),
            score: None,
            synopsis: None,
            year: None,
            kind: None,
        }
    }
}

// =============================================================================
// ROW
// =============================================================================

/// Stable row identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

impl RowId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh unique id for an added row.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("tier-{}", Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row metadata. Row contents live in the board, keyed by row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub label: String,
    pub color: String,
}

impl Row {
    /// The five default tiers, in rank order.
    #[must_use]
    pub fn defaults() -> Vec<Row> {
        DEFAULT_ROWS
            .iter()
            .map(|(id, color)| Row { id: RowId::new(*id), label: (*id).to_owned(), color: (*color).to_owned() })
            .collect()
    }
}

/// Palette color for a row appended to a board that currently has
/// `row_count` rows. Wraps around the palette.
#[must_use]
pub fn palette_color(row_count: usize) -> &'static str {
    let offset = row_count.saturating_sub(DEFAULT_ROWS.len());
    ROW_COLOR_PALETTE[offset % ROW_COLOR_PALETTE.len()]
}

// =============================================================================
// CONTAINER
// =============================================================================

/// A place that can hold items: the bank or one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContainerId {
    Bank,
    Row(RowId),
}

impl ContainerId {
    /// Interpret a wire key. Anything other than `"bank"` is a row id.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        if key == BANK_KEY { Self::Bank } else { Self::Row(RowId::new(key)) }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Bank => BANK_KEY,
            Self::Row(id) => id.as_str(),
        }
    }

    #[must_use]
    pub fn is_bank(&self) -> bool {
        matches!(self, Self::Bank)
    }
}

impl From<String> for ContainerId {
    fn from(key: String) -> Self {
        if key == BANK_KEY { Self::Bank } else { Self::Row(RowId(key)) }
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        match id {
            ContainerId::Bank => BANK_KEY.to_owned(),
            ContainerId::Row(row) => row.0,
        }
    }
}

impl From<RowId> for ContainerId {
    fn from(id: RowId) -> Self {
        Self::Row(id)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
