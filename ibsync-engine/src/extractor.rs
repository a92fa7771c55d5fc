//! Assignment extraction
//!
//! Walks the grid in row-major order and records, for every non-empty cell
//! in a named staff column, `cell text -> staff name`.
//!
//! **Duplicates:** when the same free text appears in two cells the later one
//! (row-major) wins. The entry keeps the position where the text was first
//! seen, so iteration order is stable across runs.

use ibsync_common::Grid;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Derived, insertion-ordered map `assignee free text -> staff name`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentMap(IndexMap<String, String>);

impl AssignmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten key keeps its original position
    pub fn insert(&mut self, assignee: impl Into<String>, staff: impl Into<String>) {
        self.0.insert(assignee.into(), staff.into());
    }

    /// Direct key lookup (exact text as typed, trimmed)
    pub fn get(&self, assignee: &str) -> Option<&str> {
        self.0.get(assignee).map(String::as_str)
    }

    /// Direct lookup returning the stored key as well
    pub fn entry(&self, assignee: &str) -> Option<(&str, &str)> {
        self.0
            .get_key_value(assignee)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AssignmentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AssignmentMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Build the assignment map for a grid
///
/// Cells whose `col_index` has no named staff column are ignored. Date
/// prefixes are stripped, so dated and legacy cells produce the same key.
pub fn extract(grid: &Grid) -> AssignmentMap {
    let mut map = AssignmentMap::new();
    let mut skipped = 0usize;

    for row in &grid.rows {
        for cell in row {
            let text = cell.display_text();
            if text.is_empty() {
                continue;
            }
            match grid.staff_name(cell.col_index) {
                Some(staff) => map.insert(text, staff),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Ignored cells without a staff column");
    }
    map
}
