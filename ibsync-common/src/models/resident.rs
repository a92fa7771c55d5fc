//! Resident registry entry

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable resident identifier (assigned at creation, never reused)
pub type ResidentId = Uuid;

/// Canonical registry entry
///
/// Attributes other than the name and reference person (badge, room, dates,
/// ...) are carried through unchanged in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: ResidentId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Synchronized assignee; empty when unassigned
    #[serde(default)]
    pub reference_person: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Resident {
    /// Create a new unassigned resident with a fresh id
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            reference_person: String::new(),
            attributes: Map::new(),
        }
    }

    /// Builder-style reference person, mostly for fixtures
    pub fn with_reference_person(mut self, name: impl Into<String>) -> Self {
        self.reference_person = name.into();
        self
    }

    /// `"first last"`, trimmed
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// The two name orderings used for matching: `"first last"` and `"last first"`
    ///
    /// Returns None when either name component is empty; such residents never match.
    pub fn name_candidates(&self) -> Option<[String; 2]> {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        if first.is_empty() || last.is_empty() {
            return None;
        }
        Some([format!("{} {}", first, last), format!("{} {}", last, first)])
    }
}
