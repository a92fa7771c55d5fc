//! Shared request/response types for the remote tier
//!
//! Used by both sides of the wire:
//! - ibsync-engine (HTTP remote client)
//! - ibsync-server (remote store)

use crate::models::{CellColor, Resident};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ========================================
// Grid Types
// ========================================

/// One stored grid cell
///
/// Row and column numbers are 1-based. An empty `resident_name` with no
/// color means "no cell" and deletes the stored record on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCellRecord {
    pub row_number: i64,
    pub column_number: i64,
    #[serde(default)]
    pub resident_name: String,
    #[serde(default)]
    pub color_status: Option<CellColor>,
    #[serde(default)]
    pub assignment_date: Option<NaiveDate>,
}

impl GridCellRecord {
    /// True when the record carries neither text nor color
    pub fn is_empty(&self) -> bool {
        self.resident_name.trim().is_empty() && self.color_status.is_none()
    }
}

/// Staff column header (1-based position)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub position: i64,
    pub name: String,
}

/// GET /api/toewijzingen/grid response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
    #[serde(default)]
    pub grid_cells: Vec<GridCellRecord>,
    #[serde(default)]
    pub staff_records: Vec<StaffRecord>,
    /// Time of the last successful save of this date, if any
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// PUT /api/toewijzingen/grid request: a full snapshot of one date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGridRequest {
    pub date: NaiveDate,
    pub cells: Vec<GridCellRecord>,
    pub staff_names: Vec<String>,
}

/// Per-batch save counts; partial failure is reported, not raised
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(self, other: BatchOutcome) -> BatchOutcome {
        BatchOutcome {
            successful: self.successful + other.successful,
            failed: self.failed + other.failed,
        }
    }
}

/// PUT /api/toewijzingen/grid response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveGridResponse {
    pub grid: BatchOutcome,
    pub staff: BatchOutcome,
}

// ========================================
// Registry Types
// ========================================

/// GET /api/residents response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentsResponse {
    #[serde(default)]
    pub residents: Vec<Resident>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grid_response_wire_names() {
        let body = json!({
            "gridCells": [
                {"row_number": 1, "column_number": 4, "resident_name": "Amina Yusuf", "color_status": "red"}
            ],
            "staffRecords": [{"position": 4, "name": "Dorien"}]
        });
        let parsed: GridResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.grid_cells[0].color_status, Some(CellColor::Red));
        assert_eq!(parsed.grid_cells[0].assignment_date, None);
        assert_eq!(parsed.staff_records[0].name, "Dorien");
        assert!(parsed.saved_at.is_none());
    }

    #[test]
    fn test_batch_outcome_merge() {
        let mut a = BatchOutcome::default();
        a.record(true);
        a.record(false);
        let total = a.merge(BatchOutcome {
            successful: 3,
            failed: 0,
        });
        assert_eq!(total, BatchOutcome { successful: 4, failed: 1 });
    }

    #[test]
    fn test_empty_record_detection() {
        let record = GridCellRecord {
            row_number: 1,
            column_number: 1,
            resident_name: "  ".into(),
            color_status: None,
            assignment_date: None,
        };
        assert!(record.is_empty());
        let colored = GridCellRecord {
            color_status: Some(CellColor::Gray),
            ..record
        };
        assert!(!colored.is_empty());
    }
}
