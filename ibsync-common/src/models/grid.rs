//! Assignment grid
//!
//! A rectangular table of free-text cells. Each cell's `col_index` names the
//! staff column it belongs to; the text is a resident's display name typed by
//! hand. The grid carries no resident identity of its own.

use crate::api::types::{GridCellRecord, StaffRecord};
use crate::cell_text;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Staff columns of a freshly created grid
pub const DEFAULT_STAFF_NAMES: [&str; 9] = [
    "Kris B", "Torben", "Didar", "Dorien", "Evelien", "Yasmina", "Imane", "Kirsten", "Monica",
];

/// Resident rows of a freshly created grid
pub const DEFAULT_RESIDENT_ROWS: usize = 11;

/// Optional status marker on a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellColor {
    Red,
    Blue,
    Gray,
}

/// One grid cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default)]
    pub text: String,
    pub col_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<CellColor>,
}

impl Cell {
    pub fn empty(col_index: usize) -> Self {
        Self {
            text: String::new(),
            col_index,
            color: None,
        }
    }

    /// Free text with any date prefix removed
    pub fn display_text(&self) -> &str {
        cell_text::display_text(&self.text)
    }

    pub fn has_text(&self) -> bool {
        !self.display_text().is_empty()
    }

    /// No text and no color: nothing worth persisting remotely
    pub fn is_blank(&self) -> bool {
        !self.has_text() && self.color.is_none()
    }

    fn clear(&mut self) {
        self.text.clear();
        self.color = None;
    }
}

/// Staff column header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffColumn {
    pub index: usize,
    pub name: String,
}

/// The assignment grid: staff headers plus rows of cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub staff: Vec<StaffColumn>,
    pub rows: Vec<Vec<Cell>>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(&DEFAULT_STAFF_NAMES, DEFAULT_RESIDENT_ROWS)
    }
}

impl Grid {
    /// Create an empty grid with one column per staff name
    pub fn new<S: AsRef<str>>(staff_names: &[S], rows: usize) -> Self {
        let staff: Vec<StaffColumn> = staff_names
            .iter()
            .enumerate()
            .map(|(index, name)| StaffColumn {
                index,
                name: name.as_ref().to_string(),
            })
            .collect();
        let width = staff.len();
        Self {
            staff,
            rows: (0..rows).map(|_| Self::empty_row(width)).collect(),
        }
    }

    fn empty_row(width: usize) -> Vec<Cell> {
        (0..width).map(Cell::empty).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.staff.len()
    }

    /// Staff name for a cell's `col_index`; None for unknown or unnamed columns
    pub fn staff_name(&self, col_index: usize) -> Option<&str> {
        self.staff
            .iter()
            .find(|s| s.index == col_index)
            .map(|s| s.name.trim())
            .filter(|name| !name.is_empty())
    }

    /// Column index of the staff member with this name (case-insensitive)
    pub fn column_of_staff(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.staff
            .iter()
            .find(|s| s.name.trim().to_lowercase() == wanted)
            .map(|s| s.index)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Result<&mut Cell> {
        let rows = self.rows.len();
        self.rows
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Cell ({}, {}) outside grid of {} rows",
                    row, col, rows
                ))
            })
    }

    pub fn set_text(&mut self, row: usize, col: usize, text: impl Into<String>) -> Result<()> {
        self.cell_mut(row, col)?.text = text.into();
        Ok(())
    }

    pub fn set_color(&mut self, row: usize, col: usize, color: Option<CellColor>) -> Result<()> {
        self.cell_mut(row, col)?.color = color;
        Ok(())
    }

    /// Clear text and color of one cell
    pub fn clear_cell(&mut self, row: usize, col: usize) -> Result<()> {
        self.cell_mut(row, col)?.clear();
        Ok(())
    }

    pub fn clear_row(&mut self, row: usize) -> Result<()> {
        let cells = self
            .rows
            .get_mut(row)
            .ok_or_else(|| Error::InvalidInput(format!("Row {} outside grid", row)))?;
        cells.iter_mut().for_each(Cell::clear);
        Ok(())
    }

    pub fn clear_column(&mut self, col: usize) -> Result<()> {
        if col >= self.column_count() {
            return Err(Error::InvalidInput(format!("Column {} outside grid", col)));
        }
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(col) {
                cell.clear();
            }
        }
        Ok(())
    }

    /// Clear every cell; staff headers are kept
    pub fn clear_all(&mut self) {
        self.rows.iter_mut().flatten().for_each(Cell::clear);
    }

    /// Append an empty row, returning its index
    pub fn add_row(&mut self) -> usize {
        let width = self.column_count();
        self.rows.push(Self::empty_row(width));
        self.rows.len() - 1
    }

    /// Append a staff column, returning its index
    ///
    /// Without a name the column is called `"IB <n>"` (n is the 1-based column number).
    pub fn add_column(&mut self, name: Option<String>) -> usize {
        let index = self.staff.iter().map(|s| s.index + 1).max().unwrap_or(0);
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("IB {}", index + 1));
        self.staff.push(StaffColumn { index, name });
        for row in &mut self.rows {
            row.push(Cell::empty(index));
        }
        index
    }

    pub fn rename_staff(&mut self, col_index: usize, name: impl Into<String>) -> Result<()> {
        let staff = self
            .staff
            .iter_mut()
            .find(|s| s.index == col_index)
            .ok_or_else(|| Error::NotFound(format!("Staff column {}", col_index)))?;
        staff.name = name.into();
        Ok(())
    }

    /// Number of cells with text in a staff column
    pub fn resident_count(&self, col_index: usize) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|c| c.col_index == col_index && c.has_text())
            .count()
    }

    /// First row whose cell in `col` has no text
    pub fn first_empty_row(&self, col: usize) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(col).map(|c| !c.has_text()).unwrap_or(false))
    }

    /// Positions `(row, col)` of cells whose display text satisfies `pred`
    pub fn positions_where<F>(&self, mut pred: F) -> Vec<(usize, usize)>
    where
        F: FnMut(&str) -> bool,
    {
        let mut found = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell.has_text() && pred(cell.display_text()) {
                    found.push((r, c));
                }
            }
        }
        found
    }

    /// Wire records for every non-blank cell (row/column numbers are 1-based)
    pub fn to_records(&self, date: NaiveDate) -> Vec<GridCellRecord> {
        let mut records = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            for cell in row.iter().filter(|c| !c.is_blank()) {
                records.push(GridCellRecord {
                    row_number: (r + 1) as i64,
                    column_number: (cell.col_index + 1) as i64,
                    resident_name: cell.display_text().to_string(),
                    color_status: cell.color,
                    assignment_date: Some(date),
                });
            }
        }
        records
    }

    /// Staff wire records (positions are 1-based)
    pub fn staff_records(&self) -> Vec<StaffRecord> {
        self.staff
            .iter()
            .map(|s| StaffRecord {
                position: (s.index + 1) as i64,
                name: s.name.clone(),
            })
            .collect()
    }

    /// Rebuild a grid from wire records
    ///
    /// The grid is at least `min_rows` tall and wide enough for every staff
    /// record and cell. Records with non-positive coordinates are skipped.
    /// Cell text is stored date-prefixed when the record carries a date.
    pub fn from_records(
        cells: &[GridCellRecord],
        staff: &[StaffRecord],
        min_rows: usize,
    ) -> Self {
        let staff_width = staff.iter().map(|s| s.position.max(0) as usize).max().unwrap_or(0);
        let cell_width = cells.iter().map(|c| c.column_number.max(0) as usize).max().unwrap_or(0);
        let width = staff_width.max(cell_width);
        let height = cells
            .iter()
            .map(|c| c.row_number.max(0) as usize)
            .max()
            .unwrap_or(0)
            .max(min_rows);

        let mut names: Vec<String> = (0..width)
            .map(|i| {
                DEFAULT_STAFF_NAMES
                    .get(i)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("IB {}", i + 1))
            })
            .collect();
        for record in staff.iter().filter(|s| s.position > 0) {
            names[(record.position - 1) as usize] = record.name.clone();
        }

        let mut grid = Grid::new(&names, height);
        for record in cells {
            if record.row_number < 1 || record.column_number < 1 {
                continue;
            }
            let (row, col) = ((record.row_number - 1) as usize, (record.column_number - 1) as usize);
            let text = match record.assignment_date {
                Some(date) if !record.resident_name.trim().is_empty() => {
                    cell_text::encode(date, record.resident_name.trim())
                }
                _ => record.resident_name.trim().to_string(),
            };
            if let Some(cell) = grid.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
                cell.text = text;
                cell.color = record.color_status;
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    #[test]
    fn test_default_grid_shape() {
        let grid = Grid::default();
        assert_eq!(grid.column_count(), 9);
        assert_eq!(grid.row_count(), DEFAULT_RESIDENT_ROWS);
        assert_eq!(grid.staff_name(3), Some("Dorien"));
        assert!(grid.rows.iter().all(|r| r.len() == 9));
    }

    #[test]
    fn test_staff_name_unknown_or_blank() {
        let mut grid = Grid::new(&["Torben", "  "], 1);
        assert_eq!(grid.staff_name(1), None);
        assert_eq!(grid.staff_name(7), None);
        grid.rename_staff(1, "Didar").unwrap();
        assert_eq!(grid.staff_name(1), Some("Didar"));
    }

    #[test]
    fn test_clear_operations_keep_shape() {
        let mut grid = Grid::new(&["A", "B"], 2);
        grid.set_text(0, 0, "x y").unwrap();
        grid.set_text(1, 1, "z w").unwrap();
        grid.set_color(1, 0, Some(CellColor::Red)).unwrap();

        grid.clear_column(0).unwrap();
        assert!(grid.cell(0, 0).unwrap().is_blank());
        assert!(grid.cell(1, 0).unwrap().is_blank());
        assert!(grid.cell(1, 1).unwrap().has_text());

        grid.clear_row(1).unwrap();
        assert!(grid.cell(1, 1).unwrap().is_blank());
        assert_eq!(grid.row_count(), 2);
    }

    #[test]
    fn test_out_of_range_edits_are_rejected() {
        let mut grid = Grid::new(&["A"], 1);
        assert!(grid.set_text(5, 0, "x").is_err());
        assert!(grid.clear_row(3).is_err());
        assert!(grid.clear_column(2).is_err());
    }

    #[test]
    fn test_add_column_default_name() {
        let mut grid = Grid::default();
        let col = grid.add_column(None);
        assert_eq!(col, 9);
        assert_eq!(grid.staff_name(col), Some("IB 10"));
        assert!(grid.rows.iter().all(|r| r.len() == 10));
    }

    #[test]
    fn test_resident_count_and_first_empty_row() {
        let mut grid = Grid::new(&["A", "B"], 3);
        grid.set_text(0, 1, "one").unwrap();
        grid.set_text(1, 1, "2024-05-06|two").unwrap();
        grid.set_color(2, 1, Some(CellColor::Gray)).unwrap();
        assert_eq!(grid.resident_count(1), 2);
        assert_eq!(grid.first_empty_row(1), Some(2));
        assert_eq!(grid.first_empty_row(0), Some(0));
    }

    #[test]
    fn test_records_skip_blank_cells_and_keep_color_only_cells() {
        let mut grid = Grid::new(&["A", "B"], 2);
        grid.set_text(0, 0, "Jan Peeters").unwrap();
        grid.set_color(1, 1, Some(CellColor::Blue)).unwrap();

        let records = grid.to_records(date());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_number, 1);
        assert_eq!(records[0].column_number, 1);
        assert_eq!(records[1].resident_name, "");
        assert_eq!(records[1].color_status, Some(CellColor::Blue));
    }

    #[test]
    fn test_from_records_rebuilds_grid() {
        let cells = vec![
            GridCellRecord {
                row_number: 2,
                column_number: 4,
                resident_name: "Amina Yusuf".into(),
                color_status: None,
                assignment_date: Some(date()),
            },
            GridCellRecord {
                row_number: 0,
                column_number: 1,
                resident_name: "ignored".into(),
                color_status: None,
                assignment_date: None,
            },
        ];
        let staff = vec![StaffRecord {
            position: 4,
            name: "Dorien".into(),
        }];

        let grid = Grid::from_records(&cells, &staff, 11);
        assert_eq!(grid.row_count(), 11);
        assert_eq!(grid.column_count(), 4);
        assert_eq!(grid.staff_name(3), Some("Dorien"));
        let cell = grid.cell(1, 3).unwrap();
        assert_eq!(cell.text, "2024-05-06|Amina Yusuf");
        assert_eq!(cell.display_text(), "Amina Yusuf");
    }
}
