//! Registry and grid models
//!
//! Closed structs with explicit optional fields; defaults are applied at
//! construction and deserialization, never at read sites.

mod grid;
mod resident;

pub use grid::{
    Cell, CellColor, Grid, StaffColumn, DEFAULT_RESIDENT_ROWS, DEFAULT_STAFF_NAMES,
};
pub use resident::{Resident, ResidentId};
