//! # IBSync Common Library
//!
//! Shared code for the assignment sync engine and the remote store service:
//! - Error type
//! - Configuration loading
//! - Resident registry and assignment grid models
//! - Wire records exchanged with the remote tier
//! - Dated cell text codec
//! - Sync status reporting

pub mod api;
pub mod cell_text;
pub mod config;
pub mod error;
pub mod models;
pub mod status;
pub mod time;

pub use error::{Error, Result};
pub use models::{Cell, CellColor, Grid, Resident, ResidentId, StaffColumn};
pub use status::SyncStatus;
