//! Remote tier wire types
//!
//! Request/response bodies shared by the engine's HTTP client and the
//! remote store service.

pub mod types;

pub use types::{
    BatchOutcome, GridCellRecord, GridResponse, ResidentsResponse, SaveGridRequest,
    SaveGridResponse, StaffRecord,
};
