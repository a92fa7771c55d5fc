//! HTTP API handlers for ibsync-server

pub mod grid;
pub mod health;
pub mod residents;
pub mod staff;

pub use grid::{get_grid, put_grid};
pub use health::health_routes;
pub use residents::{get_resident, get_residents, put_residents};
pub use staff::{get_staff, put_staff};
