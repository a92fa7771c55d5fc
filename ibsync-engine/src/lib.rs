//! # IBSync Engine
//!
//! Keeps the free-text assignment grid and the resident registry's
//! reference-person field consistent, and persists both across a local cache
//! and a remote store.
//!
//! Pipeline: grid → [`extractor`] → [`reconcile`] (using [`matcher`]) →
//! registry mutations. Destructive edits are undoable through [`history`];
//! [`persistence`] owns the canonical state of each dataset; [`session`]
//! ties it together for one editing session.

pub mod extractor;
pub mod history;
pub mod matcher;
pub mod persistence;
pub mod reconcile;
pub mod session;

pub use extractor::{extract, AssignmentMap};
pub use history::MutationLog;
pub use matcher::{match_names, MatchKind, NameMatch};
pub use persistence::{LoadReport, LoadSource, PersistenceCoordinator};
pub use reconcile::{reconcile, Mutation};
pub use session::{Session, SessionInit, SessionLoad};
