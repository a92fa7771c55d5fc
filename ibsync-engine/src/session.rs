//! Session store
//!
//! Owns everything one editing session works on: the resident registry and
//! the assignment grid (each behind its own [`PersistenceCoordinator`]), their
//! undo histories, and the assignment date used for dated cell text.
//!
//! Lifecycle: [`Session::init`] loads both datasets, [`Session::teardown`]
//! flushes them and stops the flush workers. Components receive the session
//! by reference; there is no global state.
//!
//! Grid edits that can change who is assigned run the extractor and
//! reconciler afterwards, so the registry follows the grid. Setting a
//! reference person directly moves the resident on the grid instead.

use crate::extractor::{extract, AssignmentMap};
use crate::history::MutationLog;
use crate::matcher::{match_names, MatchKind};
use crate::persistence::local::{self, LocalStore};
use crate::persistence::{
    HttpRemote, LoadReport, OfflineRemote, PersistenceCoordinator, PersistenceRecord,
    RemoteStore, GRID_KEY, REGISTRY_KEY, STAFF_ASSIGNMENTS_KEY,
};
use crate::reconcile::{self, Mutation};
use chrono::NaiveDate;
use ibsync_common::config::SyncSettings;
use ibsync_common::{cell_text, CellColor, Error, Grid, Resident, ResidentId, Result, SyncStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed to open a session
pub struct SessionInit {
    pub local: Arc<dyn LocalStore>,
    pub registry_remote: Arc<dyn RemoteStore<Vec<Resident>>>,
    pub grid_remote: Arc<dyn RemoteStore<Grid>>,
    pub settings: SyncSettings,
    pub date: NaiveDate,
    pub default_registry: Vec<Resident>,
    pub default_grid: Grid,
}

impl SessionInit {
    /// Offline session over `local`, with an empty registry and default grid
    pub fn offline(local: Arc<dyn LocalStore>, date: NaiveDate) -> Self {
        Self {
            local,
            registry_remote: Arc::new(OfflineRemote),
            grid_remote: Arc::new(OfflineRemote),
            settings: SyncSettings::default(),
            date,
            default_registry: Vec::new(),
            default_grid: Grid::default(),
        }
    }

    /// Use one HTTP remote for both datasets
    pub fn with_http_remote(mut self, remote: HttpRemote) -> Self {
        let remote = Arc::new(remote);
        self.registry_remote = remote.clone();
        self.grid_remote = remote;
        self
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// How each dataset was loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLoad {
    pub registry: LoadReport,
    pub grid: LoadReport,
}

/// Owned store for one editing session
pub struct Session {
    date: NaiveDate,
    local: Arc<dyn LocalStore>,
    registry: PersistenceCoordinator<Vec<Resident>>,
    grid: PersistenceCoordinator<Grid>,
    registry_history: MutationLog<Vec<Resident>>,
    grid_history: MutationLog<Grid>,
}

impl Session {
    /// Load both datasets and start their flush workers
    pub async fn init(init: SessionInit) -> (Self, SessionLoad) {
        let SessionInit {
            local,
            registry_remote,
            grid_remote,
            settings,
            date,
            default_registry,
            default_grid,
        } = init;

        let mut registry = PersistenceCoordinator::new(
            REGISTRY_KEY,
            default_registry.clone(),
            Arc::clone(&local),
            registry_remote,
            settings.clone(),
        );
        let mut grid = PersistenceCoordinator::new(
            GRID_KEY,
            default_grid.clone(),
            Arc::clone(&local),
            grid_remote,
            settings.clone(),
        );

        let load = SessionLoad {
            registry: registry.load_on_startup(default_registry).await,
            grid: grid.load_on_startup(default_grid).await,
        };

        info!(
            date = %date,
            residents = registry.state().len(),
            rows = grid.state().row_count(),
            "Session opened"
        );

        let session = Self {
            date,
            local,
            registry,
            grid,
            registry_history: MutationLog::new(settings.history_depth),
            grid_history: MutationLog::new(settings.history_depth),
        };
        (session, load)
    }

    /// Flush both datasets, stop the workers and drop the history
    pub async fn teardown(mut self) {
        self.registry.shutdown().await;
        self.grid.shutdown().await;
        self.registry_history.clear();
        self.grid_history.clear();
        info!(date = %self.date, "Session closed");
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn residents(&self) -> &[Resident] {
        self.registry.state()
    }

    pub fn resident(&self, id: ResidentId) -> Option<&Resident> {
        self.residents().iter().find(|r| r.id == id)
    }

    pub fn grid(&self) -> &Grid {
        self.grid.state()
    }

    /// Current assignment map derived from the grid
    pub fn assignments(&self) -> AssignmentMap {
        extract(self.grid())
    }

    pub fn registry_status(&self) -> SyncStatus {
        self.registry.status()
    }

    pub fn grid_status(&self) -> SyncStatus {
        self.grid.status()
    }

    /// Residents in a staff column
    pub fn column_resident_count(&self, col: usize) -> usize {
        self.grid().resident_count(col)
    }

    /// Force both pending remote flushes out now
    pub async fn flush_now(&self) {
        self.registry.flush_now().await;
        self.grid.flush_now().await;
    }

    // ========================================
    // Synchronization
    // ========================================

    /// Run extractor and reconciler, apply the result to the registry
    ///
    /// Also mirrors the assignment map to the local `staffAssignments` entry.
    pub fn sync_assignments(&mut self) -> Result<Vec<Mutation>> {
        let map = extract(self.grid());
        local::store_record(
            self.local.as_ref(),
            STAFF_ASSIGNMENTS_KEY,
            &PersistenceRecord::new(&map),
        )?;

        let mutations = reconcile::plan(self.residents(), &map);
        if mutations.is_empty() {
            debug!(entries = map.len(), "Registry already in sync with grid");
            return Ok(mutations);
        }

        let mut next = self.residents().to_vec();
        reconcile::apply(&mut next, &mutations);
        self.registry.commit(next)?;
        info!(mutations = mutations.len(), "Registry reconciled with grid");
        Ok(mutations)
    }

    // ========================================
    // Registry operations
    // ========================================

    fn edit_registry<F>(&mut self, destructive: bool, op: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Resident>) -> Result<()>,
    {
        let mut next = self.residents().to_vec();
        op(&mut next)?;
        if destructive {
            self.registry_history
                .record_before_mutation(self.registry.state());
        }
        self.registry.commit(next)
    }

    /// Add a resident; it is matched against the grid right away
    pub fn add_resident(&mut self, first_name: &str, last_name: &str) -> Result<ResidentId> {
        let resident = Resident::new(first_name.trim(), last_name.trim());
        let id = resident.id;
        self.edit_registry(false, |residents| {
            residents.push(resident);
            Ok(())
        })?;
        self.sync_assignments()?;
        Ok(id)
    }

    pub fn rename_resident(&mut self, id: ResidentId, first_name: &str, last_name: &str) -> Result<()> {
        self.edit_registry(false, |residents| {
            let resident = find_mut(residents, id)?;
            resident.first_name = first_name.trim().to_string();
            resident.last_name = last_name.trim().to_string();
            Ok(())
        })?;
        self.sync_assignments()?;
        Ok(())
    }

    /// Set a reference person directly and reflect it on the grid
    ///
    /// An empty name removes the resident's cells. A staff name moves the
    /// resident into that column (first empty row, a row is added when the
    /// column is full). Any other name is rejected.
    pub fn set_reference_person(&mut self, id: ResidentId, name: &str) -> Result<()> {
        let resident = self
            .resident(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Resident {}", id)))?;

        let mut grid = self.grid().clone();
        let current = positions_of(&grid, self.residents(), &resident);

        let staff = if name.trim().is_empty() {
            for (row, col) in &current {
                grid.clear_cell(*row, *col)?;
            }
            String::new()
        } else {
            let col = grid.column_of_staff(name).ok_or_else(|| {
                Error::InvalidInput(format!("'{}' is not a staff column", name.trim()))
            })?;
            let staff = grid.staff_name(col).unwrap_or_default().to_string();

            for &(row, c) in current.iter().filter(|&&(_, c)| c != col) {
                grid.clear_cell(row, c)?;
            }
            if !current.iter().any(|&(_, c)| c == col) {
                let row = match grid.first_empty_row(col) {
                    Some(row) => row,
                    None => grid.add_row(),
                };
                grid.set_text(row, col, cell_text::encode(self.date, &resident.display_name()))?;
            }
            staff
        };

        let mut residents = self.residents().to_vec();
        find_mut(&mut residents, id)?.reference_person = staff;

        // Both commits update memory even when the local write fails
        let grid_written = self.grid.commit(grid);
        let registry_written = self.registry.commit(residents);
        grid_written.and(registry_written)?;
        self.sync_assignments()?;
        Ok(())
    }

    pub fn delete_resident(&mut self, id: ResidentId) -> Result<()> {
        self.edit_registry(true, |residents| {
            let before = residents.len();
            residents.retain(|r| r.id != id);
            if residents.len() == before {
                return Err(Error::NotFound(format!("Resident {}", id)));
            }
            Ok(())
        })
    }

    /// Delete several residents as one undoable step; returns how many were removed
    pub fn delete_residents(&mut self, ids: &[ResidentId]) -> Result<usize> {
        let wanted: HashSet<ResidentId> = ids.iter().copied().collect();
        let count = self.residents().iter().filter(|r| wanted.contains(&r.id)).count();
        if count == 0 {
            return Ok(0);
        }
        self.edit_registry(true, |residents| {
            residents.retain(|r| !wanted.contains(&r.id));
            Ok(())
        })?;
        Ok(count)
    }

    /// Remove every resident (undoable)
    pub fn clear_registry(&mut self) -> Result<()> {
        self.edit_registry(true, |residents| {
            residents.clear();
            Ok(())
        })
    }

    /// Returns false when there was nothing to undo
    pub fn undo_registry(&mut self) -> Result<bool> {
        match self.registry_history.undo(self.registry.state()) {
            Some(previous) => {
                self.registry.commit(previous)?;
                Ok(true)
            }
            None => {
                debug!("Registry undo: nothing to undo");
                Ok(false)
            }
        }
    }

    /// Returns false when there was nothing to redo
    pub fn redo_registry(&mut self) -> Result<bool> {
        match self.registry_history.redo(self.registry.state()) {
            Some(next) => {
                self.registry.commit(next)?;
                Ok(true)
            }
            None => {
                debug!("Registry redo: nothing to redo");
                Ok(false)
            }
        }
    }

    pub fn can_undo_registry(&self) -> bool {
        self.registry_history.can_undo()
    }

    pub fn can_redo_registry(&self) -> bool {
        self.registry_history.can_redo()
    }

    // ========================================
    // Grid operations
    // ========================================

    fn edit_grid<F>(&mut self, destructive: bool, op: F) -> Result<Vec<Mutation>>
    where
        F: FnOnce(&mut Grid) -> Result<()>,
    {
        let mut next = self.grid().clone();
        op(&mut next)?;
        if destructive {
            self.grid_history.record_before_mutation(self.grid.state());
        }
        self.grid.commit(next)?;
        self.sync_assignments()
    }

    /// Type text into a cell (stored with the session date); empty text clears it
    pub fn set_cell_text(&mut self, row: usize, col: usize, text: &str) -> Result<Vec<Mutation>> {
        let text = text.trim();
        let value = if text.is_empty() {
            String::new()
        } else {
            cell_text::encode(self.date, text)
        };
        self.edit_grid(false, |grid| grid.set_text(row, col, value))
    }

    pub fn set_cell_color(&mut self, row: usize, col: usize, color: Option<CellColor>) -> Result<()> {
        let mut next = self.grid().clone();
        next.set_color(row, col, color)?;
        self.grid.commit(next)
    }

    pub fn clear_cell(&mut self, row: usize, col: usize) -> Result<Vec<Mutation>> {
        self.edit_grid(true, |grid| grid.clear_cell(row, col))
    }

    /// Clear a selection of cells as one undoable step
    pub fn clear_cells(&mut self, cells: &[(usize, usize)]) -> Result<Vec<Mutation>> {
        self.edit_grid(true, |grid| {
            cells
                .iter()
                .try_for_each(|&(row, col)| grid.clear_cell(row, col))
        })
    }

    pub fn clear_row(&mut self, row: usize) -> Result<Vec<Mutation>> {
        self.edit_grid(true, |grid| grid.clear_row(row))
    }

    pub fn clear_column(&mut self, col: usize) -> Result<Vec<Mutation>> {
        self.edit_grid(true, |grid| grid.clear_column(col))
    }

    /// Clear every cell (undoable); staff headers are kept
    pub fn clear_grid(&mut self) -> Result<Vec<Mutation>> {
        self.edit_grid(true, |grid| {
            grid.clear_all();
            Ok(())
        })
    }

    pub fn add_row(&mut self) -> Result<usize> {
        let mut next = self.grid().clone();
        let row = next.add_row();
        self.grid.commit(next)?;
        Ok(row)
    }

    /// Add a staff column; unnamed columns are called `"IB <n>"`
    pub fn add_column(&mut self, name: Option<String>) -> Result<usize> {
        let mut next = self.grid().clone();
        let col = next.add_column(name);
        self.grid.commit(next)?;
        Ok(col)
    }

    /// Rename a staff column; residents in it follow the new name
    pub fn rename_staff(&mut self, col: usize, name: &str) -> Result<Vec<Mutation>> {
        let name = name.trim().to_string();
        self.edit_grid(false, |grid| grid.rename_staff(col, name))
    }

    /// Returns false when there was nothing to undo
    pub fn undo_grid(&mut self) -> Result<bool> {
        match self.grid_history.undo(self.grid.state()) {
            Some(previous) => {
                self.grid.commit(previous)?;
                self.sync_assignments()?;
                Ok(true)
            }
            None => {
                debug!("Grid undo: nothing to undo");
                Ok(false)
            }
        }
    }

    /// Returns false when there was nothing to redo
    pub fn redo_grid(&mut self) -> Result<bool> {
        match self.grid_history.redo(self.grid.state()) {
            Some(next) => {
                self.grid.commit(next)?;
                self.sync_assignments()?;
                Ok(true)
            }
            None => {
                debug!("Grid redo: nothing to redo");
                Ok(false)
            }
        }
    }

    pub fn can_undo_grid(&self) -> bool {
        self.grid_history.can_undo()
    }

    pub fn can_redo_grid(&self) -> bool {
        self.grid_history.can_redo()
    }
}

fn find_mut(residents: &mut [Resident], id: ResidentId) -> Result<&mut Resident> {
    residents
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| Error::NotFound(format!("Resident {}", id)))
}

/// Grid cells that belong to `resident`
///
/// A cell belongs to the resident when its text is an exact match for the
/// resident's name (either order, any case) or is the entry the reconciler
/// resolves the resident to. Text that is a direct hit for another resident
/// in `registry` is never claimed.
fn positions_of(grid: &Grid, registry: &[Resident], resident: &Resident) -> Vec<(usize, usize)> {
    let Some(candidates) = resident.name_candidates() else {
        return Vec::new();
    };
    let assignments = extract(grid);
    let resolved = reconcile::resolve(resident, &assignments).map(|r| r.assignee_text.to_string());

    let others: HashSet<String> = registry
        .iter()
        .filter(|r| r.id != resident.id)
        .filter_map(Resident::name_candidates)
        .flatten()
        .filter(|name| !candidates.contains(name))
        .collect();

    grid.positions_where(|text| {
        if others.contains(text) {
            return false;
        }
        resolved.as_deref() == Some(text)
            || candidates
                .iter()
                .any(|c| match_names(c, text).kind == MatchKind::Exact)
    })
}
