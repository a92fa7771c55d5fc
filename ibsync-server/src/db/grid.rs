//! Grid cell persistence
//!
//! A save is a full snapshot of one assignment date: records present in the
//! request are upserted, empty records delete their cell, and positions of the
//! date that the snapshot no longer mentions are removed. The cells and the
//! staff headers sent with them are written in one transaction.

use chrono::NaiveDate;
use ibsync_common::api::{BatchOutcome, GridCellRecord};
use ibsync_common::{CellColor, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;

/// Dataset key for the sync_meta table
pub fn dataset_key(date: NaiveDate) -> String {
    format!("grid:{}", date)
}

fn color_to_str(color: CellColor) -> &'static str {
    match color {
        CellColor::Red => "red",
        CellColor::Blue => "blue",
        CellColor::Gray => "gray",
    }
}

fn color_from_str(raw: &str) -> Option<CellColor> {
    match raw {
        "red" => Some(CellColor::Red),
        "blue" => Some(CellColor::Blue),
        "gray" => Some(CellColor::Gray),
        _ => None,
    }
}

/// Load every stored cell of `date`, ordered by row then column
pub async fn load_cells(pool: &SqlitePool, date: NaiveDate) -> Result<Vec<GridCellRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT row_number, column_number, resident_name, color_status
        FROM grid_cells
        WHERE assignment_date = ?
        ORDER BY row_number, column_number
        "#,
    )
    .bind(date.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let color: Option<String> = row.get("color_status");
            GridCellRecord {
                row_number: row.get("row_number"),
                column_number: row.get("column_number"),
                resident_name: row.get("resident_name"),
                color_status: color.as_deref().and_then(color_from_str),
                assignment_date: Some(date),
            }
        })
        .collect())
}

/// Upsert one cell
async fn save_cell(conn: &mut SqliteConnection, date: NaiveDate, cell: &GridCellRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO grid_cells (
            assignment_date, row_number, column_number, resident_name, color_status, updated_at
        ) VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(assignment_date, row_number, column_number) DO UPDATE SET
            resident_name = excluded.resident_name,
            color_status = excluded.color_status,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(date.to_string())
    .bind(cell.row_number)
    .bind(cell.column_number)
    .bind(cell.resident_name.trim())
    .bind(cell.color_status.map(color_to_str))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete one cell
async fn delete_cell(conn: &mut SqliteConnection, date: NaiveDate, row: i64, column: i64) -> Result<()> {
    sqlx::query(
        "DELETE FROM grid_cells WHERE assignment_date = ? AND row_number = ? AND column_number = ?",
    )
    .bind(date.to_string())
    .bind(row)
    .bind(column)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Store a full snapshot of `date` together with the staff headers
///
/// Each record counts toward its outcome; records with coordinates below 1
/// and records whose write fails are counted as failed without undoing the
/// rest. Any other failure rolls the whole save back.
pub async fn save_snapshot(
    pool: &SqlitePool,
    date: NaiveDate,
    cells: &[GridCellRecord],
    staff_names: &[String],
) -> Result<(BatchOutcome, BatchOutcome)> {
    let mut tx = pool.begin().await?;
    let grid = write_cells(&mut *tx, date, cells).await?;
    let staff = super::staff::write_staff(&mut *tx, staff_names).await?;
    tx.commit().await?;

    tracing::debug!(
        date = %date,
        successful = grid.successful,
        failed = grid.failed,
        "Grid snapshot stored"
    );
    Ok((grid, staff))
}

async fn write_cells(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    cells: &[GridCellRecord],
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    let mut kept = HashSet::new();

    for cell in cells {
        if cell.row_number < 1 || cell.column_number < 1 {
            tracing::warn!(
                row = cell.row_number,
                column = cell.column_number,
                "Rejecting cell with invalid coordinates"
            );
            outcome.record(false);
            continue;
        }

        let result = if cell.is_empty() {
            delete_cell(conn, date, cell.row_number, cell.column_number).await
        } else {
            kept.insert((cell.row_number, cell.column_number));
            save_cell(conn, date, cell).await
        };

        if let Err(e) = &result {
            tracing::warn!(
                row = cell.row_number,
                column = cell.column_number,
                error = %e,
                "Cell save failed"
            );
        }
        outcome.record(result.is_ok());
    }

    let stale: Vec<(i64, i64)> = sqlx::query(
        "SELECT row_number, column_number FROM grid_cells WHERE assignment_date = ?",
    )
    .bind(date.to_string())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| (row.get::<i64, _>("row_number"), row.get::<i64, _>("column_number")))
    .filter(|position| !kept.contains(position))
    .collect();

    for (row, column) in stale {
        delete_cell(conn, date, row, column).await?;
    }

    super::touch_saved_at(conn, &dataset_key(date)).await?;
    Ok(outcome)
}
