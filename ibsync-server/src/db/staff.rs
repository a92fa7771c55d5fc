//! Staff column headers

use ibsync_common::api::{BatchOutcome, StaffRecord};
use ibsync_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Dataset key for the sync_meta table
pub const DATASET: &str = "staff";

/// All staff headers ordered by position
pub async fn load_staff(pool: &SqlitePool) -> Result<Vec<StaffRecord>> {
    let rows = sqlx::query("SELECT position, name FROM staff ORDER BY position")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| StaffRecord {
            position: row.get("position"),
            name: row.get("name"),
        })
        .collect())
}

/// Upsert one staff header
pub async fn upsert_staff(pool: &SqlitePool, record: &StaffRecord) -> Result<()> {
    let mut tx = pool.begin().await?;
    write_header(&mut *tx, record).await?;
    super::touch_saved_at(&mut *tx, DATASET).await?;
    tx.commit().await?;
    Ok(())
}

async fn write_header(conn: &mut SqliteConnection, record: &StaffRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO staff (position, name, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(position) DO UPDATE SET
            name = excluded.name,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(record.position)
    .bind(record.name.trim())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Store `names` at positions 1..=n and drop any position beyond n
///
/// Runs on the caller's connection so it joins the grid save transaction.
pub(crate) async fn write_staff(conn: &mut SqliteConnection, names: &[String]) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for (i, name) in names.iter().enumerate() {
        let record = StaffRecord {
            position: (i + 1) as i64,
            name: name.clone(),
        };
        let result = write_header(conn, &record).await;

        if let Err(e) = &result {
            tracing::warn!(position = i + 1, error = %e, "Staff save failed");
        }
        outcome.record(result.is_ok());
    }

    sqlx::query("DELETE FROM staff WHERE position > ?")
        .bind(names.len() as i64)
        .execute(&mut *conn)
        .await?;

    super::touch_saved_at(conn, DATASET).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_replace_shrinks_and_renames() {
        let pool = test_pool().await;
        let names: Vec<String> = ["Kris B", "Torben", "Didar"].iter().map(|s| s.to_string()).collect();
        let mut conn = pool.acquire().await.unwrap();
        write_staff(&mut conn, &names).await.unwrap();

        let outcome = write_staff(&mut conn, &["Kris B".to_string(), " Dorien ".to_string()])
            .await
            .unwrap();
        drop(conn);
        assert_eq!(outcome, BatchOutcome { successful: 2, failed: 0 });

        upsert_staff(&pool, &StaffRecord { position: 2, name: "Evelien".into() })
            .await
            .unwrap();

        let staff = load_staff(&pool).await.unwrap();
        assert_eq!(
            staff,
            vec![
                StaffRecord { position: 1, name: "Kris B".into() },
                StaffRecord { position: 2, name: "Evelien".into() },
            ]
        );
    }
}
