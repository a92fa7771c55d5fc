//! Resident registry persistence
//!
//! Residents are stored as JSON bodies so attributes the server does not know
//! about survive a round trip. A save replaces the whole registry in one
//! transaction: either every resident is stored or the previous registry stays.

use ibsync_common::api::BatchOutcome;
use ibsync_common::{Resident, Result};
use sqlx::{Row, SqlitePool};

/// Dataset key for the sync_meta table
pub const DATASET: &str = "residents";

/// All residents in their saved order
///
/// Rows whose body no longer parses are skipped with a warning.
pub async fn load_residents(pool: &SqlitePool) -> Result<Vec<Resident>> {
    let rows = sqlx::query("SELECT id, body FROM residents ORDER BY ordinal")
        .fetch_all(pool)
        .await?;

    let mut residents = Vec::with_capacity(rows.len());
    for row in rows {
        let body: String = row.get("body");
        match serde_json::from_str::<Resident>(&body) {
            Ok(resident) => residents.push(resident),
            Err(e) => {
                let id: String = row.get("id");
                tracing::warn!(id = %id, error = %e, "Skipping unreadable resident row");
            }
        }
    }
    Ok(residents)
}

/// Replace the registry with `residents`
///
/// Any failed row aborts the save and rolls back to the previous registry.
pub async fn replace_residents(pool: &SqlitePool, residents: &[Resident]) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM residents").execute(&mut *tx).await?;

    for (ordinal, resident) in residents.iter().enumerate() {
        let body = serde_json::to_string(resident)?;
        let result = sqlx::query(
            r#"
            INSERT INTO residents (id, ordinal, body) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                ordinal = excluded.ordinal,
                body = excluded.body
            "#,
        )
        .bind(resident.id.to_string())
        .bind(ordinal as i64)
        .bind(body)
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            tracing::warn!(id = %resident.id, error = %e, "Resident save failed, registry unchanged");
            return Err(e.into());
        }
        outcome.record(true);
    }

    super::touch_saved_at(&mut *tx, DATASET).await?;
    tx.commit().await?;
    tracing::debug!(count = residents.len(), "Registry stored");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_replace_keeps_order_and_attributes() {
        let pool = test_pool().await;

        let mut amina = Resident::new("Amina", "Yusuf").with_reference_person("Dorien");
        amina
            .attributes
            .insert("room".into(), serde_json::json!("12B"));
        let jan = Resident::new("Jan", "Peeters");

        let outcome = replace_residents(&pool, &[amina.clone(), jan.clone()]).await.unwrap();
        assert_eq!(outcome, BatchOutcome { successful: 2, failed: 0 });

        let loaded = load_residents(&pool).await.unwrap();
        assert_eq!(loaded, vec![amina.clone(), jan]);

        replace_residents(&pool, &[amina.clone()]).await.unwrap();
        assert_eq!(load_residents(&pool).await.unwrap(), vec![amina]);
    }

    #[tokio::test]
    async fn test_failed_row_keeps_previous_registry() {
        let pool = test_pool().await;
        let amina = Resident::new("Amina", "Yusuf");
        let jan = Resident::new("Jan", "Peeters");
        replace_residents(&pool, &[amina.clone(), jan.clone()]).await.unwrap();
        let stamped = crate::db::saved_at(&pool, DATASET).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_resident BEFORE INSERT ON residents
            WHEN NEW.body LIKE '%Rejected%'
            BEGIN
                SELECT RAISE(ABORT, 'rejected');
            END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let sam = Resident::new("Sam", "Walker");
        let rejected = Resident::new("Rejected", "Row");
        assert!(replace_residents(&pool, &[sam, rejected]).await.is_err());

        assert_eq!(load_residents(&pool).await.unwrap(), vec![amina, jan]);
        assert_eq!(crate::db::saved_at(&pool, DATASET).await.unwrap(), stamped);
    }
}
