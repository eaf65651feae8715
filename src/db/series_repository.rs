use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use crate::db::DbError;
use crate::importers::CpiPoint;

#[derive(Clone)]
pub struct SeriesRepository {
    pool: SqlitePool,
}

impl SeriesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the cpi_values table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cpi_values (
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (category, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a category's series in a transaction; re-running an update
    /// replaces values rather than duplicating rows.
    #[instrument(skip(self, points), fields(category = %category, count = points.len()))]
    pub async fn insert_series(&self, category: &str, points: &[CpiPoint]) -> Result<u64, DbError> {
        debug!("Beginning transaction to upsert {} points", points.len());
        let mut tx = self.pool.begin().await?;
        let mut upserted = 0;

        for point in points {
            let result = sqlx::query(
                r#"
                INSERT INTO cpi_values (category, date, value)
                VALUES (?, ?, ?)
                ON CONFLICT (category, date) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(category)
            .bind(point.date)
            .bind(point.value)
            .execute(&mut *tx)
            .await?;
            upserted += result.rows_affected();
        }

        tx.commit().await?;
        info!("Upserted {} points for category {}", upserted, category);
        Ok(upserted)
    }

    pub async fn count_points(&self, category: &str) -> Result<i64, DbError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cpi_values WHERE category = ?")
            .bind(category)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
