use std::collections::BTreeMap;

use async_trait::async_trait;
use eqviz_parser::EquipmentRecord;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;

use super::{
    CreatedDataset, DatasetInfo, EquipmentFilter, EquipmentItem, NewDataset, NewUser, Repository,
    StoredAnalysis,
};
use crate::analytics::{AnalysisSnapshot, TypeStats};
use crate::error::{CoreError, Result};
use crate::users::User;

const DATASET_COLUMNS: &str = r#"
    SELECT d.dataset_id,
           d.name,
           d.owner_id,
           u.username,
           d.file_name,
           d.file_hash,
           d.file_size,
           d.uploaded_at,
           d.row_count,
           EXISTS (
               SELECT 1 FROM analysis_results a WHERE a.dataset_id = d.dataset_id
           ) AS has_analysis
      FROM datasets d
      JOIN users u ON u.user_id = d.owner_id
"#;

const EQUIPMENT_COLUMNS: &str = r#"
    SELECT e.equipment_id,
           e.dataset_id,
           e.name,
           e.equipment_type,
           e.flowrate,
           e.pressure,
           e.temperature
      FROM equipment e
      JOIN datasets d ON d.dataset_id = e.dataset_id
"#;

#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_dataset(
        tx: &mut Transaction<'_, Postgres>,
        dataset_id: i64,
    ) -> Result<DatasetInfo> {
        let query = format!("{DATASET_COLUMNS} WHERE d.dataset_id = $1");
        let row = sqlx::query(&query)
            .bind(dataset_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(dataset_from_row(&row)?)
    }

    async fn insert_records(
        tx: &mut Transaction<'_, Postgres>,
        dataset_id: i64,
        records: &[EquipmentRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut names = Vec::with_capacity(records.len());
        let mut types = Vec::with_capacity(records.len());
        let mut flowrates = Vec::with_capacity(records.len());
        let mut pressures = Vec::with_capacity(records.len());
        let mut temperatures = Vec::with_capacity(records.len());
        for record in records {
            names.push(record.name.clone());
            types.push(record.equipment_type.clone());
            flowrates.push(record.flowrate);
            pressures.push(record.pressure);
            temperatures.push(record.temperature);
        }

        sqlx::query(
            r#"
            INSERT INTO equipment (dataset_id, name, equipment_type, flowrate, pressure, temperature)
            SELECT $1, name, equipment_type, flowrate, pressure, temperature
              FROM UNNEST($2::text[], $3::text[], $4::float8[], $5::float8[], $6::float8[])
                AS t(name, equipment_type, flowrate, pressure, temperature)
            "#,
        )
        .bind(dataset_id)
        .bind(&names)
        .bind(&types)
        .bind(&flowrates)
        .bind(&pressures)
        .bind(&temperatures)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_snapshot(
        tx: &mut Transaction<'_, Postgres>,
        dataset_id: i64,
        snapshot: &AnalysisSnapshot,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_results (
                dataset_id, total_count,
                avg_flowrate, avg_pressure, avg_temperature,
                min_flowrate, max_flowrate,
                min_pressure, max_pressure,
                min_temperature, max_temperature,
                std_flowrate, std_pressure, std_temperature,
                type_distribution, stats_by_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(dataset_id)
        .bind(snapshot.total_count as i64)
        .bind(snapshot.avg_flowrate)
        .bind(snapshot.avg_pressure)
        .bind(snapshot.avg_temperature)
        .bind(snapshot.min_flowrate)
        .bind(snapshot.max_flowrate)
        .bind(snapshot.min_pressure)
        .bind(snapshot.max_pressure)
        .bind(snapshot.min_temperature)
        .bind(snapshot.max_temperature)
        .bind(snapshot.std_flowrate)
        .bind(snapshot.std_pressure)
        .bind(snapshot.std_temperature)
        .bind(Json(&snapshot.type_distribution))
        .bind(Json(&snapshot.stats_by_type))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (username, token_hash)
            VALUES ($1, $2)
            RETURNING user_id, username, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CoreError::UsernameTaken(user.username.clone())
            }
            other => CoreError::Sqlx(other),
        })?;

        Ok(user_from_row(&row)?)
    }

    async fn find_user_by_token(&self, token_hash: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, username, created_at FROM users WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn create_dataset(
        &self,
        dataset: NewDataset,
        max_per_owner: usize,
    ) -> Result<CreatedDataset> {
        let mut tx = self.pool.begin().await?;

        // Serializes uploads of one owner so the retention cap holds.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(dataset.owner_id)
            .execute(&mut *tx)
            .await?;

        let dataset_id: i64 = sqlx::query(
            r#"
            INSERT INTO datasets (owner_id, name, file_name, file_hash, file_size, uploaded_at, row_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING dataset_id
            "#,
        )
        .bind(dataset.owner_id)
        .bind(&dataset.name)
        .bind(&dataset.file_name)
        .bind(&dataset.file_hash)
        .bind(dataset.file_size)
        .bind(dataset.uploaded_at)
        .bind(dataset.records.len() as i64)
        .fetch_one(&mut *tx)
        .await?
        .try_get("dataset_id")?;

        Self::insert_records(&mut tx, dataset_id, &dataset.records).await?;
        Self::insert_snapshot(&mut tx, dataset_id, &dataset.snapshot).await?;

        let evicted: Vec<i64> = sqlx::query(
            r#"
            DELETE FROM datasets
             WHERE dataset_id IN (
                   SELECT dataset_id
                     FROM datasets
                    WHERE owner_id = $1
                    ORDER BY uploaded_at DESC, dataset_id DESC
                   OFFSET $2
             )
            RETURNING dataset_id
            "#,
        )
        .bind(dataset.owner_id)
        .bind(max_per_owner as i64)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.try_get("dataset_id"))
        .collect::<std::result::Result<_, _>>()?;

        let created = Self::fetch_dataset(&mut tx, dataset_id).await?;
        tx.commit().await?;

        if !evicted.is_empty() {
            info!(
                owner_id = dataset.owner_id,
                evicted = ?evicted,
                "evicted datasets beyond retention cap"
            );
        }

        Ok(CreatedDataset {
            dataset: created,
            evicted,
        })
    }

    async fn list_datasets(&self, owner_id: i64) -> Result<Vec<DatasetInfo>> {
        let query = format!(
            "{DATASET_COLUMNS} WHERE d.owner_id = $1 ORDER BY d.uploaded_at DESC, d.dataset_id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| dataset_from_row(row).map_err(CoreError::from))
            .collect()
    }

    async fn get_dataset(&self, owner_id: i64, dataset_id: i64) -> Result<DatasetInfo> {
        let query = format!("{DATASET_COLUMNS} WHERE d.dataset_id = $1 AND d.owner_id = $2");
        let row = sqlx::query(&query)
            .bind(dataset_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::dataset_not_found(dataset_id))?;

        Ok(dataset_from_row(&row)?)
    }

    async fn delete_dataset(&self, owner_id: i64, dataset_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM datasets WHERE dataset_id = $1 AND owner_id = $2")
            .bind(dataset_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::dataset_not_found(dataset_id));
        }
        Ok(())
    }

    async fn fetch_analysis(&self, dataset_id: i64) -> Result<Option<StoredAnalysis>> {
        let row = sqlx::query(
            r#"
            SELECT total_count,
                   avg_flowrate, avg_pressure, avg_temperature,
                   min_flowrate, max_flowrate,
                   min_pressure, max_pressure,
                   min_temperature, max_temperature,
                   std_flowrate, std_pressure, std_temperature,
                   type_distribution, stats_by_type,
                   computed_at
              FROM analysis_results
             WHERE dataset_id = $1
            "#,
        )
        .bind(dataset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(analysis_from_row).transpose()?)
    }

    async fn list_equipment(
        &self,
        owner_id: i64,
        filter: &EquipmentFilter,
    ) -> Result<Vec<EquipmentItem>> {
        let query = format!(
            r#"{EQUIPMENT_COLUMNS}
             WHERE d.owner_id = $1
               AND ($2::bigint IS NULL OR e.dataset_id = $2)
               AND ($3::text IS NULL OR lower(e.equipment_type) = lower($3))
             ORDER BY e.name, e.equipment_id"#
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(filter.dataset_id)
            .bind(filter.equipment_type.as_deref())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| equipment_from_row(row).map_err(CoreError::from))
            .collect()
    }

    async fn get_equipment(&self, owner_id: i64, equipment_id: i64) -> Result<EquipmentItem> {
        let query = format!("{EQUIPMENT_COLUMNS} WHERE e.equipment_id = $1 AND d.owner_id = $2");
        let row = sqlx::query(&query)
            .bind(equipment_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::equipment_not_found(equipment_id))?;

        Ok(equipment_from_row(&row)?)
    }
}

fn user_from_row(row: &PgRow) -> std::result::Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

fn dataset_from_row(row: &PgRow) -> std::result::Result<DatasetInfo, sqlx::Error> {
    Ok(DatasetInfo {
        id: row.try_get("dataset_id")?,
        name: row.try_get("name")?,
        owner_id: row.try_get("owner_id")?,
        owner_username: row.try_get("username")?,
        file_name: row.try_get("file_name")?,
        file_hash: row.try_get("file_hash")?,
        file_size: row.try_get("file_size")?,
        uploaded_at: row.try_get("uploaded_at")?,
        row_count: row.try_get("row_count")?,
        has_analysis: row.try_get("has_analysis")?,
    })
}

fn equipment_from_row(row: &PgRow) -> std::result::Result<EquipmentItem, sqlx::Error> {
    Ok(EquipmentItem {
        id: row.try_get("equipment_id")?,
        dataset_id: row.try_get("dataset_id")?,
        record: EquipmentRecord {
            name: row.try_get("name")?,
            equipment_type: row.try_get("equipment_type")?,
            flowrate: row.try_get("flowrate")?,
            pressure: row.try_get("pressure")?,
            temperature: row.try_get("temperature")?,
        },
    })
}

fn analysis_from_row(row: &PgRow) -> std::result::Result<StoredAnalysis, sqlx::Error> {
    let total_count: i64 = row.try_get("total_count")?;
    let Json(type_distribution): Json<BTreeMap<String, usize>> =
        row.try_get("type_distribution")?;
    let Json(stats_by_type): Json<BTreeMap<String, TypeStats>> = row.try_get("stats_by_type")?;

    Ok(StoredAnalysis {
        snapshot: AnalysisSnapshot {
            total_count: total_count.max(0) as usize,
            avg_flowrate: row.try_get("avg_flowrate")?,
            avg_pressure: row.try_get("avg_pressure")?,
            avg_temperature: row.try_get("avg_temperature")?,
            min_flowrate: row.try_get("min_flowrate")?,
            max_flowrate: row.try_get("max_flowrate")?,
            min_pressure: row.try_get("min_pressure")?,
            max_pressure: row.try_get("max_pressure")?,
            min_temperature: row.try_get("min_temperature")?,
            max_temperature: row.try_get("max_temperature")?,
            std_flowrate: row.try_get("std_flowrate")?,
            std_pressure: row.try_get("std_pressure")?,
            std_temperature: row.try_get("std_temperature")?,
            type_distribution,
            stats_by_type,
        },
        computed_at: row.try_get("computed_at")?,
    })
}
