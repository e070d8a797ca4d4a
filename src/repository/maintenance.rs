//! Maintenance records, incidents and status history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::MaintenanceRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::MaintenanceStatus,
        maintenance::{
            Incident, MaintenanceQuery, MaintenanceRecord, NewIncident, NewMaintenance,
            NewStatusHistory, StatusHistory,
        },
    },
};

#[derive(Clone)]
pub struct PgMaintenanceRepository {
    pool: Pool<Postgres>,
}

impl PgMaintenanceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaintenanceRepository for PgMaintenanceRepository {
    async fn create(&self, record: &NewMaintenance) -> AppResult<MaintenanceRecord> {
        let row = sqlx::query_as::<_, MaintenanceRecord>(
            r#"
            INSERT INTO maintenance_records (
                resource_id, maintenance_type, incident_category, description,
                current_status, estimated_completion_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(record.resource_id)
        .bind(record.maintenance_type)
        .bind(&record.incident_category)
        .bind(&record.description)
        .bind(MaintenanceStatus::Pendiente)
        .bind(record.estimated_completion_date)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<MaintenanceRecord> {
        sqlx::query_as::<_, MaintenanceRecord>("SELECT * FROM maintenance_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance record {} not found", id)))
    }

    async fn list(&self, query: &MaintenanceQuery) -> AppResult<Vec<MaintenanceRecord>> {
        let rows = sqlx::query_as::<_, MaintenanceRecord>(
            r#"
            SELECT * FROM maintenance_records
            WHERE ($1::int4 IS NULL OR resource_id = $1)
              AND ($2::text IS NULL OR current_status = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(query.resource_id)
        .bind(query.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update(&self, record: &MaintenanceRecord) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE maintenance_records
            SET current_status = $1, estimated_completion_date = $2, updated_at = $3, completed_at = $4
            WHERE id = $5
            "#,
        )
        .bind(record.current_status)
        .bind(record.estimated_completion_date)
        .bind(record.updated_at)
        .bind(record.completed_at)
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Maintenance record {} not found", record.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE incidents SET maintenance_id = NULL WHERE maintenance_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM maintenance_history WHERE maintenance_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM maintenance_records WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Maintenance record {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_open_for_resource(&self, resource_id: i32, exclude_id: Option<i32>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM maintenance_records
            WHERE resource_id = $1 AND current_status != $2
              AND ($3::int4 IS NULL OR id != $3)
            "#,
        )
        .bind(resource_id)
        .bind(MaintenanceStatus::Completado)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn max_incident_number(&self, resource_id: i32) -> AppResult<i32> {
        let max: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(incident_number), 0) FROM incidents WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max)
    }

    async fn create_incident(&self, incident: &NewIncident) -> AppResult<Incident> {
        let (teacher, grade, section) = match &incident.reporter {
            Some(r) => (
                Some(r.teacher_name.clone()),
                Some(r.grade.clone()),
                Some(r.section.clone()),
            ),
            None => (None, None, None),
        };

        // UNIQUE (resource_id, incident_number) rejects a duplicate number
        let row = sqlx::query_as::<_, Incident>(
            r#"
            INSERT INTO incidents (
                maintenance_id, resource_id, incident_number, incident_category,
                damage_type, damage_description, reporter_teacher, reporter_grade,
                reporter_section, current_status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(incident.maintenance_id)
        .bind(incident.resource_id)
        .bind(incident.incident_number)
        .bind(&incident.incident_category)
        .bind(&incident.damage_type)
        .bind(&incident.damage_description)
        .bind(teacher)
        .bind(grade)
        .bind(section)
        .bind(MaintenanceStatus::Pendiente)
        .bind(incident.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_incident(&self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_incidents_by_resource(&self, resource_id: i32) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, Incident>(
            "SELECT * FROM incidents WHERE resource_id = $1 ORDER BY incident_number",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_incidents_by_maintenance(&self, maintenance_id: i32) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, Incident>(
            "SELECT * FROM incidents WHERE maintenance_id = $1 ORDER BY incident_number",
        )
        .bind(maintenance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_open_incidents(&self) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, Incident>(
            r#"
            SELECT i.* FROM incidents i
            JOIN maintenance_records m ON m.id = i.maintenance_id
            WHERE m.current_status != $1
            ORDER BY i.created_at, i.id
            "#,
        )
        .bind(MaintenanceStatus::Completado)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_incidents_status(&self, maintenance_id: i32, status: MaintenanceStatus) -> AppResult<u64> {
        let result = sqlx::query("UPDATE incidents SET current_status = $1 WHERE maintenance_id = $2")
            .bind(status)
            .bind(maintenance_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn add_history(&self, entry: &NewStatusHistory) -> AppResult<StatusHistory> {
        let row = sqlx::query_as::<_, StatusHistory>(
            r#"
            INSERT INTO maintenance_history (maintenance_id, previous_status, new_status, changed_by, notes, changed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.maintenance_id)
        .bind(entry.previous_status)
        .bind(entry.new_status)
        .bind(entry.changed_by)
        .bind(&entry.notes)
        .bind(entry.changed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_history(&self, maintenance_id: i32) -> AppResult<Vec<StatusHistory>> {
        let rows = sqlx::query_as::<_, StatusHistory>(
            "SELECT * FROM maintenance_history WHERE maintenance_id = $1 ORDER BY changed_at, id",
        )
        .bind(maintenance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_open(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM maintenance_records WHERE current_status != $1",
        )
        .bind(MaintenanceStatus::Completado)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM maintenance_records
            WHERE current_status != $1 AND estimated_completion_date < $2
            "#,
        )
        .bind(MaintenanceStatus::Completado)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
