//! Resources repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::ResourcesRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ResourceStatus,
        resource::{Resource, ResourceStatusCount},
    },
};

#[derive(Clone)]
pub struct PgResourcesRepository {
    pool: Pool<Postgres>,
}

impl PgResourcesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourcesRepository for PgResourcesRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Resource> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", id)))
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Resource>> {
        let rows = sqlx::query_as::<_, Resource>(
            "SELECT * FROM resources WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_if_status(&self, resource: &Resource, expected: ResourceStatus) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE resources SET status = $1, notes = $2 WHERE id = $3 AND status = $4",
        )
        .bind(resource.status)
        .bind(&resource.notes)
        .bind(resource.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Resource {} is no longer {}",
                resource.id, expected
            )));
        }
        Ok(())
    }

    async fn restore(&self, resource: &Resource) -> AppResult<()> {
        sqlx::query("UPDATE resources SET status = $1, notes = $2 WHERE id = $3")
            .bind(resource.status)
            .bind(&resource.notes)
            .bind(resource.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_by_status(&self) -> AppResult<Vec<ResourceStatusCount>> {
        let rows = sqlx::query_as::<_, (ResourceStatus, i64)>(
            "SELECT status, COUNT(*) FROM resources GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| ResourceStatusCount { status, count })
            .collect())
    }
}
