//! Areas, grades and sections referenced by loans

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::ReferencesRepository;
use crate::{error::AppResult, models::user::Reference};

#[derive(Clone)]
pub struct PgReferencesRepository {
    pool: Pool<Postgres>,
}

impl PgReferencesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn find(&self, table: &str, id: i32) -> AppResult<Option<Reference>> {
        let query = format!("SELECT id, name FROM {} WHERE id = $1", table);
        let row = sqlx::query_as::<_, Reference>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl ReferencesRepository for PgReferencesRepository {
    async fn find_area(&self, id: i32) -> AppResult<Option<Reference>> {
        self.find("areas", id).await
    }

    async fn find_grade(&self, id: i32) -> AppResult<Option<Reference>> {
        self.find("grades", id).await
    }

    async fn find_section(&self, id: i32) -> AppResult<Option<Reference>> {
        self.find("sections", id).await
    }
}
