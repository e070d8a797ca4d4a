//! Loans repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::LoansRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::{Loan, LoanStatusCount, NewLoan},
    },
};

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansRepository for PgLoansRepository {
    /// Get loan by ID
    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list(&self, status: Option<LoanStatus>) -> AppResult<Vec<Loan>> {
        let loans = match status {
            Some(status) => {
                sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE status = $1 ORDER BY loan_date DESC")
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY loan_date DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(loans)
    }

    async fn resource_ids(&self, loan_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT resource_id FROM loan_resources WHERE loan_id = $1 ORDER BY resource_id",
        )
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Create a new loan and link its resources
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (teacher_id, area_id, grade_id, section_id, status, is_authorized, loan_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(loan.teacher_id)
        .bind(loan.area_id)
        .bind(loan.grade_id)
        .bind(loan.section_id)
        .bind(loan.status)
        .bind(loan.is_authorized)
        .bind(loan.loan_date)
        .bind(&loan.notes)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO loan_resources (loan_id, resource_id) SELECT $1, UNNEST($2::int4[])",
        )
        .bind(created.id)
        .bind(&loan.resource_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }

    async fn update_if_status(&self, loan: &Loan, expected: LoanStatus) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = $1, is_authorized = $2, actual_return_date = $3, notes = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(loan.status)
        .bind(loan.is_authorized)
        .bind(loan.actual_return_date)
        .bind(&loan.notes)
        .bind(loan.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Loan {} is no longer {}",
                loan.id, expected
            )));
        }
        Ok(())
    }

    async fn restore(&self, loan: &Loan) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE loans
            SET status = $1, is_authorized = $2, actual_return_date = $3, notes = $4
            WHERE id = $5
            "#,
        )
        .bind(loan.status)
        .bind(loan.is_authorized)
        .bind(loan.actual_return_date)
        .bind(&loan.notes)
        .bind(loan.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_loan_for_resource(&self, resource_id: i32, exclude_loan_id: i32) -> AppResult<Option<i32>> {
        let holder = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT l.id
            FROM loans l
            JOIN loan_resources lr ON lr.loan_id = l.id
            WHERE lr.resource_id = $1 AND l.id <> $2 AND l.status IN ($3, $4)
            LIMIT 1
            "#,
        )
        .bind(resource_id)
        .bind(exclude_loan_id)
        .bind(LoanStatus::Activo)
        .bind(LoanStatus::Atrasado)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holder)
    }

    async fn count_by_status(&self) -> AppResult<Vec<LoanStatusCount>> {
        let rows = sqlx::query_as::<_, (LoanStatus, i64)>(
            "SELECT status, COUNT(*) FROM loans GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| LoanStatusCount { status, count })
            .collect())
    }
}
