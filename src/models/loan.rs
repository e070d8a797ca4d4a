//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::LoanStatus;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub teacher_id: i32,
    pub area_id: i32,
    pub grade_id: i32,
    pub section_id: i32,
    pub status: LoanStatus,
    pub is_authorized: bool,
    pub loan_date: DateTime<Utc>,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Loan together with the resources it was created with
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub resource_ids: Vec<i32>,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    pub teacher_id: i32,
    pub area_id: i32,
    pub grade_id: i32,
    pub section_id: i32,
    #[validate(length(min = 1, message = "At least one resource is required"))]
    pub resource_ids: Vec<i32>,
    pub notes: Option<String>,
}

/// Row to insert; status and authorization are decided by the lifecycle manager
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub teacher_id: i32,
    pub area_id: i32,
    pub grade_id: i32,
    pub section_id: i32,
    pub status: LoanStatus,
    pub is_authorized: bool,
    pub loan_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub resource_ids: Vec<i32>,
}

/// Reject loan request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RejectLoan {
    pub reason: Option<String>,
}

/// Loan count per status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanStatusCount {
    pub status: LoanStatus,
    pub count: i64,
}
