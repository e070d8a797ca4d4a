//! Lendable resource model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::ResourceStatus;

/// Resource record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Resource {
    pub id: i32,
    pub category_id: i32,
    /// Name / description shown to staff
    pub name: String,
    pub status: ResourceStatus,
    /// Accumulated audit note blocks
    pub notes: Option<String>,
}

/// Resource count per status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceStatusCount {
    pub status: ResourceStatus,
    pub count: i64,
}
