//! Maintenance records, per-damage incidents and their status history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{
    enums::{MaintenanceStatus, MaintenanceType},
    report::ReporterContext,
};

/// Category given to maintenance opened from a damage report
pub const DAMAGE_CATEGORY: &str = "daño";

/// Maintenance tracking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MaintenanceRecord {
    pub id: i32,
    pub resource_id: i32,
    pub maintenance_type: MaintenanceType,
    pub incident_category: Option<String>,
    pub description: String,
    pub current_status: MaintenanceStatus,
    pub estimated_completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set iff `current_status` is `Completado`
    pub completed_at: Option<DateTime<Utc>>,
}

/// One reported damage item, numbered per resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Incident {
    pub id: i32,
    /// Detached (None) once its maintenance record is deleted
    pub maintenance_id: Option<i32>,
    pub resource_id: i32,
    pub incident_number: i32,
    pub incident_category: Option<String>,
    pub damage_type: String,
    pub damage_description: String,
    pub reporter_teacher: Option<String>,
    pub reporter_grade: Option<String>,
    pub reporter_section: Option<String>,
    pub current_status: MaintenanceStatus,
    pub created_at: DateTime<Utc>,
}

/// Status change audit entry of a maintenance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StatusHistory {
    pub id: i32,
    pub maintenance_id: i32,
    pub previous_status: MaintenanceStatus,
    pub new_status: MaintenanceStatus,
    pub changed_by: i32,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Maintenance record with everything attached to it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceDetails {
    #[serde(flatten)]
    pub record: MaintenanceRecord,
    pub incidents: Vec<Incident>,
    pub history: Vec<StatusHistory>,
}

/// Create maintenance request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMaintenance {
    pub resource_id: i32,
    pub maintenance_type: MaintenanceType,
    pub incident_category: Option<String>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    /// One incident is opened per entry
    #[serde(default)]
    pub damages: Vec<String>,
    pub reporter: Option<ReporterContext>,
    pub estimated_completion_date: Option<DateTime<Utc>>,
}

/// Update maintenance status request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateMaintenanceStatus {
    pub status: MaintenanceStatus,
    pub notes: Option<String>,
    pub estimated_completion_date: Option<DateTime<Utc>>,
}

/// Maintenance listing filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct MaintenanceQuery {
    pub resource_id: Option<i32>,
    pub status: Option<MaintenanceStatus>,
}

/// Row to insert for a maintenance record
#[derive(Debug, Clone)]
pub struct NewMaintenance {
    pub resource_id: i32,
    pub maintenance_type: MaintenanceType,
    pub incident_category: Option<String>,
    pub description: String,
    pub estimated_completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row to insert for an incident; the number is allocated by the sequencer
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub maintenance_id: i32,
    pub resource_id: i32,
    pub incident_number: i32,
    pub incident_category: Option<String>,
    pub damage_type: String,
    pub damage_description: String,
    pub reporter: Option<ReporterContext>,
    pub created_at: DateTime<Utc>,
}

/// Row to insert for a status history entry
#[derive(Debug, Clone)]
pub struct NewStatusHistory {
    pub maintenance_id: i32,
    pub previous_status: MaintenanceStatus,
    pub new_status: MaintenanceStatus,
    pub changed_by: i32,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}
