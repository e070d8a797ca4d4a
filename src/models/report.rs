//! Return-time damage and suggestion reports

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{enums::ResourceStatus, loan::Loan, maintenance::MaintenanceDetails};

/// Damage found on one resource when the loan is returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DamageReport {
    pub resource_id: i32,
    #[serde(default)]
    pub damages: Vec<String>,
    pub notes: Option<String>,
}

/// Improvement suggestions for one resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuggestionReport {
    pub resource_id: i32,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub notes: Option<String>,
}

/// Return loan request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ReturnLoan {
    /// National identity number of the borrower (8 digits)
    #[validate(custom(function = "validate_dni"))]
    pub dni: String,
    #[serde(default)]
    pub damage_reports: Vec<DamageReport>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionReport>,
}

/// Who filed a report, captured when the incident is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReporterContext {
    pub teacher_name: String,
    pub grade: String,
    pub section: String,
}

impl ReporterContext {
    pub fn line(&self) -> String {
        format!(
            "Reportado por: {} ({} - {})",
            self.teacher_name, self.grade, self.section
        )
    }
}

/// Status decision taken for one resource of a returned loan
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResourceOutcome {
    pub resource_id: i32,
    pub previous_status: ResourceStatus,
    pub status: ResourceStatus,
    /// Audit block appended to the resource notes
    pub note: Option<String>,
}

/// Result of a completed return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnSummary {
    pub loan: Loan,
    /// Outcomes keyed by resource id, in resource id order
    #[schema(value_type = Object)]
    pub resources: IndexMap<i32, ResourceOutcome>,
    /// Maintenance opened for damaged resources
    pub maintenance: Vec<MaintenanceDetails>,
}

pub fn validate_dni(dni: &str) -> Result<(), ValidationError> {
    if dni.len() == 8 && dni.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("dni");
        err.message = Some("DNI must be exactly 8 digits".into());
        Err(err)
    }
}
