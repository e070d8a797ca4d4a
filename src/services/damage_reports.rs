//! Return processing: reconciles damage and suggestion reports against every
//! resource of a loan, then commits loan, resources and maintenance as one
//! saga.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use validator::Validate;

use super::{
    locks::KeyedLocks,
    maintenance::{MaintenanceService, OpenedRecord},
    notifications::NotificationService,
    resource_state::{append_note, check_transition, clean_entries, clean_text, ResourceStateTracker},
    saga::{Compensation, Saga},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{LoanStatus, MaintenanceType},
        loan::Loan,
        maintenance::{CreateMaintenance, MaintenanceDetails, DAMAGE_CATEGORY},
        report::{
            DamageReport, ReporterContext, ResourceOutcome, ReturnLoan, ReturnSummary,
            SuggestionReport,
        },
        resource::Resource,
        user::User,
    },
    repository::Repository,
};

/// Every write of a return, computed and validated before the first one
struct ReturnPlan {
    loan: Loan,
    returned: Loan,
    /// (before, after) for each resource that changes
    resources: Vec<(Resource, Resource)>,
    maintenance: Vec<(Resource, CreateMaintenance)>,
    outcomes: IndexMap<i32, ResourceOutcome>,
}

#[derive(Clone)]
pub struct DamageReportProcessor {
    repository: Repository,
    tracker: ResourceStateTracker,
    maintenance: MaintenanceService,
    notifications: NotificationService,
    resource_locks: KeyedLocks,
}

impl DamageReportProcessor {
    pub fn new(
        repository: Repository,
        tracker: ResourceStateTracker,
        maintenance: MaintenanceService,
        notifications: NotificationService,
        resource_locks: KeyedLocks,
    ) -> Self {
        Self {
            repository,
            tracker,
            maintenance,
            notifications,
            resource_locks,
        }
    }

    /// Return `loan`. The caller holds the loan lock.
    pub async fn process(&self, loan: Loan, request: &ReturnLoan) -> AppResult<ReturnSummary> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        match loan.status {
            LoanStatus::Pendiente => {
                return Err(AppError::Conflict(format!("Loan {} has not been authorized", loan.id)))
            }
            status if status.is_closed() => {
                return Err(AppError::Conflict(format!("Loan {} is already {}", loan.id, status)))
            }
            _ => {}
        }

        let owner = self.repository.users.get_by_id(loan.teacher_id).await?;
        if owner.dni != request.dni {
            tracing::warn!(loan_id = loan.id, "Return rejected, DNI mismatch");
            return Err(AppError::Authorization("DNI no coincide".to_string()));
        }

        let damages = index_by_resource(&request.damage_reports, |r| r.resource_id, "damage report")?;
        let suggestions = index_by_resource(&request.suggestions, |r| r.resource_id, "suggestion")?;

        let resource_ids = self.repository.loans.resource_ids(loan.id).await?;
        if let Some(id) = damages
            .keys()
            .chain(suggestions.keys())
            .find(|id| !resource_ids.contains(*id))
        {
            return Err(AppError::Validation(format!(
                "Resource {} does not belong to loan {}",
                id, loan.id
            )));
        }

        // Held until the saga commits or is compensated
        let guards = self.resource_locks.lock_many(&resource_ids).await;
        let resources = self.repository.resources.get_many(&resource_ids).await?;
        if resources.len() != resource_ids.len() {
            return Err(AppError::NotFound(format!(
                "Some resources of loan {} no longer exist",
                loan.id
            )));
        }

        let reporter = self.reporter(&owner, &loan).await?;
        let now = Utc::now();
        let plan = self.plan(loan, resources, &damages, &suggestions, &reporter, now)?;

        let mut saga = Saga::new("return_loan", &self.repository);
        let opened = match self.apply(&mut saga, &plan, now).await {
            Ok(opened) => {
                saga.commit();
                opened
            }
            Err(e) => return Err(saga.abort(e).await),
        };
        drop(guards);

        let damaged = opened.len();
        tracing::info!(
            loan_id = plan.returned.id,
            resources = plan.outcomes.len(),
            damaged,
            "Loan returned"
        );

        let categories: HashMap<i32, i32> = plan
            .maintenance
            .iter()
            .map(|(resource, _)| (resource.id, resource.category_id))
            .collect();
        for opened in &opened {
            let category = categories.get(&opened.record.resource_id).copied().unwrap_or_default();
            for incident in &opened.incidents {
                self.notifications.incident_created(incident, category).await;
            }
        }

        Ok(ReturnSummary {
            loan: plan.returned,
            resources: plan.outcomes,
            maintenance: opened
                .into_iter()
                .map(|o| MaintenanceDetails {
                    record: o.record,
                    incidents: o.incidents,
                    history: Vec::new(),
                })
                .collect(),
        })
    }

    async fn reporter(&self, owner: &User, loan: &Loan) -> AppResult<ReporterContext> {
        let grade = self.repository.references.find_grade(loan.grade_id).await?;
        let section = self.repository.references.find_section(loan.section_id).await?;
        Ok(ReporterContext {
            teacher_name: owner.full_name.clone(),
            grade: grade.map(|g| g.name).unwrap_or_else(|| loan.grade_id.to_string()),
            section: section.map(|s| s.name).unwrap_or_else(|| loan.section_id.to_string()),
        })
    }

    fn plan(
        &self,
        loan: Loan,
        resources: Vec<Resource>,
        damages: &HashMap<i32, &DamageReport>,
        suggestions: &HashMap<i32, &SuggestionReport>,
        reporter: &ReporterContext,
        now: DateTime<Utc>,
    ) -> AppResult<ReturnPlan> {
        let mut outcomes = IndexMap::with_capacity(resources.len());
        let mut changes = Vec::new();
        let mut maintenance = Vec::new();
        let mut loan_blocks = Vec::new();

        for resource in resources {
            let damage = damages.get(&resource.id).copied();
            let suggestion = suggestions.get(&resource.id).copied();
            let resolution = self.tracker.resolve(resource.id, damage, suggestion, now);
            check_transition(resource.id, resource.status, resolution.status)?;

            let note = resolution.note();
            if let Some(block) = resolution.loan_block() {
                loan_blocks.push(block);
            }

            let mut updated = resource.clone();
            updated.status = resolution.status;
            if let Some(note) = &note {
                updated.notes = Some(append_note(resource.notes.as_deref(), note));
            }

            if let Some(damage) = damage.filter(|_| resolution.is_damaged()) {
                maintenance.push((
                    updated.clone(),
                    CreateMaintenance {
                        resource_id: resource.id,
                        maintenance_type: MaintenanceType::Correctivo,
                        incident_category: Some(DAMAGE_CATEGORY.to_string()),
                        description: maintenance_description(damage, suggestion, reporter),
                        damages: clean_entries(&damage.damages),
                        reporter: Some(reporter.clone()),
                        estimated_completion_date: None,
                    },
                ));
            }

            outcomes.insert(
                resource.id,
                ResourceOutcome {
                    resource_id: resource.id,
                    previous_status: resource.status,
                    status: resolution.status,
                    note,
                },
            );
            if updated != resource {
                changes.push((resource, updated));
            }
        }

        let mut returned = loan.clone();
        returned.status = LoanStatus::Devuelto;
        returned.actual_return_date = Some(now);
        // The consolidated report replaces the loan notes; null when nothing was reported
        returned.notes = (!loan_blocks.is_empty()).then(|| loan_blocks.join("\n\n"));

        Ok(ReturnPlan {
            loan,
            returned,
            resources: changes,
            maintenance,
            outcomes,
        })
    }

    /// Loan, then resources, then maintenance records with their incidents
    async fn apply(&self, saga: &mut Saga<'_>, plan: &ReturnPlan, now: DateTime<Utc>) -> AppResult<Vec<OpenedRecord>> {
        saga.step("update loan");
        self.repository
            .loans
            .update_if_status(&plan.returned, plan.loan.status)
            .await?;
        saga.record(Compensation::RestoreLoan(plan.loan.clone()));

        saga.step("update resources");
        for (before, after) in &plan.resources {
            self.repository
                .resources
                .update_if_status(after, before.status)
                .await?;
            saga.record(Compensation::RestoreResource(before.clone()));
        }

        let mut opened = Vec::with_capacity(plan.maintenance.len());
        for (resource, request) in &plan.maintenance {
            opened.push(self.maintenance.open_record(saga, resource.id, request, now).await?);
        }
        Ok(opened)
    }
}

/// Map reports by resource id, rejecting a second report for the same resource
fn index_by_resource<'a, T>(
    reports: &'a [T],
    resource_id: impl Fn(&T) -> i32,
    kind: &str,
) -> AppResult<HashMap<i32, &'a T>> {
    let mut indexed = HashMap::with_capacity(reports.len());
    for report in reports {
        let id = resource_id(report);
        if indexed.insert(id, report).is_some() {
            return Err(AppError::Validation(format!(
                "More than one {} for resource {}",
                kind, id
            )));
        }
    }
    Ok(indexed)
}

/// Description of the maintenance opened for a damaged resource
fn maintenance_description(
    damage: &DamageReport,
    suggestion: Option<&SuggestionReport>,
    reporter: &ReporterContext,
) -> String {
    let mut lines = vec![format!("Daños reportados: {}", clean_entries(&damage.damages).join(", "))];
    if let Some(notes) = clean_text(damage.notes.as_deref()) {
        lines.push(format!("Notas: {}", notes));
    }
    if let Some(suggestion) = suggestion {
        let entries = clean_entries(&suggestion.suggestions);
        if !entries.is_empty() {
            lines.push(format!("Sugerencias: {}", entries.join(", ")));
        }
        if let Some(notes) = clean_text(suggestion.notes.as_deref()) {
            lines.push(format!("Notas adicionales: {}", notes));
        }
    }
    lines.push(reporter.line());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_reports_rejected() {
        let reports = vec![
            DamageReport {
                resource_id: 1,
                ..Default::default()
            },
            DamageReport {
                resource_id: 1,
                ..Default::default()
            },
        ];
        let err = index_by_resource(&reports, |r| r.resource_id, "damage report").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_maintenance_description() {
        let damage = DamageReport {
            resource_id: 1,
            damages: vec!["Pantalla rota".to_string(), " ".to_string()],
            notes: Some("Caída".to_string()),
        };
        let suggestion = SuggestionReport {
            resource_id: 1,
            suggestions: vec!["Funda".to_string()],
            notes: None,
        };
        let reporter = ReporterContext {
            teacher_name: "Ana Torres".to_string(),
            grade: "3ro".to_string(),
            section: "B".to_string(),
        };

        assert_eq!(
            maintenance_description(&damage, Some(&suggestion), &reporter),
            "Daños reportados: Pantalla rota\n\
             Notas: Caída\n\
             Sugerencias: Funda\n\
             Reportado por: Ana Torres (3ro - B)"
        );
    }
}
