//! Multi-row writes with recorded compensating actions
//!
//! The store offers no transaction spanning loans, resources and maintenance
//! rows, so workflows apply their writes one at a time through a [`Saga`].
//! After each successful write the caller records how to undo it; if a later
//! write fails, [`Saga::abort`] replays the undo log in reverse order and
//! folds everything into a single error.

use crate::{
    error::AppError,
    models::{
        enums::MaintenanceStatus, loan::Loan, maintenance::MaintenanceRecord, resource::Resource,
    },
    repository::Repository,
};

/// Inverse of one applied write
#[derive(Debug, Clone)]
pub enum Compensation {
    RestoreLoan(Loan),
    DeleteLoan(i32),
    RestoreResource(Resource),
    RestoreMaintenance(MaintenanceRecord),
    RestoreIncidentsStatus {
        maintenance_id: i32,
        status: MaintenanceStatus,
    },
    DeleteMaintenance(i32),
    DeleteIncident(i32),
}

impl Compensation {
    fn describe(&self) -> String {
        match self {
            Compensation::RestoreLoan(loan) => format!("restore loan {}", loan.id),
            Compensation::DeleteLoan(id) => format!("delete loan {}", id),
            Compensation::RestoreResource(resource) => format!("restore resource {}", resource.id),
            Compensation::RestoreMaintenance(record) => format!("restore maintenance {}", record.id),
            Compensation::RestoreIncidentsStatus { maintenance_id, .. } => {
                format!("restore incidents of maintenance {}", maintenance_id)
            }
            Compensation::DeleteMaintenance(id) => format!("delete maintenance {}", id),
            Compensation::DeleteIncident(id) => format!("delete incident {}", id),
        }
    }
}

pub struct Saga<'a> {
    name: &'static str,
    repository: &'a Repository,
    step: &'static str,
    applied: Vec<Compensation>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str, repository: &'a Repository) -> Self {
        Self {
            name,
            repository,
            step: "start",
            applied: Vec::new(),
        }
    }

    /// Name the step about to run, for the aggregate error message
    pub fn step(&mut self, step: &'static str) {
        self.step = step;
    }

    /// Record the undo action of a write that just succeeded
    pub fn record(&mut self, compensation: Compensation) {
        self.applied.push(compensation);
    }

    /// Keep every applied write
    pub fn commit(self) {
        tracing::debug!(saga = self.name, writes = self.applied.len(), "Saga committed");
    }

    /// Undo every applied write in reverse order and build the aggregate error
    pub async fn abort(self, cause: AppError) -> AppError {
        let Saga { name, repository, step, applied } = self;

        tracing::warn!(saga = name, step, error = %cause, writes = applied.len(), "Saga failed, compensating");

        let mut failures = Vec::new();
        for compensation in applied.into_iter().rev() {
            if let Err(e) = apply(repository, &compensation).await {
                tracing::error!(
                    saga = name,
                    compensation = %compensation.describe(),
                    error = %e,
                    "Compensation failed"
                );
                failures.push(format!("{}: {}", compensation.describe(), e));
            }
        }

        if !failures.is_empty() {
            return AppError::Persistence {
                message: format!(
                    "{} failed at {} ({}); rollback incomplete: {}",
                    name,
                    step,
                    cause,
                    failures.join("; ")
                ),
                compensated: false,
            };
        }

        match cause {
            // Lost a race; the caller must re-read state, nothing was kept
            AppError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Persistence {
                message: format!("{} failed at {} ({}); all changes were rolled back", name, step, other),
                compensated: true,
            },
        }
    }
}

async fn apply(repository: &Repository, compensation: &Compensation) -> Result<(), AppError> {
    match compensation {
        Compensation::RestoreLoan(loan) => repository.loans.restore(loan).await,
        Compensation::DeleteLoan(id) => repository.loans.delete(*id).await,
        Compensation::RestoreResource(resource) => repository.resources.restore(resource).await,
        Compensation::RestoreMaintenance(record) => repository.maintenance.update(record).await,
        Compensation::RestoreIncidentsStatus { maintenance_id, status } => repository
            .maintenance
            .update_incidents_status(*maintenance_id, *status)
            .await
            .map(|_| ()),
        Compensation::DeleteMaintenance(id) => repository.maintenance.delete(*id).await,
        Compensation::DeleteIncident(id) => repository.maintenance.delete_incident(*id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ResourceStatus;
    use crate::repository::memory::MemoryStore;

    #[tokio::test]
    async fn test_abort_restores_in_reverse_order() {
        let store = MemoryStore::new();
        let repository = Repository::in_memory(store.clone());
        let original = store.add_resource(1, "Laptop");

        let mut saga = Saga::new("test", &repository);
        let mut first = original.clone();
        first.status = ResourceStatus::EnPrestamo;
        repository
            .resources
            .update_if_status(&first, ResourceStatus::Disponible)
            .await
            .unwrap();
        saga.record(Compensation::RestoreResource(original.clone()));

        let mut second = first.clone();
        second.status = ResourceStatus::Danado;
        repository
            .resources
            .update_if_status(&second, ResourceStatus::EnPrestamo)
            .await
            .unwrap();
        saga.record(Compensation::RestoreResource(first));

        let err = saga.abort(AppError::persistence("boom")).await;
        assert!(matches!(err, AppError::Persistence { compensated: true, .. }));
        assert_eq!(repository.resources.get_by_id(original.id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_conflict_cause_survives_rollback() {
        let repository = Repository::in_memory(MemoryStore::new());
        let saga = Saga::new("test", &repository);
        let err = saga.abort(AppError::Conflict("stale".to_string())).await;
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_compensation_is_reported() {
        let store = MemoryStore::new();
        let repository = Repository::in_memory(store.clone());
        let resource = store.add_resource(1, "Tablet");
        store.fail_after("resources.restore", 0);

        let mut saga = Saga::new("test", &repository);
        saga.record(Compensation::RestoreResource(resource));
        let err = saga.abort(AppError::persistence("boom")).await;
        assert!(matches!(err, AppError::Persistence { compensated: false, .. }));
    }
}
