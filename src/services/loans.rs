//! Loan lifecycle: request, authorization, rejection and return

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use validator::Validate;

use super::{
    damage_reports::DamageReportProcessor,
    locks::KeyedLocks,
    resource_state::{append_note, clean_text, ResourceStateTracker},
    saga::{Compensation, Saga},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{LoanStatus, ResourceStatus, Role},
        loan::{CreateLoan, Loan, LoanDetails, NewLoan},
        report::{ReturnLoan, ReturnSummary},
        resource::Resource,
        user::Actor,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    loan_locks: KeyedLocks,
    tracker: ResourceStateTracker,
    damage_reports: DamageReportProcessor,
}

impl LoansService {
    pub fn new(repository: Repository, tracker: ResourceStateTracker, damage_reports: DamageReportProcessor) -> Self {
        Self {
            repository,
            loan_locks: KeyedLocks::new(),
            tracker,
            damage_reports,
        }
    }

    pub async fn get_loan(&self, id: i32) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get_by_id(id).await?;
        let resource_ids = self.repository.loans.resource_ids(id).await?;
        Ok(LoanDetails { loan, resource_ids })
    }

    pub async fn list_loans(&self, status: Option<LoanStatus>) -> AppResult<Vec<Loan>> {
        self.repository.loans.list(status).await
    }

    /// Create a loan. Administrators lend right away; teachers file a
    /// pending request for themselves.
    pub async fn create_loan(&self, actor: Actor, request: CreateLoan) -> AppResult<LoanDetails> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let unique: HashSet<i32> = request.resource_ids.iter().copied().collect();
        if unique.len() != request.resource_ids.len() {
            return Err(AppError::Validation("Duplicate resource ids".to_string()));
        }
        if actor.role == Role::Docente && request.teacher_id != actor.id {
            return Err(AppError::Authorization(
                "Teachers can only request loans for themselves".to_string(),
            ));
        }

        self.check_references(&request).await?;

        let mut resource_ids = request.resource_ids.clone();
        resource_ids.sort_unstable();
        let resources = self.repository.resources.get_many(&resource_ids).await?;
        if resources.len() != resource_ids.len() {
            let missing: Vec<String> = resource_ids
                .iter()
                .filter(|id| !resources.iter().any(|r| r.id == **id))
                .map(|id| id.to_string())
                .collect();
            return Err(AppError::Validation(format!("Unknown resources: {}", missing.join(", "))));
        }

        let immediate = actor.is_admin();
        let new_loan = NewLoan {
            teacher_id: request.teacher_id,
            area_id: request.area_id,
            grade_id: request.grade_id,
            section_id: request.section_id,
            status: if immediate { LoanStatus::Activo } else { LoanStatus::Pendiente },
            is_authorized: immediate,
            loan_date: Utc::now(),
            notes: clean_text(request.notes.as_deref()),
            resource_ids: resource_ids.clone(),
        };

        let loan = if immediate {
            ensure_available(&resources)?;
            let mut saga = Saga::new("create_loan", &self.repository);
            match self.apply_create(&mut saga, &new_loan, &resources).await {
                Ok(loan) => {
                    saga.commit();
                    loan
                }
                Err(e) => return Err(saga.abort(e).await),
            }
        } else {
            self.repository.loans.create(&new_loan).await?
        };

        tracing::info!(
            loan_id = loan.id,
            teacher_id = loan.teacher_id,
            status = %loan.status,
            resources = resource_ids.len(),
            "Loan created"
        );

        Ok(LoanDetails { loan, resource_ids })
    }

    async fn check_references(&self, request: &CreateLoan) -> AppResult<()> {
        match self.repository.users.get_by_id(request.teacher_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Validation(format!("Unknown teacher {}", request.teacher_id)))
            }
            Err(e) => return Err(e),
        }
        if self.repository.references.find_area(request.area_id).await?.is_none() {
            return Err(AppError::Validation(format!("Unknown area {}", request.area_id)));
        }
        if self.repository.references.find_grade(request.grade_id).await?.is_none() {
            return Err(AppError::Validation(format!("Unknown grade {}", request.grade_id)));
        }
        if self.repository.references.find_section(request.section_id).await?.is_none() {
            return Err(AppError::Validation(format!("Unknown section {}", request.section_id)));
        }
        Ok(())
    }

    async fn apply_create(&self, saga: &mut Saga<'_>, new_loan: &NewLoan, resources: &[Resource]) -> AppResult<Loan> {
        saga.step("insert loan");
        let loan = self.repository.loans.create(new_loan).await?;
        saga.record(Compensation::DeleteLoan(loan.id));

        self.lend(saga, resources).await?;
        Ok(loan)
    }

    /// Move every resource from Disponible to En Préstamo
    async fn lend(&self, saga: &mut Saga<'_>, resources: &[Resource]) -> AppResult<()> {
        saga.step("lend resources");
        for resource in resources {
            let mut lent = resource.clone();
            lent.status = ResourceStatus::EnPrestamo;
            self.repository
                .resources
                .update_if_status(&lent, ResourceStatus::Disponible)
                .await?;
            saga.record(Compensation::RestoreResource(resource.clone()));
        }
        Ok(())
    }

    /// Authorize a pending request and hand out its resources
    pub async fn authorize(&self, actor: Actor, id: i32) -> AppResult<LoanDetails> {
        actor.require_admin()?;
        let _guard = self.loan_locks.lock(id).await;

        let loan = self.repository.loans.get_by_id(id).await?;
        if loan.is_authorized {
            return Err(AppError::AlreadyAuthorized(id));
        }
        if loan.status != LoanStatus::Pendiente {
            return Err(AppError::Conflict(format!("Loan {} is {}, not Pendiente", id, loan.status)));
        }

        let resource_ids = self.repository.loans.resource_ids(id).await?;
        let resources = self.repository.resources.get_many(&resource_ids).await?;
        ensure_available(&resources)?;

        let mut authorized = loan.clone();
        authorized.is_authorized = true;
        authorized.status = LoanStatus::Activo;

        let mut saga = Saga::new("authorize_loan", &self.repository);
        let result: AppResult<()> = async {
            saga.step("authorize loan");
            self.repository
                .loans
                .update_if_status(&authorized, LoanStatus::Pendiente)
                .await?;
            saga.record(Compensation::RestoreLoan(loan.clone()));
            self.lend(&mut saga, &resources).await
        }
        .await;
        match result {
            Ok(()) => saga.commit(),
            Err(e) => return Err(saga.abort(e).await),
        }

        tracing::info!(loan_id = id, authorized_by = actor.id, "Loan authorized");
        Ok(LoanDetails {
            loan: authorized,
            resource_ids,
        })
    }

    /// Reject a request that was never authorized
    pub async fn reject(&self, actor: Actor, id: i32, reason: Option<String>) -> AppResult<LoanDetails> {
        actor.require_admin()?;
        let _guard = self.loan_locks.lock(id).await;

        let loan = self.repository.loans.get_by_id(id).await?;
        if loan.is_authorized {
            return Err(AppError::Authorization(format!("Loan {} is authorized and cannot be rejected", id)));
        }
        if loan.status.is_closed() {
            return Err(AppError::Conflict(format!("Loan {} is already {}", id, loan.status)));
        }

        let now = Utc::now();
        let admin_name = self.actor_name(actor).await?;
        let block = self.rejection_block(&admin_name, reason.as_deref(), now);

        let mut rejected = loan.clone();
        rejected.status = LoanStatus::Rechazado;
        rejected.actual_return_date = Some(now);
        rejected.notes = Some(append_note(loan.notes.as_deref(), &block));

        // Only resources still lent and not held by another open loan go
        // back; anything moved to maintenance stays put
        let resource_ids = self.repository.loans.resource_ids(id).await?;
        let mut lent: Vec<Resource> = Vec::new();
        for resource in self.repository.resources.get_many(&resource_ids).await? {
            if resource.status != ResourceStatus::EnPrestamo {
                continue;
            }
            if let Some(holder) = self.repository.loans.open_loan_for_resource(resource.id, id).await? {
                tracing::debug!(loan_id = id, resource_id = resource.id, holder, "Resource stays with its open loan");
                continue;
            }
            lent.push(resource);
        }

        let mut saga = Saga::new("reject_loan", &self.repository);
        let result: AppResult<()> = async {
            saga.step("reject loan");
            self.repository
                .loans
                .update_if_status(&rejected, loan.status)
                .await?;
            saga.record(Compensation::RestoreLoan(loan.clone()));

            saga.step("release resources");
            for resource in &lent {
                let mut released = resource.clone();
                released.status = ResourceStatus::Disponible;
                self.repository
                    .resources
                    .update_if_status(&released, ResourceStatus::EnPrestamo)
                    .await?;
                saga.record(Compensation::RestoreResource(resource.clone()));
            }
            Ok(())
        }
        .await;
        match result {
            Ok(()) => saga.commit(),
            Err(e) => return Err(saga.abort(e).await),
        }

        tracing::info!(loan_id = id, rejected_by = actor.id, released = lent.len(), "Loan rejected");
        Ok(LoanDetails {
            loan: rejected,
            resource_ids,
        })
    }

    /// Return a loan, resolving every resource and opening maintenance for
    /// damaged ones
    pub async fn return_loan(&self, actor: Actor, id: i32, request: ReturnLoan) -> AppResult<ReturnSummary> {
        let _guard = self.loan_locks.lock(id).await;
        let loan = self.repository.loans.get_by_id(id).await?;

        tracing::debug!(loan_id = id, actor_id = actor.id, "Processing loan return");
        self.damage_reports.process(loan, &request).await
    }

    async fn actor_name(&self, actor: Actor) -> AppResult<String> {
        match self.repository.users.get_by_id(actor.id).await {
            Ok(user) => Ok(user.full_name),
            Err(AppError::NotFound(_)) => Ok(format!("{} #{}", actor.role, actor.id)),
            Err(e) => Err(e),
        }
    }

    fn rejection_block(&self, admin_name: &str, reason: Option<&str>, at: DateTime<Utc>) -> String {
        let reason = clean_text(reason).unwrap_or_else(|| "Sin motivo especificado".to_string());
        format!(
            "[SOLICITUD RECHAZADA]\nFecha: {}\nRechazado por: {}\nMotivo: {}",
            self.tracker.format_time(at),
            admin_name,
            reason
        )
    }
}

fn ensure_available(resources: &[Resource]) -> AppResult<()> {
    match resources.iter().find(|r| r.status != ResourceStatus::Disponible) {
        Some(resource) => Err(AppError::Conflict(format!(
            "Resource {} is not available ({})",
            resource.id, resource.status
        ))),
        None => Ok(()),
    }
}
