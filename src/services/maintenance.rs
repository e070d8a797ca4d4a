//! Maintenance records and per-resource incident numbering

use chrono::{DateTime, Utc};
use validator::Validate;

use super::{
    locks::KeyedLocks,
    notifications::NotificationService,
    resource_state::{check_transition, parse_note_log, ParsedNote},
    saga::{Compensation, Saga},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{MaintenanceStatus, ResourceStatus},
        maintenance::{
            CreateMaintenance, Incident, MaintenanceDetails, MaintenanceQuery, MaintenanceRecord,
            NewIncident, NewMaintenance, NewStatusHistory, UpdateMaintenanceStatus,
        },
        resource::Resource,
        user::Actor,
    },
    repository::Repository,
};

/// Record and incidents written by one sequencer call
#[derive(Debug, Clone)]
pub struct OpenedRecord {
    pub record: MaintenanceRecord,
    pub incidents: Vec<Incident>,
}

#[derive(Clone)]
pub struct MaintenanceService {
    repository: Repository,
    resource_locks: KeyedLocks,
    notifications: NotificationService,
}

impl MaintenanceService {
    pub fn new(repository: Repository, resource_locks: KeyedLocks, notifications: NotificationService) -> Self {
        Self {
            repository,
            resource_locks,
            notifications,
        }
    }

    /// Insert a record and one incident per damage inside `saga`.
    ///
    /// The caller must hold the lock of `resource_id` until the saga commits
    /// or aborts, so that incident numbers stay gap-free.
    pub async fn open_record(
        &self,
        saga: &mut Saga<'_>,
        resource_id: i32,
        request: &CreateMaintenance,
        now: DateTime<Utc>,
    ) -> AppResult<OpenedRecord> {
        saga.step("insert maintenance record");
        let record = self
            .repository
            .maintenance
            .create(&NewMaintenance {
                resource_id,
                maintenance_type: request.maintenance_type,
                incident_category: request.incident_category.clone(),
                description: request.description.clone(),
                estimated_completion_date: request.estimated_completion_date,
                created_at: now,
            })
            .await?;
        saga.record(Compensation::DeleteMaintenance(record.id));

        saga.step("insert incidents");
        let mut next = self.repository.maintenance.max_incident_number(resource_id).await? + 1;
        let mut incidents = Vec::with_capacity(request.damages.len());
        for damage in &request.damages {
            let incident = self
                .repository
                .maintenance
                .create_incident(&NewIncident {
                    maintenance_id: record.id,
                    resource_id,
                    incident_number: next,
                    incident_category: request.incident_category.clone(),
                    damage_type: damage.clone(),
                    damage_description: request.description.clone(),
                    reporter: request.reporter.clone(),
                    created_at: now,
                })
                .await?;
            saga.record(Compensation::DeleteIncident(incident.id));
            incidents.push(incident);
            next += 1;
        }

        tracing::debug!(
            maintenance_id = record.id,
            resource_id,
            incidents = incidents.len(),
            "Maintenance record opened"
        );
        Ok(OpenedRecord { record, incidents })
    }

    /// Open maintenance outside of a return. An available resource is taken
    /// out of circulation; any other status is left as is.
    pub async fn create_maintenance_record(
        &self,
        actor: Actor,
        request: CreateMaintenance,
    ) -> AppResult<MaintenanceDetails> {
        actor.require_admin()?;
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let guard = self.resource_locks.lock(request.resource_id).await;
        let resource = self.repository.resources.get_by_id(request.resource_id).await?;
        let now = Utc::now();

        let mut saga = Saga::new("create_maintenance_record", &self.repository);
        let opened = match self.apply_create(&mut saga, &resource, &request, now).await {
            Ok(opened) => {
                saga.commit();
                opened
            }
            Err(e) => return Err(saga.abort(e).await),
        };
        drop(guard);

        tracing::info!(
            maintenance_id = opened.record.id,
            resource_id = resource.id,
            "Maintenance record created"
        );

        for incident in &opened.incidents {
            self.notifications.incident_created(incident, resource.category_id).await;
        }

        Ok(MaintenanceDetails {
            record: opened.record,
            incidents: opened.incidents,
            history: Vec::new(),
        })
    }

    async fn apply_create(
        &self,
        saga: &mut Saga<'_>,
        resource: &Resource,
        request: &CreateMaintenance,
        now: DateTime<Utc>,
    ) -> AppResult<OpenedRecord> {
        let opened = self.open_record(saga, resource.id, request, now).await?;

        if resource.status == ResourceStatus::Disponible {
            saga.step("take resource out of circulation");
            let mut updated = resource.clone();
            updated.status = ResourceStatus::EnMantenimiento;
            self.repository
                .resources
                .update_if_status(&updated, resource.status)
                .await?;
            saga.record(Compensation::RestoreResource(resource.clone()));
        }

        Ok(opened)
    }

    /// Move a record to a new status, mirror it onto its incidents and the
    /// resource, and keep a history entry
    pub async fn update_maintenance_status(
        &self,
        actor: Actor,
        id: i32,
        request: UpdateMaintenanceStatus,
    ) -> AppResult<MaintenanceDetails> {
        actor.require_admin()?;
        let resource_id = self.repository.maintenance.get_by_id(id).await?.resource_id;

        let guard = self.resource_locks.lock(resource_id).await;
        let record = self.repository.maintenance.get_by_id(id).await?;
        if record.current_status == MaintenanceStatus::Completado {
            return Err(AppError::Conflict(format!("Maintenance record {} is already completed", id)));
        }

        let resource = self.repository.resources.get_by_id(resource_id).await?;
        let now = Utc::now();
        let target = self.resource_target(&record, &resource, request.status).await?;
        if let Some(status) = target {
            check_transition(resource.id, resource.status, status)?;
        }

        let mut updated = record.clone();
        updated.current_status = request.status;
        updated.updated_at = now;
        if request.estimated_completion_date.is_some() {
            updated.estimated_completion_date = request.estimated_completion_date;
        }
        updated.completed_at = (request.status == MaintenanceStatus::Completado).then_some(now);

        let history = NewStatusHistory {
            maintenance_id: id,
            previous_status: record.current_status,
            new_status: request.status,
            changed_by: actor.id,
            notes: request.notes.clone(),
            changed_at: now,
        };

        let mut saga = Saga::new("update_maintenance_status", &self.repository);
        match self
            .apply_status(&mut saga, &record, &updated, &resource, target, &history)
            .await
        {
            Ok(()) => saga.commit(),
            Err(e) => return Err(saga.abort(e).await),
        }
        drop(guard);

        tracing::info!(
            maintenance_id = id,
            from = %record.current_status,
            to = %request.status,
            resource_status = ?target,
            "Maintenance status updated"
        );

        let details = self.get_maintenance(id).await?;
        if request.status == MaintenanceStatus::Completado {
            self.notifications
                .incident_resolved(&details.record, &details.incidents)
                .await;
        }
        Ok(details)
    }

    /// Resource status implied by a record moving to `status`, if any
    async fn resource_target(
        &self,
        record: &MaintenanceRecord,
        resource: &Resource,
        status: MaintenanceStatus,
    ) -> AppResult<Option<ResourceStatus>> {
        match status {
            MaintenanceStatus::Pendiente => Ok(None),
            MaintenanceStatus::EnProceso => Ok(matches!(
                resource.status,
                ResourceStatus::Danado | ResourceStatus::EnMantenimiento
            )
            .then_some(ResourceStatus::EnReparacion)),
            MaintenanceStatus::Completado => {
                let others = self
                    .repository
                    .maintenance
                    .count_open_for_resource(record.resource_id, Some(record.id))
                    .await?;
                Ok((others == 0 && resource.status.is_maintenance()).then_some(ResourceStatus::Disponible))
            }
        }
    }

    async fn apply_status(
        &self,
        saga: &mut Saga<'_>,
        record: &MaintenanceRecord,
        updated: &MaintenanceRecord,
        resource: &Resource,
        target: Option<ResourceStatus>,
        history: &NewStatusHistory,
    ) -> AppResult<()> {
        if let Some(status) = target.filter(|s| *s != resource.status) {
            saga.step("update resource status");
            let mut changed = resource.clone();
            changed.status = status;
            self.repository
                .resources
                .update_if_status(&changed, resource.status)
                .await?;
            saga.record(Compensation::RestoreResource(resource.clone()));
        }

        saga.step("update maintenance record");
        self.repository.maintenance.update(updated).await?;
        saga.record(Compensation::RestoreMaintenance(record.clone()));

        saga.step("update incidents");
        self.repository
            .maintenance
            .update_incidents_status(record.id, updated.current_status)
            .await?;
        saga.record(Compensation::RestoreIncidentsStatus {
            maintenance_id: record.id,
            status: record.current_status,
        });

        saga.step("record status history");
        self.repository.maintenance.add_history(history).await?;
        Ok(())
    }

    /// Delete a record and its history. Incidents keep their numbers and are
    /// detached. The resource returns to circulation only when no other open
    /// record exists for it.
    pub async fn delete_maintenance_record(&self, actor: Actor, id: i32) -> AppResult<()> {
        actor.require_admin()?;
        let resource_id = self.repository.maintenance.get_by_id(id).await?.resource_id;

        let _guard = self.resource_locks.lock(resource_id).await;
        let record = self.repository.maintenance.get_by_id(id).await?;
        let resource = self.repository.resources.get_by_id(record.resource_id).await?;
        let others = self
            .repository
            .maintenance
            .count_open_for_resource(record.resource_id, Some(record.id))
            .await?;
        let revert = others == 0 && resource.status.is_maintenance();

        let mut saga = Saga::new("delete_maintenance_record", &self.repository);
        let result: AppResult<()> = async {
            if revert {
                saga.step("return resource to circulation");
                let mut changed = resource.clone();
                changed.status = ResourceStatus::Disponible;
                self.repository
                    .resources
                    .update_if_status(&changed, resource.status)
                    .await?;
                saga.record(Compensation::RestoreResource(resource.clone()));
            }
            saga.step("delete maintenance record");
            self.repository.maintenance.delete(id).await
        }
        .await;

        match result {
            Ok(()) => saga.commit(),
            Err(e) => return Err(saga.abort(e).await),
        }

        tracing::info!(
            maintenance_id = id,
            resource_id = record.resource_id,
            other_open_records = others,
            reverted = revert,
            "Maintenance record deleted"
        );
        Ok(())
    }

    pub async fn get_maintenance(&self, id: i32) -> AppResult<MaintenanceDetails> {
        let record = self.repository.maintenance.get_by_id(id).await?;
        let incidents = self.repository.maintenance.list_incidents_by_maintenance(id).await?;
        let history = self.repository.maintenance.list_history(id).await?;
        Ok(MaintenanceDetails {
            record,
            incidents,
            history,
        })
    }

    pub async fn list_maintenance(&self, query: &MaintenanceQuery) -> AppResult<Vec<MaintenanceRecord>> {
        self.repository.maintenance.list(query).await
    }

    /// Every incident ever opened for a resource, by number
    pub async fn list_incidents(&self, resource_id: i32) -> AppResult<Vec<Incident>> {
        self.repository.resources.get_by_id(resource_id).await?;
        self.repository.maintenance.list_incidents_by_resource(resource_id).await
    }

    /// Damage and suggestion reports recorded in the resource notes, oldest first
    pub async fn report_history(&self, resource_id: i32) -> AppResult<Vec<ParsedNote>> {
        let resource = self.repository.resources.get_by_id(resource_id).await?;
        Ok(resource.notes.as_deref().map(parse_note_log).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationsConfig;
    use crate::models::enums::{MaintenanceType, Role};
    use crate::repository::memory::MemoryStore;

    fn service(store: &MemoryStore) -> MaintenanceService {
        let repository = Repository::in_memory(store.clone());
        let notifications = NotificationService::new(repository.clone(), &NotificationsConfig::default());
        MaintenanceService::new(repository, KeyedLocks::new(), notifications)
    }

    fn request(resource_id: i32, damages: &[&str]) -> CreateMaintenance {
        CreateMaintenance {
            resource_id,
            maintenance_type: MaintenanceType::Correctivo,
            incident_category: Some("hardware".to_string()),
            description: "Revisión".to_string(),
            damages: damages.iter().map(|d| d.to_string()).collect(),
            reporter: None,
            estimated_completion_date: None,
        }
    }

    fn admin(store: &MemoryStore) -> Actor {
        let user = store.add_user("10000000", "Admin", Role::Administrador);
        Actor::new(user.id, user.role)
    }

    #[tokio::test]
    async fn test_standalone_create_takes_resource_out() {
        let store = MemoryStore::new();
        let admin = admin(&store);
        let resource = store.add_resource(1, "Proyector");
        let service = service(&store);

        let details = service
            .create_maintenance_record(admin, request(resource.id, &["Lámpara", "Ventilador"]))
            .await
            .unwrap();

        assert_eq!(details.record.current_status, MaintenanceStatus::Pendiente);
        let numbers: Vec<i32> = details.incidents.iter().map(|i| i.incident_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        let resource = service.repository.resources.get_by_id(resource.id).await.unwrap();
        assert_eq!(resource.status, ResourceStatus::EnMantenimiento);
        // critical-damage matches "hardware"
        assert_eq!(store.notification_count(), 2);
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let store = MemoryStore::new();
        let resource = store.add_resource(1, "Proyector");
        let docente = Actor::new(99, Role::Docente);

        let err = service(&store)
            .create_maintenance_record(docente, request(resource.id, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_failed_incident_insert_rolls_back() {
        let store = MemoryStore::new();
        let admin = admin(&store);
        let resource = store.add_resource(1, "Laptop");
        let service = service(&store);
        store.fail_after("maintenance.create_incident", 1);

        let err = service
            .create_maintenance_record(admin, request(resource.id, &["Teclado", "Batería"]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence { compensated: true, .. }));
        assert_eq!(store.maintenance_count(), 0);
        assert_eq!(store.incident_count(), 0);
        let resource = service.repository.resources.get_by_id(resource.id).await.unwrap();
        assert_eq!(resource.status, ResourceStatus::Disponible);
    }

    #[tokio::test]
    async fn test_start_then_complete() {
        let store = MemoryStore::new();
        let admin = admin(&store);
        let resource = store.add_resource_with_status(1, "Laptop", ResourceStatus::Danado);
        let service = service(&store);
        let created = service
            .create_maintenance_record(admin, request(resource.id, &["Pantalla"]))
            .await
            .unwrap();

        let started = service
            .update_maintenance_status(
                admin,
                created.record.id,
                UpdateMaintenanceStatus {
                    status: MaintenanceStatus::EnProceso,
                    notes: Some("Repuesto pedido".to_string()),
                    estimated_completion_date: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(started.incidents[0].current_status, MaintenanceStatus::EnProceso);
        assert_eq!(started.history.len(), 1);
        let current = service.repository.resources.get_by_id(resource.id).await.unwrap();
        assert_eq!(current.status, ResourceStatus::EnReparacion);

        let done = service
            .update_maintenance_status(
                admin,
                created.record.id,
                UpdateMaintenanceStatus {
                    status: MaintenanceStatus::Completado,
                    notes: None,
                    estimated_completion_date: None,
                },
            )
            .await
            .unwrap();
        assert!(done.record.completed_at.is_some());
        assert_eq!(done.history.len(), 2);
        let current = service.repository.resources.get_by_id(resource.id).await.unwrap();
        assert_eq!(current.status, ResourceStatus::Disponible);

        let err = service
            .update_maintenance_status(
                admin,
                created.record.id,
                UpdateMaintenanceStatus {
                    status: MaintenanceStatus::EnProceso,
                    notes: None,
                    estimated_completion_date: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_history_restores_record_and_resource() {
        let store = MemoryStore::new();
        let admin = admin(&store);
        let resource = store.add_resource(1, "Tablet");
        let service = service(&store);
        let created = service
            .create_maintenance_record(admin, request(resource.id, &["Carga"]))
            .await
            .unwrap();
        store.fail_after("maintenance.add_history", 0);

        let err = service
            .update_maintenance_status(
                admin,
                created.record.id,
                UpdateMaintenanceStatus {
                    status: MaintenanceStatus::Completado,
                    notes: None,
                    estimated_completion_date: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence { compensated: true, .. }));

        store.clear_failures();
        let details = service.get_maintenance(created.record.id).await.unwrap();
        assert_eq!(details.record, created.record);
        assert_eq!(details.incidents[0].current_status, MaintenanceStatus::Pendiente);
        let current = service.repository.resources.get_by_id(resource.id).await.unwrap();
        assert_eq!(current.status, ResourceStatus::EnMantenimiento);
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let store = MemoryStore::new();
        let admin = admin(&store);
        let err = service(&store)
            .update_maintenance_status(
                admin,
                404,
                UpdateMaintenanceStatus {
                    status: MaintenanceStatus::Completado,
                    notes: None,
                    estimated_completion_date: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_keeps_incident_numbers() {
        let store = MemoryStore::new();
        let admin = admin(&store);
        let resource = store.add_resource(1, "Cámara");
        let service = service(&store);

        let first = service
            .create_maintenance_record(admin, request(resource.id, &["Lente"]))
            .await
            .unwrap();
        service.delete_maintenance_record(admin, first.record.id).await.unwrap();

        let current = service.repository.resources.get_by_id(resource.id).await.unwrap();
        assert_eq!(current.status, ResourceStatus::Disponible);

        let second = service
            .create_maintenance_record(admin, request(resource.id, &["Batería"]))
            .await
            .unwrap();
        assert_eq!(second.incidents[0].incident_number, 2);

        let incidents = service.list_incidents(resource.id).await.unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].maintenance_id, None);
    }
}
