//! In-memory store implementing every repository trait
//!
//! Used by the test suite and by `storage.backend = "memory"` for local
//! development. Fail points let tests make a named operation fail after a
//! number of successful calls, to exercise saga compensation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    LoansRepository, MaintenanceRepository, NotificationsRepository, ReferencesRepository,
    ResourcesRepository, UsersRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{LoanStatus, MaintenanceStatus, NotificationPriority, ResourceStatus, Role},
        loan::{Loan, LoanStatusCount, NewLoan},
        maintenance::{
            Incident, MaintenanceQuery, MaintenanceRecord, NewIncident, NewMaintenance,
            NewStatusHistory, StatusHistory,
        },
        notification::{NewNotification, Notification, NotificationStats},
        resource::{Resource, ResourceStatusCount},
        user::{Reference, User},
    },
};

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    loans: BTreeMap<i32, Loan>,
    loan_resources: BTreeMap<i32, Vec<i32>>,
    resources: BTreeMap<i32, Resource>,
    maintenance: BTreeMap<i32, MaintenanceRecord>,
    incidents: BTreeMap<i32, Incident>,
    history: BTreeMap<i32, StatusHistory>,
    notifications: BTreeMap<i32, Notification>,
    /// (incident, rule, recipient) already notified by a rule
    dispatches: HashSet<(i32, String, i32)>,
    users: BTreeMap<i32, User>,
    areas: BTreeMap<i32, Reference>,
    grades: BTreeMap<i32, Reference>,
    sections: BTreeMap<i32, Reference>,
    /// operation name -> successful calls left before it starts failing
    fail_points: HashMap<String, usize>,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_fail_point(&mut self, op: &str) -> AppResult<()> {
        match self.fail_points.get_mut(op) {
            Some(0) => Err(AppError::persistence(format!("injected failure in {}", op))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("Memory store lock poisoned".to_string()))
    }

    /// Run `f` on the state unless the fail point for `op` has fired
    fn with<R>(&self, op: &str, f: impl FnOnce(&mut MemoryState) -> AppResult<R>) -> AppResult<R> {
        let mut state = self.lock()?;
        state.check_fail_point(op)?;
        f(&mut *state)
    }

    /// Make `op` fail once it has succeeded `successes` more times
    pub fn fail_after(&self, op: &str, successes: usize) {
        if let Ok(mut state) = self.lock() {
            state.fail_points.insert(op.to_string(), successes);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.lock() {
            state.fail_points.clear();
        }
    }

    // -- seeding -----------------------------------------------------------

    pub fn add_user(&self, dni: &str, full_name: &str, role: Role) -> User {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let user = User {
            id: state.next_id(),
            dni: dni.to_string(),
            full_name: full_name.to_string(),
            role,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub fn add_resource(&self, category_id: i32, name: &str) -> Resource {
        self.add_resource_with_status(category_id, name, ResourceStatus::Disponible)
    }

    pub fn add_resource_with_status(&self, category_id: i32, name: &str, status: ResourceStatus) -> Resource {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let resource = Resource {
            id: state.next_id(),
            category_id,
            name: name.to_string(),
            status,
            notes: None,
        };
        state.resources.insert(resource.id, resource.clone());
        resource
    }

    pub fn add_area(&self, name: &str) -> Reference {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let reference = Reference { id: state.next_id(), name: name.to_string() };
        state.areas.insert(reference.id, reference.clone());
        reference
    }

    pub fn add_grade(&self, name: &str) -> Reference {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let reference = Reference { id: state.next_id(), name: name.to_string() };
        state.grades.insert(reference.id, reference.clone());
        reference
    }

    pub fn add_section(&self, name: &str) -> Reference {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let reference = Reference { id: state.next_id(), name: name.to_string() };
        state.sections.insert(reference.id, reference.clone());
        reference
    }

    /// Force a resource status, bypassing the transition rules
    pub fn set_resource_status(&self, id: i32, status: ResourceStatus) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(resource) = state.resources.get_mut(&id) {
            resource.status = status;
        }
    }

    /// Backdate a notification-relevant incident, for time threshold tests
    pub fn set_incident_created_at(&self, id: i32, created_at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(incident) = state.incidents.get_mut(&id) {
            incident.created_at = created_at;
        }
    }

    pub fn loan_count(&self) -> usize {
        self.state.lock().map(|s| s.loans.len()).unwrap_or(0)
    }

    pub fn maintenance_count(&self) -> usize {
        self.state.lock().map(|s| s.maintenance.len()).unwrap_or(0)
    }

    pub fn incident_count(&self) -> usize {
        self.state.lock().map(|s| s.incidents.len()).unwrap_or(0)
    }

    pub fn notification_count(&self) -> usize {
        self.state.lock().map(|s| s.notifications.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LoansRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        self.with("loans.get_by_id", |s| {
            s.loans
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
        })
    }

    async fn list(&self, status: Option<LoanStatus>) -> AppResult<Vec<Loan>> {
        self.with("loans.list", |s| {
            Ok(s.loans
                .values()
                .rev()
                .filter(|l| status.map_or(true, |st| l.status == st))
                .cloned()
                .collect())
        })
    }

    async fn resource_ids(&self, loan_id: i32) -> AppResult<Vec<i32>> {
        self.with("loans.resource_ids", |s| {
            let mut ids = s.loan_resources.get(&loan_id).cloned().unwrap_or_default();
            ids.sort_unstable();
            Ok(ids)
        })
    }

    async fn create(&self, loan: &NewLoan) -> AppResult<Loan> {
        self.with("loans.create", |s| {
            let created = Loan {
                id: s.next_id(),
                teacher_id: loan.teacher_id,
                area_id: loan.area_id,
                grade_id: loan.grade_id,
                section_id: loan.section_id,
                status: loan.status,
                is_authorized: loan.is_authorized,
                loan_date: loan.loan_date,
                actual_return_date: None,
                notes: loan.notes.clone(),
            };
            s.loans.insert(created.id, created.clone());
            s.loan_resources.insert(created.id, loan.resource_ids.clone());
            Ok(created)
        })
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.with("loans.delete", |s| {
            s.loan_resources.remove(&id);
            s.loans
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
        })
    }

    async fn update_if_status(&self, loan: &Loan, expected: LoanStatus) -> AppResult<()> {
        self.with("loans.update_if_status", |s| {
            let stored = s
                .loans
                .get_mut(&loan.id)
                .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan.id)))?;
            if stored.status != expected {
                return Err(AppError::Conflict(format!("Loan {} is no longer {}", loan.id, expected)));
            }
            stored.status = loan.status;
            stored.is_authorized = loan.is_authorized;
            stored.actual_return_date = loan.actual_return_date;
            stored.notes = loan.notes.clone();
            Ok(())
        })
    }

    async fn restore(&self, loan: &Loan) -> AppResult<()> {
        self.with("loans.restore", |s| {
            if let Some(stored) = s.loans.get_mut(&loan.id) {
                stored.status = loan.status;
                stored.is_authorized = loan.is_authorized;
                stored.actual_return_date = loan.actual_return_date;
                stored.notes = loan.notes.clone();
            }
            Ok(())
        })
    }

    async fn open_loan_for_resource(&self, resource_id: i32, exclude_loan_id: i32) -> AppResult<Option<i32>> {
        self.with("loans.open_loan_for_resource", |s| {
            Ok(s.loan_resources
                .iter()
                .filter(|(loan_id, ids)| **loan_id != exclude_loan_id && ids.contains(&resource_id))
                .map(|(loan_id, _)| *loan_id)
                .find(|loan_id| s.loans.get(loan_id).map_or(false, |l| l.status.is_open())))
        })
    }

    async fn count_by_status(&self) -> AppResult<Vec<LoanStatusCount>> {
        self.with("loans.count_by_status", |s| {
            Ok(LoanStatus::ALL
                .iter()
                .map(|status| LoanStatusCount {
                    status: *status,
                    count: s.loans.values().filter(|l| l.status == *status).count() as i64,
                })
                .filter(|c| c.count > 0)
                .collect())
        })
    }
}

#[async_trait]
impl ResourcesRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Resource> {
        self.with("resources.get_by_id", |s| {
            s.resources
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", id)))
        })
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Resource>> {
        self.with("resources.get_many", |s| {
            Ok(s.resources
                .values()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect())
        })
    }

    async fn update_if_status(&self, resource: &Resource, expected: ResourceStatus) -> AppResult<()> {
        self.with("resources.update_if_status", |s| {
            let stored = s
                .resources
                .get_mut(&resource.id)
                .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", resource.id)))?;
            if stored.status != expected {
                return Err(AppError::Conflict(format!(
                    "Resource {} is no longer {}",
                    resource.id, expected
                )));
            }
            stored.status = resource.status;
            stored.notes = resource.notes.clone();
            Ok(())
        })
    }

    async fn restore(&self, resource: &Resource) -> AppResult<()> {
        self.with("resources.restore", |s| {
            if let Some(stored) = s.resources.get_mut(&resource.id) {
                stored.status = resource.status;
                stored.notes = resource.notes.clone();
            }
            Ok(())
        })
    }

    async fn count_by_status(&self) -> AppResult<Vec<ResourceStatusCount>> {
        self.with("resources.count_by_status", |s| {
            Ok(ResourceStatus::ALL
                .iter()
                .map(|status| ResourceStatusCount {
                    status: *status,
                    count: s.resources.values().filter(|r| r.status == *status).count() as i64,
                })
                .filter(|c| c.count > 0)
                .collect())
        })
    }
}

#[async_trait]
impl MaintenanceRepository for MemoryStore {
    async fn create(&self, record: &NewMaintenance) -> AppResult<MaintenanceRecord> {
        self.with("maintenance.create", |s| {
            let created = MaintenanceRecord {
                id: s.next_id(),
                resource_id: record.resource_id,
                maintenance_type: record.maintenance_type,
                incident_category: record.incident_category.clone(),
                description: record.description.clone(),
                current_status: MaintenanceStatus::Pendiente,
                estimated_completion_date: record.estimated_completion_date,
                created_at: record.created_at,
                updated_at: record.created_at,
                completed_at: None,
            };
            s.maintenance.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn get_by_id(&self, id: i32) -> AppResult<MaintenanceRecord> {
        self.with("maintenance.get_by_id", |s| {
            s.maintenance
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Maintenance record {} not found", id)))
        })
    }

    async fn list(&self, query: &MaintenanceQuery) -> AppResult<Vec<MaintenanceRecord>> {
        self.with("maintenance.list", |s| {
            Ok(s.maintenance
                .values()
                .rev()
                .filter(|m| query.resource_id.map_or(true, |id| m.resource_id == id))
                .filter(|m| query.status.map_or(true, |st| m.current_status == st))
                .cloned()
                .collect())
        })
    }

    async fn update(&self, record: &MaintenanceRecord) -> AppResult<()> {
        self.with("maintenance.update", |s| {
            let stored = s.maintenance.get_mut(&record.id).ok_or_else(|| {
                AppError::NotFound(format!("Maintenance record {} not found", record.id))
            })?;
            stored.current_status = record.current_status;
            stored.estimated_completion_date = record.estimated_completion_date;
            stored.updated_at = record.updated_at;
            stored.completed_at = record.completed_at;
            Ok(())
        })
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.with("maintenance.delete", |s| {
            s.maintenance
                .remove(&id)
                .ok_or_else(|| AppError::NotFound(format!("Maintenance record {} not found", id)))?;
            s.history.retain(|_, h| h.maintenance_id != id);
            for incident in s.incidents.values_mut() {
                if incident.maintenance_id == Some(id) {
                    incident.maintenance_id = None;
                }
            }
            Ok(())
        })
    }

    async fn count_open_for_resource(&self, resource_id: i32, exclude_id: Option<i32>) -> AppResult<i64> {
        self.with("maintenance.count_open_for_resource", |s| {
            Ok(s.maintenance
                .values()
                .filter(|m| m.resource_id == resource_id && m.current_status.is_open())
                .filter(|m| exclude_id != Some(m.id))
                .count() as i64)
        })
    }

    async fn max_incident_number(&self, resource_id: i32) -> AppResult<i32> {
        self.with("maintenance.max_incident_number", |s| {
            Ok(s.incidents
                .values()
                .filter(|i| i.resource_id == resource_id)
                .map(|i| i.incident_number)
                .max()
                .unwrap_or(0))
        })
    }

    async fn create_incident(&self, incident: &NewIncident) -> AppResult<Incident> {
        self.with("maintenance.create_incident", |s| {
            let duplicate = s.incidents.values().any(|i| {
                i.resource_id == incident.resource_id && i.incident_number == incident.incident_number
            });
            if duplicate {
                return Err(AppError::Conflict(format!(
                    "Incident number {} already used for resource {}",
                    incident.incident_number, incident.resource_id
                )));
            }
            let reporter = incident.reporter.as_ref();
            let created = Incident {
                id: s.next_id(),
                maintenance_id: Some(incident.maintenance_id),
                resource_id: incident.resource_id,
                incident_number: incident.incident_number,
                incident_category: incident.incident_category.clone(),
                damage_type: incident.damage_type.clone(),
                damage_description: incident.damage_description.clone(),
                reporter_teacher: reporter.map(|r| r.teacher_name.clone()),
                reporter_grade: reporter.map(|r| r.grade.clone()),
                reporter_section: reporter.map(|r| r.section.clone()),
                current_status: MaintenanceStatus::Pendiente,
                created_at: incident.created_at,
            };
            s.incidents.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn delete_incident(&self, id: i32) -> AppResult<()> {
        self.with("maintenance.delete_incident", |s| {
            s.incidents.remove(&id);
            Ok(())
        })
    }

    async fn list_incidents_by_resource(&self, resource_id: i32) -> AppResult<Vec<Incident>> {
        self.with("maintenance.list_incidents_by_resource", |s| {
            let mut incidents: Vec<Incident> = s
                .incidents
                .values()
                .filter(|i| i.resource_id == resource_id)
                .cloned()
                .collect();
            incidents.sort_by_key(|i| i.incident_number);
            Ok(incidents)
        })
    }

    async fn list_incidents_by_maintenance(&self, maintenance_id: i32) -> AppResult<Vec<Incident>> {
        self.with("maintenance.list_incidents_by_maintenance", |s| {
            let mut incidents: Vec<Incident> = s
                .incidents
                .values()
                .filter(|i| i.maintenance_id == Some(maintenance_id))
                .cloned()
                .collect();
            incidents.sort_by_key(|i| i.incident_number);
            Ok(incidents)
        })
    }

    async fn list_open_incidents(&self) -> AppResult<Vec<Incident>> {
        self.with("maintenance.list_open_incidents", |s| {
            Ok(s.incidents
                .values()
                .filter(|i| {
                    i.maintenance_id
                        .and_then(|id| s.maintenance.get(&id))
                        .map_or(false, |m| m.current_status.is_open())
                })
                .cloned()
                .collect())
        })
    }

    async fn update_incidents_status(&self, maintenance_id: i32, status: MaintenanceStatus) -> AppResult<u64> {
        self.with("maintenance.update_incidents_status", |s| {
            let mut updated = 0;
            for incident in s.incidents.values_mut() {
                if incident.maintenance_id == Some(maintenance_id) {
                    incident.current_status = status;
                    updated += 1;
                }
            }
            Ok(updated)
        })
    }

    async fn add_history(&self, entry: &NewStatusHistory) -> AppResult<StatusHistory> {
        self.with("maintenance.add_history", |s| {
            let created = StatusHistory {
                id: s.next_id(),
                maintenance_id: entry.maintenance_id,
                previous_status: entry.previous_status,
                new_status: entry.new_status,
                changed_by: entry.changed_by,
                notes: entry.notes.clone(),
                changed_at: entry.changed_at,
            };
            s.history.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn list_history(&self, maintenance_id: i32) -> AppResult<Vec<StatusHistory>> {
        self.with("maintenance.list_history", |s| {
            Ok(s.history
                .values()
                .filter(|h| h.maintenance_id == maintenance_id)
                .cloned()
                .collect())
        })
    }

    async fn count_open(&self) -> AppResult<i64> {
        self.with("maintenance.count_open", |s| {
            Ok(s.maintenance.values().filter(|m| m.current_status.is_open()).count() as i64)
        })
    }

    async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64> {
        self.with("maintenance.count_overdue", |s| {
            Ok(s.maintenance
                .values()
                .filter(|m| m.current_status.is_open())
                .filter(|m| m.estimated_completion_date.map_or(false, |d| d < now))
                .count() as i64)
        })
    }
}

#[async_trait]
impl NotificationsRepository for MemoryStore {
    async fn insert(&self, n: &NewNotification) -> AppResult<Notification> {
        self.with("notifications.insert", |s| {
            let created = Notification {
                id: s.next_id(),
                notification_type: n.notification_type,
                priority: n.priority,
                recipient_id: n.recipient_id,
                incident_id: n.incident_id,
                rule_id: n.rule_id.clone(),
                title: n.title.clone(),
                message: n.message.clone(),
                read: false,
                persistent: n.persistent,
                expires_at: n.expires_at,
                created_at: n.created_at,
            };
            s.notifications.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn list_for_user(&self, user_id: i32, unread_only: bool, limit: i64) -> AppResult<Vec<Notification>> {
        self.with("notifications.list_for_user", |s| {
            let mut rows: Vec<Notification> = s
                .notifications
                .values()
                .filter(|n| n.recipient_id == user_id && (!unread_only || !n.read))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        })
    }

    async fn stats(&self, user_id: i32) -> AppResult<NotificationStats> {
        self.with("notifications.stats", |s| {
            let mut stats = NotificationStats::default();
            for n in s.notifications.values().filter(|n| n.recipient_id == user_id) {
                stats.total += 1;
                if !n.read {
                    stats.unread += 1;
                }
                match n.priority {
                    NotificationPriority::Low => stats.low += 1,
                    NotificationPriority::Medium => stats.medium += 1,
                    NotificationPriority::High => stats.high += 1,
                    NotificationPriority::Critical => stats.critical += 1,
                }
            }
            Ok(stats)
        })
    }

    async fn mark_read(&self, user_id: i32, id: i32) -> AppResult<()> {
        self.with("notifications.mark_read", |s| {
            match s.notifications.get_mut(&id) {
                Some(n) if n.recipient_id == user_id => {
                    n.read = true;
                    Ok(())
                }
                _ => Err(AppError::NotFound(format!("Notification {} not found", id))),
            }
        })
    }

    async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        self.with("notifications.mark_all_read", |s| {
            let mut updated = 0;
            for n in s.notifications.values_mut() {
                if n.recipient_id == user_id && !n.read {
                    n.read = true;
                    updated += 1;
                }
            }
            Ok(updated)
        })
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.with("notifications.prune_expired", |s| {
            let before = s.notifications.len();
            s.notifications
                .retain(|_, n| n.persistent || n.expires_at.map_or(true, |at| at > now));
            Ok((before - s.notifications.len()) as u64)
        })
    }

    async fn record_dispatch(
        &self,
        incident_id: i32,
        rule_id: &str,
        recipient_id: i32,
        _at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.with("notifications.record_dispatch", |s| {
            Ok(s.dispatches.insert((incident_id, rule_id.to_string(), recipient_id)))
        })
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.with("users.get_by_id", |s| {
            s.users
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
        })
    }

    async fn list_by_role(&self, role: Role) -> AppResult<Vec<User>> {
        self.with("users.list_by_role", |s| {
            Ok(s.users.values().filter(|u| u.role == role).cloned().collect())
        })
    }
}

#[async_trait]
impl ReferencesRepository for MemoryStore {
    async fn find_area(&self, id: i32) -> AppResult<Option<Reference>> {
        self.with("references.find_area", |s| Ok(s.areas.get(&id).cloned()))
    }

    async fn find_grade(&self, id: i32) -> AppResult<Option<Reference>> {
        self.with("references.find_grade", |s| Ok(s.grades.get(&id).cloned()))
    }

    async fn find_section(&self, id: i32) -> AppResult<Option<Reference>> {
        self.with("references.find_section", |s| Ok(s.sections.get(&id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_point_fires_after_successes() {
        let store = MemoryStore::new();
        let resource = store.add_resource(1, "Proyector");
        store.fail_after("resources.get_by_id", 1);

        assert!(ResourcesRepository::get_by_id(&store, resource.id).await.is_ok());
        let err = ResourcesRepository::get_by_id(&store, resource.id).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence { .. }));

        store.clear_failures();
        assert!(ResourcesRepository::get_by_id(&store, resource.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_if_status_detects_stale_status() {
        let store = MemoryStore::new();
        let mut resource = store.add_resource(1, "Laptop");
        resource.status = ResourceStatus::EnPrestamo;

        ResourcesRepository::update_if_status(&store, &resource, ResourceStatus::Disponible)
            .await
            .unwrap();
        let err = ResourcesRepository::update_if_status(&store, &resource, ResourceStatus::Disponible)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_incident_number_rejected() {
        let store = MemoryStore::new();
        let resource = store.add_resource(1, "Tablet");
        let incident = NewIncident {
            maintenance_id: 1,
            resource_id: resource.id,
            incident_number: 1,
            incident_category: None,
            damage_type: "Pantalla rota".to_string(),
            damage_description: "Pantalla rota".to_string(),
            reporter: None,
            created_at: Utc::now(),
        };

        store.create_incident(&incident).await.unwrap();
        assert!(matches!(
            store.create_incident(&incident).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(store.max_incident_number(resource.id).await.unwrap(), 1);
    }
}
