//! Repository layer for persistence
//!
//! Each domain has a storage trait so the workflow services can run against
//! PostgreSQL in production and against [`memory::MemoryStore`] in tests and
//! local development.

pub mod loans;
pub mod maintenance;
pub mod memory;
pub mod notifications;
pub mod references;
pub mod resources;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        enums::{LoanStatus, MaintenanceStatus, ResourceStatus, Role},
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

#[async_trait]
pub trait LoansRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Loan>;

    async fn list(&self, status: Option<LoanStatus>) -> AppResult<Vec<Loan>>;

    /// Resource universe of a loan, fixed at creation
    async fn resource_ids(&self, loan_id: i32) -> AppResult<Vec<i32>>;

    /// Insert a loan together with its resource links
    async fn create(&self, loan: &NewLoan) -> AppResult<Loan>;

    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Write status, authorization, return date and notes, provided the stored
    /// status still equals `expected`; fails with `Conflict` otherwise
    async fn update_if_status(&self, loan: &Loan, expected: LoanStatus) -> AppResult<()>;

    /// Unconditionally write back a previous snapshot
    async fn restore(&self, loan: &Loan) -> AppResult<()>;

    /// Id of an Activo or Atrasado loan other than `exclude_loan_id` that
    /// holds the resource
    async fn open_loan_for_resource(&self, resource_id: i32, exclude_loan_id: i32) -> AppResult<Option<i32>>;

    async fn count_by_status(&self) -> AppResult<Vec<LoanStatusCount>>;
}

#[async_trait]
pub trait ResourcesRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Resource>;

    /// Fetch the given resources, ordered by id; unknown ids are skipped
    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Resource>>;

    /// Write status and notes, provided the stored status still equals `expected`
    async fn update_if_status(&self, resource: &Resource, expected: ResourceStatus) -> AppResult<()>;

    async fn restore(&self, resource: &Resource) -> AppResult<()>;

    async fn count_by_status(&self) -> AppResult<Vec<ResourceStatusCount>>;
}

#[async_trait]
pub trait MaintenanceRepository: Send + Sync {
    async fn create(&self, record: &NewMaintenance) -> AppResult<MaintenanceRecord>;

    async fn get_by_id(&self, id: i32) -> AppResult<MaintenanceRecord>;

    async fn list(&self, query: &MaintenanceQuery) -> AppResult<Vec<MaintenanceRecord>>;

    /// Write status, estimated completion and timestamps
    async fn update(&self, record: &MaintenanceRecord) -> AppResult<()>;

    /// Remove a record and its history; its incidents are kept but detached
    async fn delete(&self, id: i32) -> AppResult<()>;

    async fn count_open_for_resource(&self, resource_id: i32, exclude_id: Option<i32>) -> AppResult<i64>;

    /// Highest incident number used for a resource, 0 when none
    async fn max_incident_number(&self, resource_id: i32) -> AppResult<i32>;

    async fn create_incident(&self, incident: &NewIncident) -> AppResult<Incident>;

    async fn delete_incident(&self, id: i32) -> AppResult<()>;

    async fn list_incidents_by_resource(&self, resource_id: i32) -> AppResult<Vec<Incident>>;

    async fn list_incidents_by_maintenance(&self, maintenance_id: i32) -> AppResult<Vec<Incident>>;

    /// Incidents attached to a record that is not completed
    async fn list_open_incidents(&self) -> AppResult<Vec<Incident>>;

    async fn update_incidents_status(&self, maintenance_id: i32, status: MaintenanceStatus) -> AppResult<u64>;

    async fn add_history(&self, entry: &NewStatusHistory) -> AppResult<StatusHistory>;

    async fn list_history(&self, maintenance_id: i32) -> AppResult<Vec<StatusHistory>>;

    async fn count_open(&self) -> AppResult<i64>;

    /// Open records whose estimated completion date is before `now`
    async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64>;
}

#[async_trait]
pub trait NotificationsRepository: Send + Sync {
    async fn insert(&self, notification: &NewNotification) -> AppResult<Notification>;

    async fn list_for_user(&self, user_id: i32, unread_only: bool, limit: i64) -> AppResult<Vec<Notification>>;

    async fn stats(&self, user_id: i32) -> AppResult<NotificationStats>;

    async fn mark_read(&self, user_id: i32, id: i32) -> AppResult<()>;

    async fn mark_all_read(&self, user_id: i32) -> AppResult<u64>;

    /// Delete non-persistent notifications expired at `now`
    async fn prune_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Record that `rule_id` notified `recipient_id` about an incident.
    /// Returns false when that dispatch was already recorded. The ledger is
    /// never pruned.
    async fn record_dispatch(
        &self,
        incident_id: i32,
        rule_id: &str,
        recipient_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<User>;

    async fn list_by_role(&self, role: Role) -> AppResult<Vec<User>>;
}

#[async_trait]
pub trait ReferencesRepository: Send + Sync {
    async fn find_area(&self, id: i32) -> AppResult<Option<Reference>>;

    async fn find_grade(&self, id: i32) -> AppResult<Option<Reference>>;

    async fn find_section(&self, id: i32) -> AppResult<Option<Reference>>;
}

/// Main repository struct holding one store per domain
#[derive(Clone)]
pub struct Repository {
    pub loans: Arc<dyn LoansRepository>,
    pub resources: Arc<dyn ResourcesRepository>,
    pub maintenance: Arc<dyn MaintenanceRepository>,
    pub notifications: Arc<dyn NotificationsRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub references: Arc<dyn ReferencesRepository>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            loans: Arc::new(loans::PgLoansRepository::new(pool.clone())),
            resources: Arc::new(resources::PgResourcesRepository::new(pool.clone())),
            maintenance: Arc::new(maintenance::PgMaintenanceRepository::new(pool.clone())),
            notifications: Arc::new(notifications::PgNotificationsRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            references: Arc::new(references::PgReferencesRepository::new(pool)),
        }
    }

    /// Create a repository backed by an in-memory store
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        Self {
            loans: Arc::new(store.clone()),
            resources: Arc::new(store.clone()),
            maintenance: Arc::new(store.clone()),
            notifications: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            references: Arc::new(store),
        }
    }
}
