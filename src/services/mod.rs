//! Business logic services

pub mod damage_reports;
pub mod loans;
pub mod locks;
pub mod maintenance;
pub mod notifications;
pub mod resource_state;
pub mod saga;
pub mod stats;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: loans::LoansService,
    pub maintenance: maintenance::MaintenanceService,
    pub notifications: notifications::NotificationService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository.
    ///
    /// Returns and standalone maintenance share one set of resource locks, so
    /// incident numbering is serialized across both.
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let resource_locks = locks::KeyedLocks::new();
        let tracker = resource_state::ResourceStateTracker::new(config.notes.utc_offset_hours);

        let notifications = notifications::NotificationService::new(repository.clone(), &config.notifications);
        let maintenance = maintenance::MaintenanceService::new(
            repository.clone(),
            resource_locks.clone(),
            notifications.clone(),
        );
        let damage_reports = damage_reports::DamageReportProcessor::new(
            repository.clone(),
            tracker.clone(),
            maintenance.clone(),
            notifications.clone(),
            resource_locks,
        );

        Self {
            loans: loans::LoansService::new(repository.clone(), tracker, damage_reports),
            maintenance,
            notifications,
            stats: stats::StatsService::new(repository),
        }
    }
}
