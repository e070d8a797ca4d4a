//! Statistics service

use chrono::Utc;

use crate::{
    api::stats::{MaintenanceStats, StatEntry, StatsResponse},
    error::AppResult,
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Counts consumed by dashboards
    pub async fn get_stats(&self) -> AppResult<StatsResponse> {
        let resources = self.repository.resources.count_by_status().await?;
        let loans = self.repository.loans.count_by_status().await?;
        let open = self.repository.maintenance.count_open().await?;
        let overdue = self.repository.maintenance.count_overdue(Utc::now()).await?;

        Ok(StatsResponse {
            resources_by_status: resources
                .into_iter()
                .map(|c| StatEntry {
                    label: c.status.to_string(),
                    value: c.count,
                })
                .collect(),
            loans_by_status: loans
                .into_iter()
                .map(|c| StatEntry {
                    label: c.status.to_string(),
                    value: c.count,
                })
                .collect(),
            maintenance: MaintenanceStats { open, overdue },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ResourceStatus;
    use crate::repository::memory::MemoryStore;

    #[tokio::test]
    async fn test_counts_by_status() {
        let store = MemoryStore::new();
        store.add_resource(1, "Laptop");
        store.add_resource(1, "Tablet");
        store.add_resource_with_status(2, "Proyector", ResourceStatus::Danado);

        let stats = StatsService::new(Repository::in_memory(store)).get_stats().await.unwrap();

        let available = stats
            .resources_by_status
            .iter()
            .find(|e| e.label == "Disponible")
            .map(|e| e.value);
        assert_eq!(available, Some(2));
        assert_eq!(stats.resources_by_status.len(), 2);
        assert!(stats.loans_by_status.is_empty());
        assert_eq!(stats.maintenance.open, 0);
    }
}
