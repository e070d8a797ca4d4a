//! Rule-driven notifications about maintenance incidents

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::NotificationsConfig,
    error::{AppError, AppResult},
    models::{
        enums::{MaintenanceStatus, NotificationPriority, NotificationType, Role},
        maintenance::{Incident, MaintenanceRecord},
        notification::{
            NewNotification, Notification, NotificationQuery, NotificationRule, NotificationStats,
            RuleAction, RuleConditions, TimeThresholds,
        },
    },
    repository::Repository,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Built-in ruleset used when no rules file is configured or it cannot be read
pub fn default_rules() -> Vec<NotificationRule> {
    vec![
        NotificationRule {
            id: "critical-damage".to_string(),
            name: "Daño crítico reportado".to_string(),
            conditions: RuleConditions {
                incident_types: Some(vec!["daño".to_string(), "hardware".to_string()]),
                ..Default::default()
            },
            action: RuleAction {
                priority: NotificationPriority::Critical,
                persistent: true,
            },
        },
        NotificationRule {
            id: "open-3-days".to_string(),
            name: "Incidencia abierta hace más de 3 días".to_string(),
            conditions: RuleConditions {
                time_thresholds: Some(TimeThresholds {
                    unresolved_minutes: None,
                    overdue_days: Some(3),
                }),
                ..Default::default()
            },
            action: RuleAction {
                priority: NotificationPriority::High,
                persistent: true,
            },
        },
        NotificationRule {
            id: "unactioned-60-min".to_string(),
            name: "Incidencia sin atender".to_string(),
            conditions: RuleConditions {
                statuses: Some(vec![MaintenanceStatus::Pendiente]),
                time_thresholds: Some(TimeThresholds {
                    unresolved_minutes: Some(60),
                    overdue_days: None,
                }),
                ..Default::default()
            },
            action: RuleAction {
                priority: NotificationPriority::Medium,
                persistent: false,
            },
        },
    ]
}

/// Incident being evaluated, with the category of its resource
#[derive(Debug, Clone, Copy)]
pub struct IncidentContext<'a> {
    pub incident: &'a Incident,
    pub resource_category: i32,
}

/// True when every condition present in the rule matches
pub fn evaluate(
    rule: &NotificationRule,
    ctx: IncidentContext<'_>,
    event: NotificationType,
    now: DateTime<Utc>,
) -> bool {
    if event == NotificationType::IncidentResolved {
        return false;
    }

    let conditions = &rule.conditions;
    let incident = ctx.incident;

    if let Some(types) = &conditions.incident_types {
        let matches = incident.incident_category.as_deref().map_or(false, |category| {
            let category = category.to_lowercase();
            types.iter().any(|t| t.to_lowercase() == category)
        });
        if !matches {
            return false;
        }
    }

    if let Some(statuses) = &conditions.statuses {
        if !statuses.contains(&incident.current_status) {
            return false;
        }
    }

    if let Some(thresholds) = &conditions.time_thresholds {
        let elapsed = now - incident.created_at;
        if let Some(minutes) = thresholds.unresolved_minutes {
            if elapsed < Duration::minutes(minutes) {
                return false;
            }
        }
        if let Some(days) = thresholds.overdue_days {
            if elapsed < Duration::days(days) {
                return false;
            }
        }
    }

    if let Some(categories) = &conditions.resource_categories {
        if !categories.contains(&ctx.resource_category) {
            return false;
        }
    }

    true
}

#[derive(Clone)]
pub struct NotificationService {
    repository: Repository,
    rules: Arc<RwLock<Vec<NotificationRule>>>,
    rules_path: Option<PathBuf>,
    transient_ttl: Duration,
}

impl NotificationService {
    /// Create the service, loading the ruleset once
    pub fn new(repository: Repository, config: &NotificationsConfig) -> Self {
        let rules_path = config.rules_path.as_ref().map(PathBuf::from);
        let rules = match &rules_path {
            Some(path) => load_rules(path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load notification rules, using defaults");
                default_rules()
            }),
            None => default_rules(),
        };
        tracing::info!(rules = rules.len(), "Notification rules loaded");

        Self {
            repository,
            rules: Arc::new(RwLock::new(rules)),
            rules_path,
            transient_ttl: Duration::hours(config.transient_ttl_hours),
        }
    }

    pub fn rules(&self) -> Vec<NotificationRule> {
        self.rules.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Re-read the rules file; the current rules are kept if it cannot be parsed
    pub fn reload(&self) -> AppResult<Vec<NotificationRule>> {
        let rules = match &self.rules_path {
            Some(path) => load_rules(path)?,
            None => default_rules(),
        };
        let mut current = self
            .rules
            .write()
            .map_err(|_| AppError::Internal("Notification rules lock poisoned".to_string()))?;
        *current = rules.clone();
        tracing::info!(rules = rules.len(), "Notification rules reloaded");
        Ok(rules)
    }

    fn expiry(&self, persistent: bool, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if persistent {
            None
        } else {
            Some(now + self.transient_ttl)
        }
    }

    async fn admins(&self) -> AppResult<Vec<i32>> {
        let admins = self.repository.users.list_by_role(Role::Administrador).await?;
        Ok(admins.into_iter().map(|u| u.id).collect())
    }

    // -- events ------------------------------------------------------------

    /// Notify administrators about a new incident; failures are only logged
    pub async fn incident_created(&self, incident: &Incident, resource_category: i32) {
        let ctx = IncidentContext { incident, resource_category };
        if let Err(e) = self.dispatch_created(ctx, Utc::now()).await {
            tracing::error!(incident_id = incident.id, error = %e, "Failed to dispatch incident notification");
        }
    }

    /// Evaluate every rule against a new incident, returning how many
    /// notifications were stored
    pub async fn dispatch_created(&self, ctx: IncidentContext<'_>, now: DateTime<Utc>) -> AppResult<usize> {
        let matched: Vec<NotificationRule> = self
            .rules()
            .into_iter()
            .filter(|rule| evaluate(rule, ctx, NotificationType::IncidentCreated, now))
            .collect();
        if matched.is_empty() {
            return Ok(0);
        }

        let admins = self.admins().await?;
        let mut created = 0;
        for rule in &matched {
            for recipient_id in &admins {
                if !self
                    .repository
                    .notifications
                    .record_dispatch(ctx.incident.id, &rule.id, *recipient_id, now)
                    .await?
                {
                    continue;
                }
                self.repository
                    .notifications
                    .insert(&self.rule_notification(rule, ctx.incident, NotificationType::IncidentCreated, *recipient_id, now))
                    .await?;
                created += 1;
            }
        }

        tracing::debug!(incident_id = ctx.incident.id, created, "Incident notifications dispatched");
        Ok(created)
    }

    /// Notify administrators that a maintenance record was completed;
    /// failures are only logged
    pub async fn incident_resolved(&self, record: &MaintenanceRecord, incidents: &[Incident]) {
        if let Err(e) = self.dispatch_resolved(record, incidents, Utc::now()).await {
            tracing::error!(maintenance_id = record.id, error = %e, "Failed to dispatch resolution notification");
        }
    }

    pub async fn dispatch_resolved(
        &self,
        record: &MaintenanceRecord,
        incidents: &[Incident],
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let admins = self.admins().await?;
        let incident_id = incidents.first().map(|i| i.id);
        let numbers: Vec<String> = incidents.iter().map(|i| format!("#{}", i.incident_number)).collect();
        let message = if numbers.is_empty() {
            format!("Mantenimiento #{} del recurso #{} completado", record.id, record.resource_id)
        } else {
            format!(
                "Mantenimiento #{} del recurso #{} completado (incidencias {})",
                record.id,
                record.resource_id,
                numbers.join(", ")
            )
        };

        for recipient_id in &admins {
            let notification = NewNotification {
                notification_type: NotificationType::IncidentResolved,
                priority: NotificationPriority::Low,
                recipient_id: *recipient_id,
                incident_id,
                rule_id: None,
                title: "Incidencia resuelta".to_string(),
                message: message.clone(),
                persistent: false,
                expires_at: self.expiry(false, now),
                created_at: now,
            };
            self.repository.notifications.insert(&notification).await?;
        }
        Ok(admins.len())
    }

    /// Evaluate time-threshold rules against open incidents. A rule notifies
    /// each recipient at most once per incident, even after the notification
    /// itself expired and was pruned.
    pub async fn sweep_unresolved(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let rules: Vec<NotificationRule> = self
            .rules()
            .into_iter()
            .filter(|r| r.conditions.time_thresholds.is_some())
            .collect();
        if rules.is_empty() {
            return Ok(0);
        }

        let incidents = self.repository.maintenance.list_open_incidents().await?;
        if incidents.is_empty() {
            return Ok(0);
        }
        let admins = self.admins().await?;

        let mut categories: HashMap<i32, i32> = HashMap::new();
        let mut created = 0;
        for incident in &incidents {
            let resource_category = match categories.get(&incident.resource_id) {
                Some(category) => *category,
                None => {
                    let resource = self.repository.resources.get_by_id(incident.resource_id).await?;
                    categories.insert(resource.id, resource.category_id);
                    resource.category_id
                }
            };
            let ctx = IncidentContext { incident, resource_category };

            for rule in rules.iter().filter(|r| evaluate(r, ctx, NotificationType::IncidentEscalated, now)) {
                for recipient_id in &admins {
                    if !self
                        .repository
                        .notifications
                        .record_dispatch(incident.id, &rule.id, *recipient_id, now)
                        .await?
                    {
                        continue;
                    }
                    self.repository
                        .notifications
                        .insert(&self.rule_notification(rule, incident, NotificationType::IncidentEscalated, *recipient_id, now))
                        .await?;
                    created += 1;
                }
            }
        }

        tracing::info!(incidents = incidents.len(), created, "Unresolved incident sweep finished");
        Ok(created)
    }

    fn rule_notification(
        &self,
        rule: &NotificationRule,
        incident: &Incident,
        notification_type: NotificationType,
        recipient_id: i32,
        now: DateTime<Utc>,
    ) -> NewNotification {
        NewNotification {
            notification_type,
            priority: rule.action.priority,
            recipient_id,
            incident_id: Some(incident.id),
            rule_id: Some(rule.id.clone()),
            title: rule.name.clone(),
            message: format!(
                "Recurso #{} - incidencia #{}: {}",
                incident.resource_id, incident.incident_number, incident.damage_type
            ),
            persistent: rule.action.persistent,
            expires_at: self.expiry(rule.action.persistent, now),
            created_at: now,
        }
    }

    // -- inbox -------------------------------------------------------------

    async fn prune_expired(&self) -> AppResult<()> {
        let pruned = self.repository.notifications.prune_expired(Utc::now()).await?;
        if pruned > 0 {
            tracing::debug!(pruned, "Expired notifications removed");
        }
        Ok(())
    }

    pub async fn get_user_notifications(&self, user_id: i32, query: &NotificationQuery) -> AppResult<Vec<Notification>> {
        self.prune_expired().await?;

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        self.repository
            .notifications
            .list_for_user(user_id, query.unread_only, limit)
            .await
    }

    pub async fn get_notification_stats(&self, user_id: i32) -> AppResult<NotificationStats> {
        self.prune_expired().await?;
        self.repository.notifications.stats(user_id).await
    }

    pub async fn mark_as_read(&self, user_id: i32, id: i32) -> AppResult<()> {
        self.repository.notifications.mark_read(user_id, id).await
    }

    pub async fn mark_all_as_read(&self, user_id: i32) -> AppResult<u64> {
        self.repository.notifications.mark_all_read(user_id).await
    }
}

fn load_rules(path: &Path) -> AppResult<Vec<NotificationRule>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Internal(format!("Cannot read rules file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::Validation(format!("Invalid rules file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use crate::repository::{memory::MemoryStore, MockUsersRepository};

    fn incident(category: Option<&str>, status: MaintenanceStatus, created_at: DateTime<Utc>) -> Incident {
        Incident {
            id: 10,
            maintenance_id: Some(5),
            resource_id: 3,
            incident_number: 1,
            incident_category: category.map(str::to_string),
            damage_type: "Pantalla rota".to_string(),
            damage_description: "Pantalla rota".to_string(),
            reporter_teacher: None,
            reporter_grade: None,
            reporter_section: None,
            current_status: status,
            created_at,
        }
    }

    fn admin(id: i32) -> User {
        User {
            id,
            dni: "11111111".to_string(),
            full_name: format!("Admin {}", id),
            role: Role::Administrador,
        }
    }

    fn service_with_users(store: MemoryStore, users: MockUsersRepository) -> NotificationService {
        let mut repository = Repository::in_memory(store);
        repository.users = Arc::new(users);
        NotificationService::new(repository, &NotificationsConfig::default())
    }

    #[test]
    fn test_evaluate_default_rules() {
        let rules = default_rules();
        let now = Utc::now();
        let fresh = incident(Some("daño"), MaintenanceStatus::Pendiente, now);
        let ctx = IncidentContext { incident: &fresh, resource_category: 1 };

        assert!(evaluate(&rules[0], ctx, NotificationType::IncidentCreated, now));
        assert!(!evaluate(&rules[1], ctx, NotificationType::IncidentCreated, now));
        assert!(!evaluate(&rules[2], ctx, NotificationType::IncidentCreated, now));

        let old = incident(None, MaintenanceStatus::Pendiente, now - Duration::days(4));
        let ctx = IncidentContext { incident: &old, resource_category: 1 };
        assert!(!evaluate(&rules[0], ctx, NotificationType::IncidentEscalated, now));
        assert!(evaluate(&rules[1], ctx, NotificationType::IncidentEscalated, now));
        assert!(evaluate(&rules[2], ctx, NotificationType::IncidentEscalated, now));

        let started = incident(None, MaintenanceStatus::EnProceso, now - Duration::hours(2));
        let ctx = IncidentContext { incident: &started, resource_category: 1 };
        assert!(!evaluate(&rules[2], ctx, NotificationType::IncidentEscalated, now));
    }

    #[test]
    fn test_evaluate_resource_category() {
        let now = Utc::now();
        let rule = NotificationRule {
            id: "labs".to_string(),
            name: "Laboratorio".to_string(),
            conditions: RuleConditions {
                resource_categories: Some(vec![7]),
                ..Default::default()
            },
            action: RuleAction {
                priority: NotificationPriority::High,
                persistent: true,
            },
        };
        let i = incident(None, MaintenanceStatus::Pendiente, now);

        assert!(evaluate(&rule, IncidentContext { incident: &i, resource_category: 7 }, NotificationType::IncidentCreated, now));
        assert!(!evaluate(&rule, IncidentContext { incident: &i, resource_category: 2 }, NotificationType::IncidentCreated, now));
        assert!(!evaluate(&rule, IncidentContext { incident: &i, resource_category: 7 }, NotificationType::IncidentResolved, now));
    }

    #[tokio::test]
    async fn test_created_notifies_every_admin() {
        let store = MemoryStore::new();
        let mut users = MockUsersRepository::new();
        users
            .expect_list_by_role()
            .withf(|role| *role == Role::Administrador)
            .returning(|_| Ok(vec![admin(1), admin(2)]));
        let service = service_with_users(store.clone(), users);

        let now = Utc::now();
        let i = incident(Some("daño"), MaintenanceStatus::Pendiente, now);
        let created = service
            .dispatch_created(IncidentContext { incident: &i, resource_category: 1 }, now)
            .await
            .unwrap();

        assert_eq!(created, 2);
        let inbox = service.get_user_notifications(2, &NotificationQuery::default()).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].priority, NotificationPriority::Critical);
        assert!(inbox[0].persistent);
        assert_eq!(inbox[0].expires_at, None);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        let store = MemoryStore::new();
        let mut users = MockUsersRepository::new();
        users
            .expect_list_by_role()
            .returning(|_| Err(AppError::persistence("directory down")));
        let service = service_with_users(store.clone(), users);

        let i = incident(Some("daño"), MaintenanceStatus::Pendiente, Utc::now());
        service.incident_created(&i, 1).await;
        assert_eq!(store.notification_count(), 0);
    }

    async fn open_incident(store: &MemoryStore, repository: &Repository, opened_at: DateTime<Utc>) {
        let resource = store.add_resource(1, "Proyector");
        let record = repository
            .maintenance
            .create(&crate::models::maintenance::NewMaintenance {
                resource_id: resource.id,
                maintenance_type: crate::models::enums::MaintenanceType::Correctivo,
                incident_category: None,
                description: "Lámpara".to_string(),
                estimated_completion_date: None,
                created_at: opened_at,
            })
            .await
            .unwrap();
        let incident = repository
            .maintenance
            .create_incident(&crate::models::maintenance::NewIncident {
                maintenance_id: record.id,
                resource_id: resource.id,
                incident_number: 1,
                incident_category: None,
                damage_type: "Lámpara fundida".to_string(),
                damage_description: "Lámpara".to_string(),
                reporter: None,
                created_at: opened_at,
            })
            .await
            .unwrap();
        store.set_incident_created_at(incident.id, opened_at);
    }

    #[tokio::test]
    async fn test_sweep_does_not_duplicate() {
        let store = MemoryStore::new();
        store.add_user("11111111", "Admin", Role::Administrador);
        let repository = Repository::in_memory(store.clone());
        let service = NotificationService::new(repository.clone(), &NotificationsConfig::default());

        let now = Utc::now();
        open_incident(&store, &repository, now - Duration::days(4)).await;

        // open-3-days and unactioned-60-min both match
        assert_eq!(service.sweep_unresolved(now).await.unwrap(), 2);
        assert_eq!(service.sweep_unresolved(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_rules_whose_notification_expired() {
        let store = MemoryStore::new();
        let admin = store.add_user("11111111", "Admin", Role::Administrador);
        let repository = Repository::in_memory(store.clone());
        let service = NotificationService::new(repository.clone(), &NotificationsConfig::default());

        let now = Utc::now();
        open_incident(&store, &repository, now - Duration::hours(27)).await;

        // only unactioned-60-min matches; its transient notification expires an hour ago
        assert_eq!(service.sweep_unresolved(now - Duration::hours(25)).await.unwrap(), 1);
        let inbox = service.get_user_notifications(admin.id, &NotificationQuery::default()).await.unwrap();
        assert!(inbox.is_empty());
        assert_eq!(store.notification_count(), 0);

        assert_eq!(service.sweep_unresolved(now).await.unwrap(), 0);
        assert_eq!(service.get_notification_stats(admin.id).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_transient_notifications_expire() {
        let store = MemoryStore::new();
        let admin = store.add_user("11111111", "Admin", Role::Administrador);
        let repository = Repository::in_memory(store.clone());
        let service = NotificationService::new(repository, &NotificationsConfig::default());

        let record = MaintenanceRecord {
            id: 1,
            resource_id: 2,
            maintenance_type: crate::models::enums::MaintenanceType::Correctivo,
            incident_category: None,
            description: "x".to_string(),
            current_status: MaintenanceStatus::Completado,
            estimated_completion_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        service
            .dispatch_resolved(&record, &[], Utc::now() - Duration::hours(25))
            .await
            .unwrap();
        assert_eq!(service.get_notification_stats(admin.id).await.unwrap().low, 0);
        assert_eq!(store.notification_count(), 0);

        let inbox = service.get_user_notifications(admin.id, &NotificationQuery::default()).await.unwrap();
        assert!(inbox.is_empty());
        assert_eq!(service.get_notification_stats(admin.id).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_reload_keeps_rules_on_bad_file() {
        let path = std::env::temp_dir().join(format!("lending-rules-{}.json", std::process::id()));
        std::fs::write(&path, r#"[{"id":"only","name":"Solo","action":{"priority":"high","persistent":true}}]"#).unwrap();

        let config = NotificationsConfig {
            rules_path: Some(path.display().to_string()),
            transient_ttl_hours: 24,
        };
        let service = NotificationService::new(Repository::in_memory(MemoryStore::new()), &config);
        assert_eq!(service.rules().len(), 1);

        std::fs::write(&path, "not json").unwrap();
        assert!(service.reload().is_err());
        assert_eq!(service.rules()[0].id, "only");

        std::fs::remove_file(&path).ok();
    }
}
