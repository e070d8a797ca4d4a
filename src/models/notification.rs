//! Notifications and the rules that produce them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::{MaintenanceStatus, NotificationPriority, NotificationType};

/// Notification delivered to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub recipient_id: i32,
    pub incident_id: Option<i32>,
    /// Rule that produced the notification, if any
    pub rule_id: Option<String>,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub persistent: bool,
    /// Absent when persistent
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub recipient_id: i32,
    pub incident_id: Option<i32>,
    pub rule_id: Option<String>,
    pub title: String,
    pub message: String,
    pub persistent: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Inbox query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

/// Notification counts for one recipient
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

/// Elapsed-time conditions of a rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimeThresholds {
    pub unresolved_minutes: Option<i64>,
    pub overdue_days: Option<i64>,
}

/// Conditions a rule checks; absent conditions always match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RuleConditions {
    pub incident_types: Option<Vec<String>>,
    pub statuses: Option<Vec<MaintenanceStatus>>,
    pub time_thresholds: Option<TimeThresholds>,
    pub resource_categories: Option<Vec<i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RuleAction {
    pub priority: NotificationPriority,
    pub persistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub action: RuleAction,
}
