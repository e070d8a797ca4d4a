//! Notification inbox endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::notification::{Notification, NotificationQuery, NotificationRule, NotificationStats},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// Number of rows touched by a bulk operation
#[derive(Serialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}

/// Notifications of the current user, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state
        .services
        .notifications
        .get_user_notifications(user.actor().id, &query)
        .await?;
    Ok(Json(notifications))
}

/// Notification counts of the current user
#[utoipa::path(
    get,
    path = "/notifications/stats",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counts by read state and priority", body = NotificationStats)
    )
)]
pub async fn notification_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<NotificationStats>> {
    let stats = state
        .services
        .notifications
        .get_notification_stats(user.actor().id)
        .await?;
    Ok(Json(stats))
}

/// Mark one notification as read
#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_as_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .services
        .notifications
        .mark_as_read(user.actor().id, id)
        .await?;
    Ok(Json(ApiResponse::ok("Notificación leída", ())))
}

/// Mark every notification of the current user as read
#[utoipa::path(
    put,
    path = "/notifications/read-all",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Marked as read", body = CountResponse)
    )
)]
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<CountResponse>>> {
    let count = state
        .services
        .notifications
        .mark_all_as_read(user.actor().id)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Notificaciones leídas",
        CountResponse { count },
    )))
}

/// Evaluate time-based rules against open incidents
#[utoipa::path(
    post,
    path = "/notifications/sweep",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Notifications created", body = CountResponse),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn sweep_unresolved(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<CountResponse>>> {
    user.actor().require_admin()?;
    let created = state.services.notifications.sweep_unresolved(Utc::now()).await?;
    Ok(Json(ApiResponse::ok(
        "Revisión de incidencias completada",
        CountResponse {
            count: created as u64,
        },
    )))
}

/// Reload notification rules from the configured file
#[utoipa::path(
    post,
    path = "/notifications/rules/reload",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active rules", body = Vec<NotificationRule>),
        (status = 400, description = "Rules file is invalid"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn reload_rules(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<NotificationRule>>>> {
    user.actor().require_admin()?;
    let rules = state.services.notifications.reload()?;
    Ok(Json(ApiResponse::ok("Reglas recargadas", rules)))
}
