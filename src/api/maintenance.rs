//! Maintenance and incident endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::maintenance::{
        CreateMaintenance, Incident, MaintenanceDetails, MaintenanceQuery, MaintenanceRecord,
        UpdateMaintenanceStatus,
    },
    services::resource_state::ParsedNote,
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// List maintenance records
#[utoipa::path(
    get,
    path = "/maintenance",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(MaintenanceQuery),
    responses(
        (status = 200, description = "Maintenance records", body = Vec<MaintenanceRecord>)
    )
)]
pub async fn list_maintenance(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<MaintenanceQuery>,
) -> AppResult<Json<Vec<MaintenanceRecord>>> {
    let records = state.services.maintenance.list_maintenance(&query).await?;
    Ok(Json(records))
}

/// Get a maintenance record with its incidents and history
#[utoipa::path(
    get,
    path = "/maintenance/{id}",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance record ID")),
    responses(
        (status = 200, description = "Maintenance record", body = MaintenanceDetails),
        (status = 404, description = "Maintenance record not found")
    )
)]
pub async fn get_maintenance(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MaintenanceDetails>> {
    let details = state.services.maintenance.get_maintenance(id).await?;
    Ok(Json(details))
}

/// Open maintenance on a resource
#[utoipa::path(
    post,
    path = "/maintenance",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    request_body = CreateMaintenance,
    responses(
        (status = 201, description = "Maintenance record created", body = MaintenanceDetails),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Resource not found")
    )
)]
pub async fn create_maintenance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateMaintenance>,
) -> AppResult<(StatusCode, Json<ApiResponse<MaintenanceDetails>>)> {
    let details = state
        .services
        .maintenance
        .create_maintenance_record(user.actor(), request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Mantenimiento registrado", details)),
    ))
}

/// Change the status of a maintenance record
#[utoipa::path(
    put,
    path = "/maintenance/{id}/status",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance record ID")),
    request_body = UpdateMaintenanceStatus,
    responses(
        (status = 200, description = "Status updated", body = MaintenanceDetails),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Maintenance record not found"),
        (status = 409, description = "Record already completed")
    )
)]
pub async fn update_maintenance_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMaintenanceStatus>,
) -> AppResult<Json<ApiResponse<MaintenanceDetails>>> {
    let details = state
        .services
        .maintenance
        .update_maintenance_status(user.actor(), id, request)
        .await?;
    Ok(Json(ApiResponse::ok("Estado de mantenimiento actualizado", details)))
}

/// Delete a maintenance record
#[utoipa::path(
    delete,
    path = "/maintenance/{id}",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance record ID")),
    responses(
        (status = 200, description = "Maintenance record deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Maintenance record not found")
    )
)]
pub async fn delete_maintenance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .services
        .maintenance
        .delete_maintenance_record(user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::ok("Mantenimiento eliminado", ())))
}

/// List every incident of a resource
#[utoipa::path(
    get,
    path = "/resources/{id}/incidents",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Incidents ordered by number", body = Vec<Incident>),
        (status = 404, description = "Resource not found")
    )
)]
pub async fn list_resource_incidents(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Incident>>> {
    let incidents = state.services.maintenance.list_incidents(id).await?;
    Ok(Json(incidents))
}

/// Report history read back from the resource notes
#[utoipa::path(
    get,
    path = "/resources/{id}/reports",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Reports, oldest first", body = Vec<ParsedNote>),
        (status = 404, description = "Resource not found")
    )
)]
pub async fn list_resource_reports(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<ParsedNote>>> {
    let reports = state.services.maintenance.report_history(id).await?;
    Ok(Json(reports))
}
