//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

use super::AuthenticatedUser;

/// Statistics response
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    /// Resources per status
    pub resources_by_status: Vec<StatEntry>,
    /// Loans per status
    pub loans_by_status: Vec<StatEntry>,
    pub maintenance: MaintenanceStats,
}

#[derive(Serialize, ToSchema)]
pub struct MaintenanceStats {
    /// Records not completed yet
    pub open: i64,
    /// Open records past their estimated completion date
    pub overdue: i64,
}

#[derive(Serialize, ToSchema)]
pub struct StatEntry {
    /// Label
    pub label: String,
    /// Value
    pub value: i64,
}

/// Get lending statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Statistics", body = StatsResponse)
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<StatsResponse>> {
    let stats = state.services.stats.get_stats().await?;
    Ok(Json(stats))
}
