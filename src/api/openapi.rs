//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, loans, maintenance, notifications, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Resource Lending API",
        version = "1.0.0",
        description = "Resource lending, return and maintenance workflow REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::create_loan,
        loans::authorize_loan,
        loans::reject_loan,
        loans::return_loan,
        // Maintenance
        maintenance::list_maintenance,
        maintenance::get_maintenance,
        maintenance::create_maintenance,
        maintenance::update_maintenance_status,
        maintenance::delete_maintenance,
        maintenance::list_resource_incidents,
        maintenance::list_resource_reports,
        // Notifications
        notifications::list_notifications,
        notifications::notification_stats,
        notifications::mark_as_read,
        notifications::mark_all_as_read,
        notifications::sweep_unresolved,
        notifications::reload_rules,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::Role,
            crate::models::enums::LoanStatus,
            crate::models::enums::ResourceStatus,
            crate::models::enums::MaintenanceStatus,
            crate::models::enums::MaintenanceType,
            crate::models::enums::NotificationPriority,
            crate::models::enums::NotificationType,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::CreateLoan,
            crate::models::loan::RejectLoan,
            crate::models::resource::Resource,
            // Returns
            crate::models::report::ReturnLoan,
            crate::models::report::DamageReport,
            crate::models::report::SuggestionReport,
            crate::models::report::ReporterContext,
            crate::models::report::ResourceOutcome,
            crate::models::report::ReturnSummary,
            // Maintenance
            crate::models::maintenance::MaintenanceRecord,
            crate::models::maintenance::Incident,
            crate::models::maintenance::StatusHistory,
            crate::models::maintenance::MaintenanceDetails,
            crate::models::maintenance::CreateMaintenance,
            crate::models::maintenance::UpdateMaintenanceStatus,
            crate::services::resource_state::ParsedNote,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::NotificationStats,
            crate::models::notification::NotificationRule,
            crate::models::notification::RuleConditions,
            crate::models::notification::RuleAction,
            crate::models::notification::TimeThresholds,
            notifications::CountResponse,
            // Stats
            stats::StatsResponse,
            stats::MaintenanceStats,
            stats::StatEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Loan requests, authorization and returns"),
        (name = "maintenance", description = "Maintenance records and incidents"),
        (name = "notifications", description = "Notification inbox"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
