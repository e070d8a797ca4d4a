//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        enums::LoanStatus,
        loan::{CreateLoan, Loan, LoanDetails, RejectLoan},
        report::{ReturnLoan, ReturnSummary},
    },
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// Loan listing filters
#[derive(Debug, Deserialize, IntoParams)]
pub struct LoanQuery {
    /// Only loans with this status
    pub status: Option<LoanStatus>,
}

/// List loans, newest first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = Vec<Loan>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_loans(query.status).await?;
    Ok(Json(loans))
}

/// Get a loan with its resources
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Create a loan (administrators) or a loan request (teachers)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 400, description = "Invalid request or unknown reference"),
        (status = 403, description = "Teachers can only request loans for themselves"),
        (status = 409, description = "A resource is not available")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<ApiResponse<LoanDetails>>)> {
    let loan = state.services.loans.create_loan(user.actor(), request).await?;
    let message = if loan.loan.is_authorized {
        "Préstamo registrado"
    } else {
        "Solicitud de préstamo registrada"
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message, loan))))
}

/// Authorize a pending loan request
#[utoipa::path(
    post,
    path = "/loans/{id}/authorize",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan authorized", body = LoanDetails),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already authorized, not pending, or a resource is not available")
    )
)]
pub async fn authorize_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<LoanDetails>>> {
    let loan = state.services.loans.authorize(user.actor(), id).await?;
    Ok(Json(ApiResponse::ok("Préstamo autorizado", loan)))
}

/// Reject a loan request that was never authorized
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = RejectLoan,
    responses(
        (status = 200, description = "Loan rejected", body = LoanDetails),
        (status = 403, description = "Not an administrator, or the loan is authorized"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already closed")
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<RejectLoan>>,
) -> AppResult<Json<ApiResponse<LoanDetails>>> {
    let reason = body.and_then(|Json(b)| b.reason);
    let loan = state.services.loans.reject(user.actor(), id, reason).await?;
    Ok(Json(ApiResponse::ok("Solicitud rechazada", loan)))
}

/// Return a loan with its damage and suggestion reports
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Loan returned", body = ReturnSummary),
        (status = 400, description = "Invalid DNI or report"),
        (status = 403, description = "DNI does not match the borrower"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not active or returned concurrently"),
        (status = 500, description = "Return failed and was rolled back")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ReturnLoan>,
) -> AppResult<Json<ApiResponse<ReturnSummary>>> {
    let summary = state.services.loans.return_loan(user.actor(), id, request).await?;
    let message = if summary.maintenance.is_empty() {
        "Devolución registrada".to_string()
    } else {
        format!(
            "Devolución registrada, {} recurso(s) enviados a mantenimiento",
            summary.maintenance.len()
        )
    };
    Ok(Json(ApiResponse::ok(message, summary)))
}
