use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::models::{ReportResponse, ReviewReportRequest, UploadReportRequest};
use crate::services::report_service;
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/reports",
    tag = "Reports",
    request_body = UploadReportRequest,
    responses(
        (status = 201, description = "Report recorded", body = ReportResponse),
        (status = 400, description = "Invalid file reference")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_report(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    request: web::Json<UploadReportRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📄 POST /reports - uploader: {}", claims.sub);

    let report = report_service::upload_report(&db, &claims, &request).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "report": ReportResponse::from(report)
    })))
}

#[utoipa::path(
    get,
    path = "/api/reports",
    tag = "Reports",
    responses((status = 200, description = "Reports visible to the caller")),
    security(("bearer_auth" = []))
)]
pub async fn list_reports(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    log::info!("📄 GET /reports - {} {}", claims.role, claims.sub);

    let reports: Vec<ReportResponse> = report_service::list_reports(&db, &claims)
        .await?
        .into_iter()
        .map(ReportResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": reports.len(),
        "reports": reports
    })))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    tag = "Reports",
    params(("id" = String, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ReportResponse),
        (status = 403, description = "No access"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let report = report_service::get_report(&db, &claims, &id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "report": ReportResponse::from(report)
    })))
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/review",
    tag = "Reports",
    params(("id" = String, Path, description = "Report ID")),
    request_body = ReviewReportRequest,
    responses(
        (status = 200, description = "Report reviewed", body = ReportResponse),
        (status = 403, description = "Not the assigned doctor")
    ),
    security(("bearer_auth" = []))
)]
pub async fn review_report(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<ReviewReportRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("🩺 POST /reports/{}/review - doctor: {}", id, claims.sub);

    let report = report_service::review_report(&db, &claims, &id, &request.notes).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "report": ReportResponse::from(report)
    })))
}
