use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::database::MongoDB;
use crate::models::DoctorSummary;
use crate::services::doctor_service;
use crate::utils::AppError;

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub specialization: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/doctors",
    tag = "Doctors",
    params(("specialization" = Option<String>, Query, description = "Case-insensitive exact match")),
    responses((status = 200, description = "Verified doctors"))
)]
pub async fn list_doctors(
    db: web::Data<MongoDB>,
    query: web::Query<DoctorQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "🩺 GET /doctors - specialization: {}",
        query.specialization.as_deref().unwrap_or("any")
    );

    let doctors = doctor_service::list_doctors(&db, query.specialization.as_deref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": doctors.len(),
        "doctors": doctors
    })))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{user_id}",
    tag = "Doctors",
    params(("user_id" = String, Path, description = "Doctor user ID")),
    responses(
        (status = 200, description = "Doctor profile", body = DoctorSummary),
        (status = 404, description = "Doctor not found")
    )
)]
pub async fn get_doctor(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let doctor = doctor_service::get_doctor(&db, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "doctor": doctor
    })))
}
