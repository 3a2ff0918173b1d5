use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::models::{
    AppointmentQuery, AppointmentResponse, CancelAppointmentRequest, CreateAppointmentRequest,
    UpdateStatusRequest,
};
use crate::services::appointment_service;
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "Appointments",
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentResponse),
        (status = 403, description = "Only patients can book"),
        (status = 409, description = "Slot already booked")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_appointment(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    request: web::Json<CreateAppointmentRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "📅 POST /appointments - patient: {}, doctor: {}, {} {}",
        claims.sub,
        request.doctor_id,
        request.date,
        request.time
    );

    let appointment = appointment_service::create_appointment(&db, &claims, &request).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "appointment": AppointmentResponse::from(appointment)
    })))
}

#[utoipa::path(
    get,
    path = "/api/appointments",
    tag = "Appointments",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("order" = Option<String>, Query, description = "asc (default) or desc")
    ),
    responses(
        (status = 200, description = "Appointments visible to the caller")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_appointments(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    query: web::Query<AppointmentQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("📋 GET /appointments - {} {}", claims.role, claims.sub);

    let appointments: Vec<AppointmentResponse> =
        appointment_service::list_appointments(&db, &claims, &query)
            .await?
            .into_iter()
            .map(AppointmentResponse::from)
            .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    params(("id" = String, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Appointment", body = AppointmentResponse),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Appointment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_appointment(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("🔎 GET /appointments/{} - user: {}", id, claims.sub);

    let appointment = appointment_service::get_appointment(&db, &claims, &id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "appointment": AppointmentResponse::from(appointment)
    })))
}

#[utoipa::path(
    patch,
    path = "/api/appointments/{id}/status",
    tag = "Appointments",
    params(("id" = String, Path, description = "Appointment ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = AppointmentResponse),
        (status = 403, description = "Caller may not make this change"),
        (status = 409, description = "Transition not allowed from the current status")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("🔄 PATCH /appointments/{}/status -> {} by {}", id, request.status, claims.sub);

    let appointment = appointment_service::update_status(
        &db,
        &claims,
        &id,
        request.status,
        request.notes.as_deref(),
        None,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "appointment": AppointmentResponse::from(appointment)
    })))
}

#[utoipa::path(
    post,
    path = "/api/appointments/{id}/cancel",
    tag = "Appointments",
    params(("id" = String, Path, description = "Appointment ID")),
    request_body = CancelAppointmentRequest,
    responses(
        (status = 200, description = "Appointment cancelled", body = AppointmentResponse),
        (status = 409, description = "Appointment can no longer be cancelled")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_appointment(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<CancelAppointmentRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("❌ POST /appointments/{}/cancel by {}", id, claims.sub);

    let appointment =
        appointment_service::cancel_appointment(&db, &claims, &id, request.reason.as_deref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "appointment": AppointmentResponse::from(appointment)
    })))
}
