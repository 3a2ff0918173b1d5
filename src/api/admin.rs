use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::models::Role;
use crate::services::admin_service::{self, PlatformStats};
use crate::services::auth_service;
use crate::utils::AppError;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    params(("role" = Option<String>, Query, description = "patient, doctor or admin")),
    responses(
        (status = 200, description = "Users"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    auth_service::require_role(&claims, &[Role::Admin])?;
    log::info!("🛡️ GET /admin/users - admin: {}", claims.sub);

    let users = admin_service::list_users(&db, query.role).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": users.len(),
        "users": users
    })))
}

#[utoipa::path(
    post,
    path = "/api/admin/doctors/{user_id}/verify",
    tag = "Admin",
    params(("user_id" = String, Path, description = "Doctor user ID")),
    responses(
        (status = 200, description = "Doctor verified"),
        (status = 404, description = "Doctor not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_doctor(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth_service::require_role(&claims, &[Role::Admin])?;
    let user_id = path.into_inner();
    log::info!("🛡️ POST /admin/doctors/{}/verify - admin: {}", user_id, claims.sub);

    admin_service::verify_doctor(&db, &user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Doctor verified"
    })))
}

#[utoipa::path(
    post,
    path = "/api/admin/users/{user_id}/active",
    tag = "Admin",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Account status updated"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_active(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<SetActiveRequest>,
) -> Result<HttpResponse, AppError> {
    auth_service::require_role(&claims, &[Role::Admin])?;
    let user_id = path.into_inner();
    log::info!(
        "🛡️ POST /admin/users/{}/active={} - admin: {}",
        user_id,
        request.is_active,
        claims.sub
    );

    admin_service::set_active(&db, &claims, &user_id, request.is_active).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "is_active": request.is_active
    })))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "Admin",
    responses((status = 200, description = "Platform counts", body = PlatformStats)),
    security(("bearer_auth" = []))
)]
pub async fn get_stats(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    auth_service::require_role(&claims, &[Role::Admin])?;

    let stats = admin_service::stats(&db).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "stats": stats
    })))
}
