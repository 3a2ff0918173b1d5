use actix_web::{web, HttpResponse, ResponseError};

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::models::{UpdateProfileRequest, UserInfo};
use crate::services::auth_service::{self, AuthResponse, LoginRequest, RegisterRequest};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(db: web::Data<MongoDB>, request: web::Json<LoginRequest>) -> HttpResponse {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(&db, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(db: web::Data<MongoDB>, request: web::Json<RegisterRequest>) -> HttpResponse {
    let email_str = request.email.as_deref().unwrap_or("N/A");
    let role = request.role.as_deref().unwrap_or("patient");
    log::info!("📝 POST /auth/register - email: {}, role: {}", email_str, role);

    match auth_service::register(&db, &request).await {
        Ok(response) => {
            log::info!("✅ Registration successful: {}", email_str);
            HttpResponse::Created().json(response)
        }
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", email_str, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "Auth",
    responses(
        (status = 200, description = "Token is valid"),
        (status = 401, description = "Invalid or expired token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn verify_token(claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("✓ GET /auth/verify - user: {}", claims.sub);

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "valid": true,
        "user_id": claims.sub,
        "email": claims.email,
        "role": claims.role,
        "exp": claims.exp
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "User information retrieved", body = UserInfo),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(db: web::Data<MongoDB>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👤 GET /auth/me - user: {}", claims.sub);

    match auth_service::get_current_user(&db, &claims.sub).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user
        })),
        Err(e) => {
            log::error!("❌ Failed to get user {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/auth/me",
    tag = "Auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserInfo),
        (status = 400, description = "Invalid profile fields")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_me(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    request: web::Json<UpdateProfileRequest>,
) -> HttpResponse {
    log::info!("✏️ PUT /auth/me - user: {}", claims.sub);

    match auth_service::update_profile(&db, &claims, &request).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user
        })),
        Err(e) => {
            log::warn!("❌ Profile update failed for {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}
