use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::services::video_service::{self, VideoTokenRequest, VideoTokenResponse};
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/video/token",
    tag = "Video",
    request_body = VideoTokenRequest,
    responses(
        (status = 200, description = "Room token issued", body = VideoTokenResponse),
        (status = 403, description = "Not a participant"),
        (status = 409, description = "Appointment not confirmed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn issue_token(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    request: web::Json<VideoTokenRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "🎥 POST /video/token - appointment: {}, user: {}",
        request.appointment_id,
        claims.sub
    );

    let response = video_service::issue_token(&db, &claims, &request.appointment_id).await?;

    Ok(HttpResponse::Ok().json(response))
}
