use crate::{
    database::{self, MongoDB},
    middleware::auth::Claims,
    models::{Appointment, AppointmentStatus, Role},
    services::appointment_service,
    utils::{AppError, AppResult},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Claims understood by the video provider's room tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoClaims {
    pub sub: String,
    pub room: String,
    pub role: Role,
    pub iss: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct VideoTokenRequest {
    pub appointment_id: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoTokenResponse {
    pub success: bool,
    pub token: String,
    pub room: String,
    pub join_url: String,
    pub expires_at: i64,
}

fn get_video_api_key() -> String {
    std::env::var("VIDEO_API_KEY").unwrap_or_else(|_| "medimate-video".to_string())
}

fn get_video_api_secret() -> String {
    std::env::var("VIDEO_API_SECRET").unwrap_or_else(|_| "video-secret-change-me".to_string())
}

fn get_video_base_url() -> String {
    std::env::var("VIDEO_BASE_URL").unwrap_or_else(|_| "http://localhost:3000/video".to_string())
}

pub fn room_name(appointment: &Appointment) -> String {
    format!("appointment-{}", appointment.id_hex())
}

/// Only the two participants may join, and only once the doctor has
/// confirmed the visit and until it ends.
pub fn check_can_join(claims: &Claims, appointment: &Appointment) -> AppResult<()> {
    if !appointment.is_participant(&claims.sub) {
        return Err(AppError::Forbidden(
            "Only the patient and doctor can join this consultation".to_string(),
        ));
    }

    match appointment.status {
        AppointmentStatus::Confirmed | AppointmentStatus::InProgress => Ok(()),
        status => Err(AppError::Conflict(format!(
            "Video consultation is not available for a '{}' appointment",
            status
        ))),
    }
}

pub fn build_join_url(base: &str, room: &str, token: &str) -> String {
    format!(
        "{}/{}?token={}",
        base.trim_end_matches('/'),
        urlencoding::encode(room),
        urlencoding::encode(token)
    )
}

pub fn sign_room_token(claims: &Claims, room: &str, secret: &str) -> AppResult<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::hours(1);

    let video_claims = VideoClaims {
        sub: claims.sub.clone(),
        room: room.to_string(),
        role: claims.role,
        iss: get_video_api_key(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &video_claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign video token: {}", e)))?;

    Ok((token, exp.timestamp()))
}

pub async fn issue_token(
    db: &MongoDB,
    claims: &Claims,
    appointment_id: &str,
) -> AppResult<VideoTokenResponse> {
    let object_id = database::parse_object_id(appointment_id, "appointment")?;
    let appointment = appointment_service::find_appointment(db, object_id).await?;
    check_can_join(claims, &appointment)?;

    let room = room_name(&appointment);
    let (token, expires_at) = sign_room_token(claims, &room, &get_video_api_secret())?;

    log::info!("🎥 Video token issued to {} for {}", claims.sub, room);

    Ok(VideoTokenResponse {
        success: true,
        join_url: build_join_url(&get_video_base_url(), &room, &token),
        token,
        room,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::appointment_service::tests::appointment;
    use crate::services::auth_service::tests::claims_for;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[test]
    fn test_only_participants_of_confirmed_visits_join() {
        let patient = claims_for("patient-1", Role::Patient);
        let doctor = claims_for("doctor-1", Role::Doctor);
        let stranger = claims_for("patient-2", Role::Patient);

        assert!(check_can_join(&patient, &appointment(AppointmentStatus::Confirmed)).is_ok());
        assert!(check_can_join(&doctor, &appointment(AppointmentStatus::InProgress)).is_ok());
        assert!(matches!(
            check_can_join(&stranger, &appointment(AppointmentStatus::Confirmed)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            check_can_join(&patient, &appointment(AppointmentStatus::Paid)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_room_token_is_verifiable() {
        let appt = appointment(AppointmentStatus::Confirmed);
        let room = room_name(&appt);
        let (token, exp) = sign_room_token(&claims_for("doctor-1", Role::Doctor), &room, "s3cret").unwrap();

        let data = decode::<VideoClaims>(
            &token,
            &DecodingKey::from_secret(b"s3cret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.room, room);
        assert_eq!(data.claims.sub, "doctor-1");
        assert_eq!(data.claims.exp as i64, exp);
    }

    #[test]
    fn test_join_url_encoding() {
        let url = build_join_url("https://meet.example.com/", "appointment-1", "a.b+c");
        assert_eq!(url, "https://meet.example.com/appointment-1?token=a.b%2Bc");
    }
}
