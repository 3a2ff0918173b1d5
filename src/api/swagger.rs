use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MediMate Service API",
        version = "1.0.0",
        description = "Backend for the MediMate healthcare application.\n\n**Authentication:** Most endpoints require a JWT Bearer token obtained from `/api/auth/login`.\n\n**Features:**\n- Patient, doctor and admin accounts\n- Appointment booking with an enforced status flow\n- Payment gateway orders and signed payment verification\n- Patient/doctor messaging\n- Medical report records\n- Video consultation room tokens",
        contact(
            name = "MediMate Team",
            email = "support@medimate.example"
        )
    ),
    paths(
        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Auth
        crate::api::auth::login,
        crate::api::auth::register,
        crate::api::auth::verify_token,
        crate::api::auth::get_me,
        crate::api::auth::update_me,

        // Doctors
        crate::api::doctors::list_doctors,
        crate::api::doctors::get_doctor,

        // Appointments
        crate::api::appointments::create_appointment,
        crate::api::appointments::list_appointments,
        crate::api::appointments::get_appointment,
        crate::api::appointments::update_status,
        crate::api::appointments::cancel_appointment,

        // Payments
        crate::api::payments::create_order,
        crate::api::payments::verify_payment,

        // Messages
        crate::api::messages::list_conversations,
        crate::api::messages::create_conversation,
        crate::api::messages::get_conversation,
        crate::api::messages::send_message,
        crate::api::messages::mark_read,

        // Reports
        crate::api::reports::upload_report,
        crate::api::reports::list_reports,
        crate::api::reports::get_report,
        crate::api::reports::review_report,

        // Video
        crate::api::video::issue_token,

        // Admin
        crate::api::admin::list_users,
        crate::api::admin::verify_doctor,
        crate::api::admin::set_active,
        crate::api::admin::get_stats,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::AuthResponse,
            crate::models::UserInfo,
            crate::models::Role,
            crate::models::UpdateProfileRequest,
            crate::models::DoctorSummary,
            crate::models::AppointmentStatus,
            crate::models::PaymentStatus,
            crate::models::Payment,
            crate::models::CreateAppointmentRequest,
            crate::models::UpdateStatusRequest,
            crate::models::CancelAppointmentRequest,
            crate::models::AppointmentResponse,
            crate::services::payment_service::CreateOrderRequest,
            crate::services::payment_service::OrderResponse,
            crate::services::payment_service::VerifyPaymentRequest,
            crate::models::Message,
            crate::models::CreateConversationRequest,
            crate::models::SendMessageRequest,
            crate::models::ConversationSummary,
            crate::models::ConversationResponse,
            crate::models::ReportStatus,
            crate::models::UploadReportRequest,
            crate::models::ReviewReportRequest,
            crate::models::ReportResponse,
            crate::services::video_service::VideoTokenRequest,
            crate::services::video_service::VideoTokenResponse,
            crate::api::admin::SetActiveRequest,
            crate::services::admin_service::PlatformStats,
        )
    ),
    tags(
        (name = "Health", description = "Health check and request metrics."),
        (name = "Auth", description = "Registration, login and profile of the current user."),
        (name = "Doctors", description = "Public directory of verified doctors."),
        (name = "Appointments", description = "Booking and the appointment status flow."),
        (name = "Payments", description = "Payment gateway orders and payment verification."),
        (name = "Messages", description = "Conversations between patients and doctors."),
        (name = "Reports", description = "Medical report records backed by external file storage."),
        (name = "Video", description = "Room tokens for video consultations."),
        (name = "Admin", description = "User management and platform statistics."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token"))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_core_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/appointments",
            "/api/appointments/{id}/status",
            "/api/payments/verify",
            "/api/messages/conversations/{id}",
            "/api/admin/stats",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
