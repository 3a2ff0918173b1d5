use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::models::AppointmentResponse;
use crate::services::payment_service::{
    self, CreateOrderRequest, OrderResponse, PaymentGateway, VerifyPaymentRequest,
};
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/payments/order",
    tag = "Payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Gateway order created", body = OrderResponse),
        (status = 409, description = "Appointment already paid or not payable"),
        (status = 502, description = "Payment gateway unavailable")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    db: web::Data<MongoDB>,
    gateway: web::Data<dyn PaymentGateway>,
    claims: web::ReqData<Claims>,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("💳 POST /payments/order - appointment: {}", request.appointment_id);

    let order = payment_service::create_order(&db, gateway.get_ref(), &claims, &request).await?;

    Ok(HttpResponse::Ok().json(order))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    tag = "Payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified, appointment marked paid", body = AppointmentResponse),
        (status = 400, description = "Signature or order mismatch"),
        (status = 409, description = "Payment already verified")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_payment(
    db: web::Data<MongoDB>,
    gateway: web::Data<dyn PaymentGateway>,
    claims: web::ReqData<Claims>,
    request: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "🔏 POST /payments/verify - appointment: {}, order: {}",
        request.appointment_id,
        request.order_id
    );

    let appointment =
        payment_service::verify_payment(&db, gateway.get_ref(), &claims, &request).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Payment verified",
        "appointment": AppointmentResponse::from(appointment)
    })))
}
