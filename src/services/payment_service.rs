use crate::{
    database::{self, MongoDB},
    middleware::auth::Claims,
    models::{Appointment, AppointmentStatus, PaymentStatus, Role},
    services::{appointment_service, auth_service::{self, now}},
    utils::{signature, AppError, AppResult},
};
use async_trait::async_trait;
use lazy_static::lazy_static;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

lazy_static! {
    /// Shared HTTP client for gateway calls (connection reuse across requests)
    static ref HTTP_CLIENT: reqwest::Client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
}

/// Order as returned by the payment gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Seam to the external payment gateway. Only order creation goes over the
/// wire; checkout happens client side and comes back as a signed callback.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> AppResult<GatewayOrder>;

    /// Public key id handed to the checkout widget
    fn key_id(&self) -> &str;

    /// Secret used to sign payment callbacks
    fn key_secret(&self) -> &str;
}

pub struct RazorpayGateway {
    key_id: String,
    key_secret: String,
    api_url: String,
}

impl RazorpayGateway {
    pub fn from_env() -> Self {
        let key_id = std::env::var("RAZORPAY_KEY_ID").unwrap_or_default();
        let key_secret = std::env::var("RAZORPAY_KEY_SECRET").unwrap_or_default();
        if key_id.is_empty() || key_secret.is_empty() {
            log::warn!("⚠️  RAZORPAY_KEY_ID / RAZORPAY_KEY_SECRET not set, payments will fail");
        }

        Self {
            key_id,
            key_secret,
            api_url: std::env::var("RAZORPAY_API_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> AppResult<GatewayOrder> {
        let url = format!("{}/orders", self.api_url.trim_end_matches('/'));
        log::debug!("💳 Creating gateway order: {} {} ({})", amount_minor, currency, receipt);

        let response = HTTP_CLIENT
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
                "payment_capture": 1
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GatewayError(format!(
                "Order creation failed with {}: {}",
                status, body
            )));
        }

        Ok(response.json::<GatewayOrder>().await?)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn key_secret(&self) -> &str {
        &self.key_secret
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    pub appointment_id: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderResponse {
    pub success: bool,
    pub appointment_id: String,
    pub order_id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct VerifyPaymentRequest {
    pub appointment_id: String,
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

/// Receipt id sent to the gateway, unique per appointment
pub fn receipt_for(appointment: &Appointment) -> String {
    format!("appt_{}", appointment.id_hex())
}

/// An appointment can be paid for by its patient while still `scheduled`
/// and not yet paid.
pub fn check_payable(claims: &Claims, appointment: &Appointment) -> AppResult<()> {
    if claims.role != Role::Patient || appointment.patient_id != claims.sub {
        return Err(AppError::Forbidden(
            "Only the patient of this appointment can pay for it".to_string(),
        ));
    }

    if appointment.payment.status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Appointment is already paid".to_string()));
    }

    if appointment.status != AppointmentStatus::Scheduled {
        return Err(AppError::Conflict(format!(
            "Appointment in status '{}' cannot be paid",
            appointment.status
        )));
    }

    Ok(())
}

/// Checks a payment callback against the stored order and the gateway
/// signature.
pub fn check_callback(
    appointment: &Appointment,
    request: &VerifyPaymentRequest,
    key_secret: &str,
) -> AppResult<()> {
    match appointment.payment.order_id.as_deref() {
        Some(order_id) if order_id == request.order_id => {}
        Some(_) => {
            return Err(AppError::InvalidRequest(
                "Order does not belong to this appointment".to_string(),
            ))
        }
        None => {
            return Err(AppError::InvalidRequest(
                "No payment order was created for this appointment".to_string(),
            ))
        }
    }

    if key_secret.is_empty()
        || !signature::verify_payment_signature(
            key_secret,
            &request.order_id,
            &request.payment_id,
            &request.signature,
        )
    {
        return Err(AppError::InvalidRequest(
            "Payment signature verification failed".to_string(),
        ));
    }

    Ok(())
}

/// Order id that can still be paid: one was opened and its payment has not
/// failed. Checkout may already be underway on it, so it must not be replaced.
pub fn reusable_order_id(appointment: &Appointment) -> Option<&str> {
    match appointment.payment.status {
        PaymentStatus::Pending => appointment.payment.order_id.as_deref(),
        PaymentStatus::Paid | PaymentStatus::Failed => None,
    }
}

fn order_response(
    appointment: &Appointment,
    appointment_id: &str,
    order_id: &str,
    gateway: &dyn PaymentGateway,
) -> OrderResponse {
    OrderResponse {
        success: true,
        appointment_id: appointment_id.to_string(),
        order_id: order_id.to_string(),
        amount: appointment.payment.amount_minor(),
        currency: appointment.payment.currency.clone(),
        key_id: gateway.key_id().to_string(),
    }
}

pub async fn create_order(
    db: &MongoDB,
    gateway: &dyn PaymentGateway,
    claims: &Claims,
    request: &CreateOrderRequest,
) -> AppResult<OrderResponse> {
    auth_service::require_role(claims, &[Role::Patient])?;

    let object_id = database::parse_object_id(&request.appointment_id, "appointment")?;
    let appointment = appointment_service::find_appointment(db, object_id).await?;
    check_payable(claims, &appointment)?;

    if let Some(order_id) = reusable_order_id(&appointment) {
        log::info!(
            "💳 Reusing order {} for appointment {}",
            order_id,
            request.appointment_id
        );
        return Ok(order_response(&appointment, &request.appointment_id, order_id, gateway));
    }

    let amount_minor = appointment.payment.amount_minor();
    if amount_minor <= 0 {
        return Err(AppError::InvalidRequest(
            "Appointment has no amount to pay".to_string(),
        ));
    }

    let order = gateway
        .create_order(amount_minor, &appointment.payment.currency, &receipt_for(&appointment))
        .await?;

    // Conditional on the order id that was read, so a concurrent request
    // cannot replace an order that was stored in the meantime
    let result = db
        .collection::<Appointment>(database::APPOINTMENTS)
        .update_one(
            doc! {
                "_id": object_id,
                "status": AppointmentStatus::Scheduled.as_str(),
                "payment.status": { "$ne": PaymentStatus::Paid.as_str() },
                "payment.order_id": appointment.payment.order_id.as_deref(),
            },
            doc! { "$set": {
                "payment.order_id": &order.id,
                "payment.status": PaymentStatus::Pending.as_str(),
                "updated_at": now(),
            }},
        )
        .await?;

    if result.matched_count == 0 {
        let current = appointment_service::find_appointment(db, object_id).await?;
        return match reusable_order_id(&current) {
            Some(order_id) => Ok(order_response(&current, &request.appointment_id, order_id, gateway)),
            None => Err(AppError::Conflict("Appointment is no longer payable".to_string())),
        };
    }

    log::info!(
        "💳 Order {} created for appointment {} ({} {})",
        order.id,
        request.appointment_id,
        order.amount,
        order.currency
    );

    Ok(OrderResponse {
        success: true,
        appointment_id: request.appointment_id.clone(),
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        key_id: gateway.key_id().to_string(),
    })
}

/// Verifies a payment callback and marks the appointment paid. The final
/// write only matches while the payment is not yet paid, so a payment is
/// recorded at most once however many callbacks arrive.
pub async fn verify_payment(
    db: &MongoDB,
    gateway: &dyn PaymentGateway,
    claims: &Claims,
    request: &VerifyPaymentRequest,
) -> AppResult<Appointment> {
    auth_service::require_role(claims, &[Role::Patient])?;

    let object_id = database::parse_object_id(&request.appointment_id, "appointment")?;
    let appointment = appointment_service::find_appointment(db, object_id).await?;

    if appointment.patient_id != claims.sub {
        return Err(AppError::Forbidden(
            "Only the patient of this appointment can pay for it".to_string(),
        ));
    }
    if appointment.payment.status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Payment already verified".to_string()));
    }

    let collection = db.collection::<Appointment>(database::APPOINTMENTS);

    if let Err(e) = check_callback(&appointment, request, gateway.key_secret()) {
        log::warn!(
            "❌ Payment verification failed for appointment {}: {}",
            request.appointment_id,
            e
        );
        collection
            .update_one(
                doc! { "_id": object_id, "payment.status": { "$ne": PaymentStatus::Paid.as_str() } },
                doc! { "$set": {
                    "payment.status": PaymentStatus::Failed.as_str(),
                    "updated_at": now(),
                }},
            )
            .await?;
        return Err(e);
    }

    let timestamp = now();
    let result = collection
        .update_one(
            doc! {
                "_id": object_id,
                "status": AppointmentStatus::Scheduled.as_str(),
                "payment.order_id": &request.order_id,
                "payment.status": { "$ne": PaymentStatus::Paid.as_str() },
            },
            doc! { "$set": {
                "status": AppointmentStatus::Paid.as_str(),
                "payment.status": PaymentStatus::Paid.as_str(),
                "payment.transaction_id": &request.payment_id,
                "payment.paid_at": timestamp,
                "updated_at": timestamp,
            }},
        )
        .await?;

    if result.modified_count == 0 {
        return Err(AppError::Conflict(
            "Payment already verified or appointment no longer payable".to_string(),
        ));
    }

    log::info!(
        "✅ Payment {} verified for appointment {}",
        request.payment_id,
        request.appointment_id
    );

    appointment_service::find_appointment(db, object_id).await
}
