use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Appointment status flow:
/// scheduled → paid → confirmed → in-progress → completed, with cancelled
/// reachable from any non-terminal state except in-progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Paid,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Paid,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Paid => "paid",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn next_statuses(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[Paid, Cancelled],
            Paid => &[Confirmed, Cancelled],
            Confirmed => &[InProgress, Completed, Cancelled],
            InProgress => &[Completed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.next_statuses().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_statuses().is_empty()
    }

    /// Statuses that keep the doctor's slot occupied
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid appointment status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Payment sub-document embedded in each appointment
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Payment {
    pub status: PaymentStatus,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Major currency units (e.g. rupees)
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub paid_at: Option<i64>,
}

impl Payment {
    pub fn pending(amount: f64, currency: &str) -> Self {
        Payment {
            status: PaymentStatus::Pending,
            order_id: None,
            transaction_id: None,
            amount,
            currency: currency.to_string(),
            paid_at: None,
        }
    }

    /// Amount in the smallest currency unit, as the gateway expects it
    pub fn amount_minor(&self) -> i64 {
        (self.amount * 100.0).round() as i64
    }
}

/// Appointment document in the "appointments" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub patient_id: String,
    pub doctor_id: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM, 24h
    pub time: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub payment: Payment,
    /// `doctor_id|date|time` while the appointment holds its slot; unset once
    /// cancelled. Backed by a unique sparse index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_key: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn slot_key(doctor_id: &str, date: &str, time: &str) -> String {
    format!("{}|{}|{}", doctor_id, date, time)
}

impl Appointment {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateAppointmentRequest {
    pub doctor_id: String,
    pub date: String,
    pub time: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    /// "asc" (default, upcoming first) or "desc"
    pub order: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AppointmentResponse {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub date: String,
    pub time: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub payment: Payment,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        AppointmentResponse {
            id: appointment.id_hex(),
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            date: appointment.date,
            time: appointment.time,
            reason: appointment.reason,
            notes: appointment.notes,
            status: appointment.status,
            cancellation_reason: appointment.cancellation_reason,
            payment: appointment.payment,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_happy_path_is_allowed() {
        assert!(Scheduled.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!Scheduled.can_transition_to(Confirmed));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Paid));
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!InProgress.can_transition_to(Cancelled));
    }

    #[test]
    fn test_terminal_states() {
        for status in AppointmentStatus::ALL {
            let terminal = matches!(status, Completed | Cancelled);
            assert_eq!(status.is_terminal(), terminal, "{}", status);
        }
        for next in AppointmentStatus::ALL {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in AppointmentStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&InProgress).unwrap(), "\"in-progress\"");
        assert_eq!("in-progress".parse::<AppointmentStatus>().unwrap(), InProgress);
        assert!("done".parse::<AppointmentStatus>().is_err());
        for status in AppointmentStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_amount_minor() {
        assert_eq!(Payment::pending(500.0, "INR").amount_minor(), 50000);
        assert_eq!(Payment::pending(499.99, "INR").amount_minor(), 49999);
    }
}
