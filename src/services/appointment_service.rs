use crate::{
    database::{self, MongoDB},
    middleware::auth::Claims,
    models::{
        slot_key, Appointment, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest,
        Payment, Role, User,
    },
    services::auth_service::{self, now},
    utils::{AppError, AppResult},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};

pub const DEFAULT_CURRENCY: &str = "INR";

pub fn default_consultation_fee() -> f64 {
    std::env::var("DEFAULT_CONSULTATION_FEE")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|fee| *fee >= 0.0)
        .unwrap_or(500.0)
}

pub fn payment_currency() -> String {
    std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY.to_string())
}

/// Parses a `YYYY-MM-DD` date and `HH:MM` time and requires the slot to be
/// after `now`.
pub fn parse_slot(date: &str, time: &str, now: NaiveDateTime) -> AppResult<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidRequest("date must be YYYY-MM-DD".to_string()))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| AppError::InvalidRequest("time must be HH:MM".to_string()))?;

    let slot = date.and_time(time);
    if slot <= now {
        return Err(AppError::InvalidRequest(
            "Appointment must be scheduled in the future".to_string(),
        ));
    }
    Ok(slot)
}

/// Participants and admins may see an appointment
pub fn can_view(claims: &Claims, appointment: &Appointment) -> bool {
    claims.has_role(Role::Admin) || appointment.is_participant(&claims.sub)
}

/// Decides whether `claims` may move `appointment` to `target`.
///
/// `paid` is only ever set by payment verification. Patients may cancel
/// their own appointments, doctors drive the rest of the flow for their
/// appointments, and admins may take any edge of the status graph.
pub fn authorize_transition(
    claims: &Claims,
    appointment: &Appointment,
    target: AppointmentStatus,
) -> AppResult<()> {
    if !can_view(claims, appointment) {
        return Err(AppError::Forbidden(
            "You do not have access to this appointment".to_string(),
        ));
    }

    if appointment.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Appointment is already {}",
            appointment.status
        )));
    }

    if target == AppointmentStatus::Paid {
        return Err(AppError::InvalidRequest(
            "Appointments are marked paid only through payment verification".to_string(),
        ));
    }

    if !appointment.status.can_transition_to(target) {
        return Err(AppError::Conflict(format!(
            "Cannot change status from '{}' to '{}'",
            appointment.status, target
        )));
    }

    let allowed = match claims.role {
        Role::Admin => true,
        Role::Doctor => appointment.doctor_id == claims.sub,
        Role::Patient => {
            appointment.patient_id == claims.sub && target == AppointmentStatus::Cancelled
        }
    };

    if !allowed {
        return Err(AppError::Forbidden(format!(
            "Role '{}' cannot set status '{}'",
            claims.role, target
        )));
    }

    Ok(())
}

/// Query filter for listing the caller's appointments
pub fn list_filter(claims: &Claims, query: &AppointmentQuery) -> Document {
    let mut filter = match claims.role {
        Role::Patient => doc! { "patient_id": &claims.sub },
        Role::Doctor => doc! { "doctor_id": &claims.sub },
        Role::Admin => Document::new(),
    };

    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }

    filter
}

pub fn list_sort(query: &AppointmentQuery) -> Document {
    let direction = match query.order.as_deref() {
        Some("desc") => -1,
        _ => 1,
    };
    doc! { "date": direction, "time": direction }
}

/// Update document for a status change. Leaving the slot-holding states
/// releases the slot so it can be booked again.
pub fn status_update_doc(target: AppointmentStatus, set: Document) -> Document {
    let mut update = doc! { "$set": set };
    if !target.holds_slot() {
        update.insert("$unset", doc! { "slot_key": "" });
    }
    update
}

async fn find_bookable_doctor(db: &MongoDB, doctor_id: &str) -> AppResult<User> {
    let doctor = auth_service::find_user(db, doctor_id)
        .await?
        .filter(|u| u.role == Role::Doctor)
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    if !doctor.is_active || !doctor.is_verified {
        return Err(AppError::InvalidRequest(
            "Doctor is not available for booking".to_string(),
        ));
    }

    Ok(doctor)
}

pub async fn create_appointment(
    db: &MongoDB,
    claims: &Claims,
    request: &CreateAppointmentRequest,
) -> AppResult<Appointment> {
    auth_service::require_role(claims, &[Role::Patient])?;

    let slot = parse_slot(&request.date, &request.time, chrono::Utc::now().naive_utc())?;
    let date = slot.format("%Y-%m-%d").to_string();
    let time = slot.format("%H:%M").to_string();

    let doctor = find_bookable_doctor(db, &request.doctor_id).await?;

    let fee = doctor.consultation_fee.unwrap_or_else(default_consultation_fee);
    let key = slot_key(&doctor.user_id, &date, &time);
    let timestamp = now();

    let mut appointment = Appointment {
        id: None,
        patient_id: claims.sub.clone(),
        doctor_id: doctor.user_id,
        date,
        time,
        reason: request.reason.clone(),
        notes: request.notes.clone(),
        status: AppointmentStatus::Scheduled,
        cancellation_reason: None,
        payment: Payment::pending(fee, &payment_currency()),
        slot_key: Some(key),
        created_at: timestamp,
        updated_at: timestamp,
    };

    // The unique index on slot_key rejects a second live booking of the slot
    let result = match db
        .collection::<Appointment>(database::APPOINTMENTS)
        .insert_one(&appointment)
        .await
    {
        Ok(result) => result,
        Err(e) if database::is_duplicate_key(&e) => {
            return Err(AppError::Conflict("This time slot is already booked".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    appointment.id = result.inserted_id.as_object_id();

    log::info!(
        "📅 Appointment {} booked: patient {} with doctor {} at {} {}",
        appointment.id_hex(),
        appointment.patient_id,
        appointment.doctor_id,
        appointment.date,
        appointment.time
    );

    Ok(appointment)
}

pub async fn list_appointments(
    db: &MongoDB,
    claims: &Claims,
    query: &AppointmentQuery,
) -> AppResult<Vec<Appointment>> {
    let appointments = db
        .collection::<Appointment>(database::APPOINTMENTS)
        .find(list_filter(claims, query))
        .sort(list_sort(query))
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(appointments)
}

pub async fn find_appointment(db: &MongoDB, id: ObjectId) -> AppResult<Appointment> {
    db.collection::<Appointment>(database::APPOINTMENTS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))
}

pub async fn get_appointment(db: &MongoDB, claims: &Claims, id: &str) -> AppResult<Appointment> {
    let object_id = database::parse_object_id(id, "appointment")?;
    let appointment = find_appointment(db, object_id).await?;

    if !can_view(claims, &appointment) {
        return Err(AppError::Forbidden(
            "You do not have access to this appointment".to_string(),
        ));
    }

    Ok(appointment)
}

/// Moves an appointment along the status graph. The write is conditional on
/// the status that was read, so of two racing updates only one lands.
pub async fn update_status(
    db: &MongoDB,
    claims: &Claims,
    id: &str,
    target: AppointmentStatus,
    notes: Option<&str>,
    cancellation_reason: Option<&str>,
) -> AppResult<Appointment> {
    let object_id = database::parse_object_id(id, "appointment")?;
    let appointment = find_appointment(db, object_id).await?;

    authorize_transition(claims, &appointment, target)?;

    let mut set = doc! {
        "status": target.as_str(),
        "updated_at": now(),
    };
    if let Some(notes) = notes {
        set.insert("notes", notes);
    }
    if target == AppointmentStatus::Cancelled {
        set.insert(
            "cancellation_reason",
            cancellation_reason.unwrap_or("Cancelled by user"),
        );
    }

    let result = db
        .collection::<Appointment>(database::APPOINTMENTS)
        .update_one(
            doc! { "_id": object_id, "status": appointment.status.as_str() },
            status_update_doc(target, set),
        )
        .await?;

    if result.modified_count == 0 {
        return Err(AppError::Conflict(
            "Appointment status changed concurrently, reload and retry".to_string(),
        ));
    }

    log::info!(
        "🔄 Appointment {}: {} -> {} by {} {}",
        id,
        appointment.status,
        target,
        claims.role,
        claims.sub
    );

    find_appointment(db, object_id).await
}

pub async fn cancel_appointment(
    db: &MongoDB,
    claims: &Claims,
    id: &str,
    reason: Option<&str>,
) -> AppResult<Appointment> {
    update_status(db, claims, id, AppointmentStatus::Cancelled, None, reason).await
}
