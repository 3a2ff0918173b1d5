use crate::{
    database::{self, MongoDB},
    middleware::auth::Claims,
    models::{MedicalReport, ReportStatus, Role, UploadReportRequest},
    services::auth_service::{self, now},
    utils::{AppError, AppResult},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};

pub fn can_view(claims: &Claims, report: &MedicalReport) -> bool {
    match claims.role {
        Role::Admin => true,
        Role::Patient => report.patient_id == claims.sub,
        Role::Doctor => {
            report.doctor_id.as_deref() == Some(claims.sub.as_str())
                || report.uploaded_by == claims.sub
        }
    }
}

pub fn list_filter(claims: &Claims) -> Document {
    match claims.role {
        Role::Admin => Document::new(),
        Role::Patient => doc! { "patient_id": &claims.sub },
        Role::Doctor => doc! { "$or": [
            { "doctor_id": &claims.sub },
            { "uploaded_by": &claims.sub },
        ]},
    }
}

/// File references must point at the storage service over http(s)
pub fn validate_file_url(file_url: &str) -> AppResult<()> {
    let file_url = file_url.trim();
    if file_url.contains(char::is_whitespace) {
        return Err(AppError::InvalidRequest("file_url is malformed".to_string()));
    }

    let parsed = url::Url::parse(file_url)
        .map_err(|e| AppError::InvalidRequest(format!("file_url is malformed: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InvalidRequest("file_url must be an http(s) URL".to_string()));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidRequest("file_url has no host".to_string()));
    }
    Ok(())
}

/// Resolves who the report belongs to: patients upload for themselves,
/// doctors must name the patient and are assigned to the report.
pub fn resolve_owners(
    claims: &Claims,
    request: &UploadReportRequest,
) -> AppResult<(String, Option<String>)> {
    match claims.role {
        Role::Patient => {
            if matches!(&request.patient_id, Some(p) if *p != claims.sub) {
                return Err(AppError::Forbidden(
                    "Patients can only upload their own reports".to_string(),
                ));
            }
            Ok((claims.sub.clone(), request.doctor_id.clone()))
        }
        Role::Doctor => {
            let patient_id = request.patient_id.clone().ok_or_else(|| {
                AppError::InvalidRequest("patient_id is required".to_string())
            })?;
            Ok((patient_id, Some(claims.sub.clone())))
        }
        Role::Admin => Err(AppError::Forbidden(
            "Admins cannot upload medical reports".to_string(),
        )),
    }
}

pub async fn upload_report(
    db: &MongoDB,
    claims: &Claims,
    request: &UploadReportRequest,
) -> AppResult<MedicalReport> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidRequest("title is required".to_string()));
    }
    validate_file_url(&request.file_url)?;
    let (patient_id, doctor_id) = resolve_owners(claims, request)?;

    let patient = auth_service::find_user(db, &patient_id)
        .await?
        .filter(|u| u.role == Role::Patient);
    if patient.is_none() {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }

    if let Some(doctor_id) = &doctor_id {
        let doctor = auth_service::find_user(db, doctor_id)
            .await?
            .filter(|u| u.role == Role::Doctor);
        if doctor.is_none() {
            return Err(AppError::NotFound("Doctor not found".to_string()));
        }
    }

    let mut report = MedicalReport {
        id: None,
        title: title.to_string(),
        file_url: request.file_url.trim().to_string(),
        file_type: request.file_type.clone(),
        uploaded_by: claims.sub.clone(),
        patient_id,
        doctor_id,
        appointment_id: request.appointment_id.clone(),
        status: ReportStatus::Pending,
        doctor_notes: None,
        created_at: now(),
        reviewed_at: None,
    };

    let result = db
        .collection::<MedicalReport>(database::MEDICAL_REPORTS)
        .insert_one(&report)
        .await?;
    report.id = result.inserted_id.as_object_id();

    log::info!(
        "📄 Report {} uploaded by {} for patient {}",
        report.id.map(|id| id.to_hex()).unwrap_or_default(),
        report.uploaded_by,
        report.patient_id
    );

    Ok(report)
}

pub async fn list_reports(db: &MongoDB, claims: &Claims) -> AppResult<Vec<MedicalReport>> {
    let reports = db
        .collection::<MedicalReport>(database::MEDICAL_REPORTS)
        .find(list_filter(claims))
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(reports)
}

pub async fn get_report(db: &MongoDB, claims: &Claims, id: &str) -> AppResult<MedicalReport> {
    let object_id = database::parse_object_id(id, "report")?;
    let report = db
        .collection::<MedicalReport>(database::MEDICAL_REPORTS)
        .find_one(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

    if !can_view(claims, &report) {
        return Err(AppError::Forbidden("You do not have access to this report".to_string()));
    }

    Ok(report)
}

pub async fn review_report(
    db: &MongoDB,
    claims: &Claims,
    id: &str,
    notes: &str,
) -> AppResult<MedicalReport> {
    auth_service::require_role(claims, &[Role::Doctor])?;

    let report = get_report(db, claims, id).await?;
    if report.doctor_id.as_deref() != Some(claims.sub.as_str()) {
        return Err(AppError::Forbidden(
            "Only the assigned doctor can review this report".to_string(),
        ));
    }

    let notes = notes.trim();
    if notes.is_empty() {
        return Err(AppError::InvalidRequest("Review notes are required".to_string()));
    }

    let object_id = database::parse_object_id(id, "report")?;
    db.collection::<MedicalReport>(database::MEDICAL_REPORTS)
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": {
                "status": ReportStatus::Reviewed.as_str(),
                "doctor_notes": notes,
                "reviewed_at": now(),
            }},
        )
        .await?;

    log::info!("🩺 Report {} reviewed by {}", id, claims.sub);

    get_report(db, claims, id).await
}
