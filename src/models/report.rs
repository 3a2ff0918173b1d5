use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
        }
    }
}

/// Medical report document in the "medical_reports" collection. The file
/// itself lives in external storage; only its URL is kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalReport {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub file_url: String,
    #[serde(default)]
    pub file_type: Option<String>,
    pub uploaded_by: String,
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<String>,
    pub status: ReportStatus,
    #[serde(default)]
    pub doctor_notes: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub reviewed_at: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadReportRequest {
    pub title: String,
    pub file_url: String,
    pub file_type: Option<String>,
    /// Required when a doctor uploads on behalf of a patient
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub appointment_id: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ReviewReportRequest {
    pub notes: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReportResponse {
    pub id: String,
    pub title: String,
    pub file_url: String,
    pub file_type: Option<String>,
    pub uploaded_by: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub appointment_id: Option<String>,
    pub status: ReportStatus,
    pub doctor_notes: Option<String>,
    pub created_at: i64,
    pub reviewed_at: Option<i64>,
}

impl From<MedicalReport> for ReportResponse {
    fn from(report: MedicalReport) -> Self {
        ReportResponse {
            id: report.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: report.title,
            file_url: report.file_url,
            file_type: report.file_type,
            uploaded_by: report.uploaded_by,
            patient_id: report.patient_id,
            doctor_id: report.doctor_id,
            appointment_id: report.appointment_id,
            status: report.status,
            doctor_notes: report.doctor_notes,
            created_at: report.created_at,
            reviewed_at: report.reviewed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_value_matches_serde() {
        for status in [ReportStatus::Pending, ReportStatus::Reviewed] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
