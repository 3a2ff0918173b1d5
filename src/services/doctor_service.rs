use crate::{
    database::{self, MongoDB},
    models::{DoctorSummary, Role, User},
    services::appointment_service::default_consultation_fee,
    utils::{AppError, AppResult},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};

fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Only active, verified doctors are listed publicly
pub fn directory_filter(specialization: Option<&str>) -> Document {
    let mut filter = doc! {
        "role": Role::Doctor.as_str(),
        "is_active": true,
        "is_verified": true,
    };

    if let Some(wanted) = specialization.map(str::trim).filter(|s| !s.is_empty()) {
        filter.insert(
            "specialization",
            doc! { "$regex": format!("^{}$", escape_regex(wanted)), "$options": "i" },
        );
    }

    filter
}

pub async fn list_doctors(db: &MongoDB, specialization: Option<&str>) -> AppResult<Vec<DoctorSummary>> {
    let fee = default_consultation_fee();
    let doctors = db
        .collection::<User>(database::USERS)
        .find(directory_filter(specialization))
        .sort(doc! { "name": 1 })
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(doctors
        .into_iter()
        .map(|u| DoctorSummary::from_user(u, fee))
        .collect())
}

pub async fn get_doctor(db: &MongoDB, user_id: &str) -> AppResult<DoctorSummary> {
    let mut filter = directory_filter(None);
    filter.insert("user_id", user_id);

    db.collection::<User>(database::USERS)
        .find_one(filter)
        .await?
        .map(|u| DoctorSummary::from_user(u, default_consultation_fee()))
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_filter() {
        let filter = directory_filter(None);
        assert_eq!(filter.get_str("role").unwrap(), "doctor");
        assert!(filter.get_bool("is_verified").unwrap());
        assert!(filter.get("specialization").is_none());

        let filter = directory_filter(Some("  "));
        assert!(filter.get("specialization").is_none());

        let filter = directory_filter(Some("ENT (Ear.Nose)"));
        let regex = filter.get_document("specialization").unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), "^ENT \\(Ear\\.Nose\\)$");
        assert_eq!(regex.get_str("$options").unwrap(), "i");
    }
}
