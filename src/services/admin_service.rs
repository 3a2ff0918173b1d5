use crate::{
    database::{self, MongoDB},
    middleware::auth::Claims,
    models::{Appointment, AppointmentStatus, Role, User, UserInfo},
    services::auth_service::now,
    utils::{AppError, AppResult},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PlatformStats {
    pub users_by_role: BTreeMap<String, u64>,
    pub appointments_by_status: BTreeMap<String, u64>,
    pub pending_doctor_verifications: u64,
}

pub async fn list_users(db: &MongoDB, role: Option<Role>) -> AppResult<Vec<UserInfo>> {
    let filter = match role {
        Some(role) => doc! { "role": role.as_str() },
        None => Document::new(),
    };

    let users = db
        .collection::<User>(database::USERS)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(users.into_iter().map(UserInfo::from).collect())
}

pub async fn verify_doctor(db: &MongoDB, user_id: &str) -> AppResult<()> {
    let result = db
        .collection::<User>(database::USERS)
        .update_one(
            doc! { "user_id": user_id, "role": Role::Doctor.as_str() },
            doc! { "$set": { "is_verified": true, "updated_at": now() } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Doctor not found".to_string()));
    }

    log::info!("🩺 Doctor {} verified", user_id);
    Ok(())
}

pub async fn set_active(db: &MongoDB, claims: &Claims, user_id: &str, active: bool) -> AppResult<()> {
    if !active && claims.sub == user_id {
        return Err(AppError::InvalidRequest(
            "Admins cannot deactivate their own account".to_string(),
        ));
    }

    let result = db
        .collection::<User>(database::USERS)
        .update_one(
            doc! { "user_id": user_id },
            doc! { "$set": { "is_active": active, "updated_at": now() } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    log::info!("👤 User {} is_active={} (by {})", user_id, active, claims.sub);
    Ok(())
}

pub async fn stats(db: &MongoDB) -> AppResult<PlatformStats> {
    let users = db.collection::<User>(database::USERS);
    let appointments = db.collection::<Appointment>(database::APPOINTMENTS);

    let mut users_by_role = BTreeMap::new();
    for role in [Role::Patient, Role::Doctor, Role::Admin] {
        let count = users.count_documents(doc! { "role": role.as_str() }).await?;
        users_by_role.insert(role.to_string(), count);
    }

    let mut appointments_by_status = BTreeMap::new();
    for status in AppointmentStatus::ALL {
        let count = appointments
            .count_documents(doc! { "status": status.as_str() })
            .await?;
        appointments_by_status.insert(status.to_string(), count);
    }

    let pending_doctor_verifications = users
        .count_documents(doc! { "role": Role::Doctor.as_str(), "is_verified": false })
        .await?;

    Ok(PlatformStats {
        users_by_role,
        appointments_by_status,
        pending_doctor_verifications,
    })
}
