use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Invalid role: {}. Supported: patient, doctor, admin", other)),
        }
    }
}

/// User document in the "users" collection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String, // PRIMARY IDENTIFIER
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,

    // Patient profile
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,

    // Doctor profile
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub consultation_fee: Option<f64>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_verified: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

/// Profile returned to the account owner and admins. Never carries the
/// password hash.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub is_verified: bool,
    pub created_at: i64,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            id: user.user_id,
            email: user.email,
            name: user.name,
            role: user.role,
            phone: user.phone,
            is_active: user.is_active,
            blood_group: user.blood_group,
            date_of_birth: user.date_of_birth,
            gender: user.gender,
            address: user.address,
            emergency_contact: user.emergency_contact,
            allergies: user.allergies,
            specialization: user.specialization,
            license_number: user.license_number,
            experience_years: user.experience_years,
            consultation_fee: user.consultation_fee,
            bio: user.bio,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Public directory entry for a doctor
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
pub struct DoctorSummary {
    pub id: String,
    pub name: String,
    pub specialization: Option<String>,
    pub experience_years: Option<u32>,
    pub consultation_fee: f64,
    pub bio: Option<String>,
}

impl DoctorSummary {
    pub fn from_user(user: User, default_fee: f64) -> Self {
        DoctorSummary {
            id: user.user_id,
            name: user.name,
            specialization: user.specialization,
            experience_years: user.experience_years,
            consultation_fee: user.consultation_fee.unwrap_or(default_fee),
            bio: user.bio,
        }
    }
}

/// Fields a user may change on their own profile. Role specific fields are
/// ignored for the other role.
#[derive(Debug, Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub blood_group: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<Vec<String>>,
    pub specialization: Option<String>,
    pub experience_years: Option<u32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_serde() {
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert!("nurse".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"patient\"");
    }

    #[test]
    fn test_user_info_hides_password() {
        let user = User {
            id: None,
            user_id: "u1".into(),
            email: "a@b.com".into(),
            password: "$2b$12$hash".into(),
            name: "Ann".into(),
            role: Role::Patient,
            phone: None,
            is_active: true,
            blood_group: Some("O+".into()),
            date_of_birth: None,
            gender: None,
            address: None,
            emergency_contact: None,
            allergies: vec![],
            specialization: None,
            license_number: None,
            experience_years: None,
            consultation_fee: None,
            bio: None,
            is_verified: false,
            created_at: 0,
            updated_at: 0,
        };

        let json = serde_json::to_value(UserInfo::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["blood_group"], "O+");
        assert!(json.get("specialization").is_none());
    }
}
