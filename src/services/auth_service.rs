use crate::{
    database::{self, MongoDB},
    models::{Role, UpdateProfileRequest, User, UserInfo},
    utils::{AppError, AppResult},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

impl Claims {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Default, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    /// "patient" (default) or "doctor"
    pub role: Option<String>,
    pub phone: Option<String>,
    // Patient
    pub blood_group: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    // Doctor
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<u32>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserInfo,
}

fn get_jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "default-secret-change-me".to_string())
}

fn get_jwt_issuer() -> String {
    std::env::var("JWT_ISSUER").unwrap_or_else(|_| "medimate".to_string())
}

fn get_jwt_audience() -> String {
    std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "medimate-api".to_string())
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Generate JWT token
pub fn generate_jwt(user_id: &str, email: &str, role: Role) -> AppResult<String> {
    let iat = Utc::now().timestamp() as usize;
    let exp = (Utc::now() + Duration::hours(24)).timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        iat,
        exp,
        jti: Uuid::new_v4().to_string(),
        aud: get_jwt_audience(),
        iss: get_jwt_issuer(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(get_jwt_secret().as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(token: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[get_jwt_audience()]);
    validation.set_issuer(&[get_jwt_issuer()]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(get_jwt_secret().as_ref()),
        &validation,
    )?;

    Ok(data.claims)
}

/// Fails with 403 unless the caller holds one of `roles`
pub fn require_role(claims: &Claims, roles: &[Role]) -> AppResult<()> {
    if roles.contains(&claims.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "This action is not available to role '{}'",
            claims.role
        )))
    }
}

/// Checks a registration request before touching the database.
/// Returns the normalized email and the requested role.
pub fn validate_registration(request: &RegisterRequest) -> AppResult<(String, Role)> {
    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Email is required".to_string()))?;

    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::InvalidRequest("Email is invalid".to_string()));
    }

    let password = request
        .password
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Password is required".to_string()))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if request.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(AppError::InvalidRequest("Name is required".to_string()));
    }

    let role = match request.role.as_deref() {
        None => Role::Patient,
        Some(r) => r.parse::<Role>().map_err(AppError::InvalidRequest)?,
    };

    match role {
        Role::Admin => {
            return Err(AppError::Forbidden(
                "Admin accounts cannot be self-registered".to_string(),
            ))
        }
        Role::Doctor => {
            if request.specialization.as_deref().unwrap_or("").trim().is_empty() {
                return Err(AppError::InvalidRequest(
                    "Specialization is required for doctors".to_string(),
                ));
            }
            if request.license_number.as_deref().unwrap_or("").trim().is_empty() {
                return Err(AppError::InvalidRequest(
                    "License number is required for doctors".to_string(),
                ));
            }
            if matches!(request.consultation_fee, Some(fee) if fee < 0.0) {
                return Err(AppError::InvalidRequest(
                    "Consultation fee cannot be negative".to_string(),
                ));
            }
        }
        Role::Patient => {}
    }

    Ok((email, role))
}

// User registration
pub async fn register(db: &MongoDB, request: &RegisterRequest) -> AppResult<AuthResponse> {
    let (email, role) = validate_registration(request)?;
    let collection = db.collection::<User>(database::USERS);

    if collection.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::Conflict("User with this email already exists".to_string()));
    }

    let password = request.password.as_deref().unwrap_or_default();
    let password_hash = hash(password, DEFAULT_COST)?;
    let timestamp = now();
    let is_doctor = role == Role::Doctor;

    let user = User {
        id: None,
        user_id: Uuid::new_v4().to_string(),
        email: email.clone(),
        password: password_hash,
        name: request.name.as_deref().unwrap_or_default().trim().to_string(),
        role,
        phone: request.phone.clone(),
        is_active: true,
        blood_group: request.blood_group.clone().filter(|_| !is_doctor),
        date_of_birth: request.date_of_birth.clone().filter(|_| !is_doctor),
        gender: request.gender.clone(),
        address: None,
        emergency_contact: None,
        allergies: vec![],
        specialization: request.specialization.clone().filter(|_| is_doctor),
        license_number: request.license_number.clone().filter(|_| is_doctor),
        experience_years: request.experience_years.filter(|_| is_doctor),
        consultation_fee: request.consultation_fee.filter(|_| is_doctor),
        bio: None,
        // Doctors wait for admin verification before they are bookable
        is_verified: false,
        created_at: timestamp,
        updated_at: timestamp,
    };

    if let Err(e) = collection.insert_one(&user).await {
        if database::is_duplicate_key(&e) {
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }
        return Err(e.into());
    }

    log::info!("👤 Registered {} {}", user.role, user.user_id);

    let token = generate_jwt(&user.user_id, &user.email, user.role)?;
    Ok(AuthResponse {
        success: true,
        token,
        user: UserInfo::from(user),
    })
}

// User login
pub async fn login(db: &MongoDB, request: &LoginRequest) -> AppResult<AuthResponse> {
    let collection = db.collection::<User>(database::USERS);
    let email = normalize_email(&request.email);

    let user = collection
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = verify(&request.password, &user.password)?;
    if !valid {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    if !user.is_active {
        return Err(AppError::Unauthorized("Account is inactive".to_string()));
    }

    let token = generate_jwt(&user.user_id, &user.email, user.role)?;

    Ok(AuthResponse {
        success: true,
        token,
        user: UserInfo::from(user),
    })
}

pub async fn find_user(db: &MongoDB, user_id: &str) -> AppResult<Option<User>> {
    let user = db
        .collection::<User>(database::USERS)
        .find_one(doc! { "user_id": user_id })
        .await?;
    Ok(user)
}

/// Tokens stay valid for 24h, so each authenticated call re-checks that the
/// account still exists and is active.
pub fn check_account(user: Option<&User>) -> AppResult<()> {
    match user {
        Some(user) if user.is_active => Ok(()),
        Some(_) => Err(AppError::Unauthorized("Account is inactive".to_string())),
        None => Err(AppError::Unauthorized("Account no longer exists".to_string())),
    }
}

pub async fn ensure_active(db: &MongoDB, user_id: &str) -> AppResult<()> {
    let user = find_user(db, user_id).await?;
    check_account(user.as_ref())
}

pub async fn get_current_user(db: &MongoDB, user_id: &str) -> AppResult<UserInfo> {
    find_user(db, user_id)
        .await?
        .map(UserInfo::from)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Builds the `$set` document for a profile update, keeping only the
/// fields that apply to `role`.
pub fn profile_update_doc(role: Role, request: &UpdateProfileRequest) -> AppResult<Document> {
    let mut set = Document::new();

    if let Some(name) = &request.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest("Name cannot be empty".to_string()));
        }
        set.insert("name", name);
    }
    if let Some(phone) = &request.phone {
        set.insert("phone", phone.trim());
    }
    if let Some(gender) = &request.gender {
        set.insert("gender", gender.as_str());
    }

    match role {
        Role::Patient => {
            if let Some(v) = &request.blood_group {
                set.insert("blood_group", v.as_str());
            }
            if let Some(v) = &request.date_of_birth {
                chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                    AppError::InvalidRequest("date_of_birth must be YYYY-MM-DD".to_string())
                })?;
                set.insert("date_of_birth", v.as_str());
            }
            if let Some(v) = &request.address {
                set.insert("address", v.as_str());
            }
            if let Some(v) = &request.emergency_contact {
                set.insert("emergency_contact", v.as_str());
            }
            if let Some(v) = &request.allergies {
                set.insert("allergies", v.clone());
            }
        }
        Role::Doctor => {
            if let Some(v) = &request.specialization {
                set.insert("specialization", v.as_str());
            }
            if let Some(v) = request.experience_years {
                set.insert("experience_years", v as i64);
            }
            if let Some(fee) = request.consultation_fee {
                if fee < 0.0 {
                    return Err(AppError::InvalidRequest(
                        "Consultation fee cannot be negative".to_string(),
                    ));
                }
                set.insert("consultation_fee", fee);
            }
            if let Some(v) = &request.bio {
                set.insert("bio", v.as_str());
            }
        }
        Role::Admin => {}
    }

    if set.is_empty() {
        return Err(AppError::InvalidRequest("No updatable fields provided".to_string()));
    }

    set.insert("updated_at", now());
    Ok(set)
}

pub async fn update_profile(
    db: &MongoDB,
    claims: &Claims,
    request: &UpdateProfileRequest,
) -> AppResult<UserInfo> {
    let set = profile_update_doc(claims.role, request)?;

    let result = db
        .collection::<User>(database::USERS)
        .update_one(doc! { "user_id": &claims.sub }, doc! { "$set": set })
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    get_current_user(db, &claims.sub).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn claims_for(user_id: &str, role: Role) -> Claims {
        Claims {
            sub: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            role,
            iat: 0,
            exp: usize::MAX,
            jti: "test".to_string(),
            aud: get_jwt_audience(),
            iss: get_jwt_issuer(),
        }
    }

    pub(crate) fn user_for(user_id: &str, role: Role) -> User {
        User {
            id: None,
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            password: "$2b$04$unused".to_string(),
            name: user_id.to_string(),
            role,
            phone: None,
            is_active: true,
            blood_group: None,
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
            is_verified: role == Role::Doctor,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn patient_request() -> RegisterRequest {
        RegisterRequest {
            email: Some("  Jane@Example.COM ".to_string()),
            password: Some("correct-horse".to_string()),
            name: Some("Jane".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let token = generate_jwt("u-42", "a@b.com", Role::Patient).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, "u-42");
        assert_eq!(claims.role, Role::Patient);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = generate_jwt("u-42", "a@b.com", Role::Patient).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[2] = parts[2].chars().rev().collect();
        let tampered = parts.join(".");

        assert!(matches!(verify_token(&tampered), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims {
            exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
            ..claims_for("u-1", Role::Patient)
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(get_jwt_secret().as_ref()),
        )
        .unwrap();

        assert!(verify_token(&token).is_err());
    }

    #[test]
    fn test_check_account() {
        let mut user = user_for("u-1", Role::Patient);
        assert!(check_account(Some(&user)).is_ok());

        user.is_active = false;
        assert!(matches!(check_account(Some(&user)), Err(AppError::Unauthorized(_))));
        assert!(matches!(check_account(None), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_require_role() {
        let doctor = claims_for("d", Role::Doctor);
        assert!(require_role(&doctor, &[Role::Doctor, Role::Admin]).is_ok());
        assert!(matches!(
            require_role(&doctor, &[Role::Patient]),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_validate_registration_defaults_to_patient() {
        let (email, role) = validate_registration(&patient_request()).unwrap();
        assert_eq!(email, "jane@example.com");
        assert_eq!(role, Role::Patient);
    }

    #[test]
    fn test_validate_registration_rejects_bad_input() {
        let short = RegisterRequest {
            password: Some("short".to_string()),
            ..patient_request()
        };
        assert!(matches!(validate_registration(&short), Err(AppError::InvalidRequest(_))));

        let no_email = RegisterRequest { email: None, ..patient_request() };
        assert!(validate_registration(&no_email).is_err());

        let admin = RegisterRequest {
            role: Some("admin".to_string()),
            ..patient_request()
        };
        assert!(matches!(validate_registration(&admin), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_doctor_registration_requires_credentials() {
        let doctor = RegisterRequest {
            role: Some("doctor".to_string()),
            ..patient_request()
        };
        assert!(validate_registration(&doctor).is_err());

        let doctor = RegisterRequest {
            role: Some("doctor".to_string()),
            specialization: Some("Cardiology".to_string()),
            license_number: Some("MCI-1234".to_string()),
            ..patient_request()
        };
        let (_, role) = validate_registration(&doctor).unwrap();
        assert_eq!(role, Role::Doctor);
    }

    #[test]
    fn test_profile_update_respects_role() {
        let request = UpdateProfileRequest {
            blood_group: Some("A+".to_string()),
            consultation_fee: Some(800.0),
            ..Default::default()
        };

        let patient = profile_update_doc(Role::Patient, &request).unwrap();
        assert_eq!(patient.get_str("blood_group").unwrap(), "A+");
        assert!(patient.get("consultation_fee").is_none());

        let doctor = profile_update_doc(Role::Doctor, &request).unwrap();
        assert!(doctor.get("blood_group").is_none());
        assert_eq!(doctor.get_f64("consultation_fee").unwrap(), 800.0);
    }

    #[test]
    fn test_profile_update_validation() {
        assert!(profile_update_doc(Role::Patient, &UpdateProfileRequest::default()).is_err());

        let bad_date = UpdateProfileRequest {
            date_of_birth: Some("31/12/1990".to_string()),
            ..Default::default()
        };
        assert!(profile_update_doc(Role::Patient, &bad_date).is_err());

        let negative = UpdateProfileRequest {
            consultation_fee: Some(-1.0),
            ..Default::default()
        };
        assert!(profile_update_doc(Role::Doctor, &negative).is_err());
    }
}
