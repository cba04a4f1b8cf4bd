use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use std::sync::LazyLock;

use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{LoginRequest, LoginResponse, SignupRequest},
    entity::{
        enums::Role,
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, issue_token},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Stand-in hash verified when no account matches, so unknown emails cost the same as wrong passwords.
static UNKNOWN_USER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("pureharvest-unknown-account").ok());

/// Runs a full argon2 verification whether or not the account exists.
fn credentials_match(password: &str, stored_hash: Option<&str>) -> AppResult<bool> {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
                verify_password(password, hash)?;
            }
            Ok(false)
        }
    }
}

pub fn validate_new_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub async fn signup(state: &AppState, payload: SignupRequest) -> AppResult<ApiResponse<User>> {
    let email = normalize_email(&payload.email);
    if !looks_like_email(&email) {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    validate_new_password(&payload.password)?;

    let role = payload.role.unwrap_or(Role::Buyer);
    if !role.is_self_service() {
        return Err(AppError::BadRequest(format!(
            "cannot sign up as {}",
            role.as_str()
        )));
    }

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        name: Set(name),
        phone: Set(payload.phone.filter(|p| !p.trim().is_empty())),
        role: Set(role),
        farm_name: Set(payload.farm_name.filter(|_| role == Role::Farmer)),
        is_active: Set(true),
        is_verified: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "user registered");
    audit::record(
        &state.pool,
        user.id,
        "user_signup",
        "users",
        serde_json::json!({ "user_id": user.id, "role": role }),
    )
    .await;

    Ok(ApiResponse::success("User created", User::from(user), None))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<LoginResponse>> {
    let email = normalize_email(&payload.email);
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let matched = credentials_match(
        &payload.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    )?;
    let user = match user {
        Some(u) if matched => u,
        _ => return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into())),
    };

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    let (token, expires_at) = issue_token(&state.config, user.id, &user.email, user.role)?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let resp = LoginResponse {
        token,
        token_type: "Bearer".into(),
        expires_at,
        user: User::from(user),
    };

    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let found = Users::find_by_id(user.user_id).one(&state.orm).await?;
    match found {
        Some(u) if u.is_active => Ok(ApiResponse::success("OK", User::from(u), None)),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Asha@Farm.IN "), "asha@farm.in");
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("no-at-sign"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@localhost"));
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn unknown_account_still_runs_argon2() {
        let hash = UNKNOWN_USER_HASH.as_deref().expect("stand-in hash");
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!credentials_match("pureharvest-unknown-account", None).unwrap());
        assert!(!credentials_match("anything", None).unwrap());
    }

    #[test]
    fn known_account_checks_its_own_hash() {
        let hash = hash_password("correct horse").unwrap();
        assert!(credentials_match("correct horse", Some(&hash)).unwrap());
        assert!(!credentials_match("wrong horse", Some(&hash)).unwrap());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_new_password("short").is_err());
        assert!(validate_new_password("long enough").is_ok());
    }
}
