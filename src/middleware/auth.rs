use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::Claims,
    entity::enums::Role,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn ensure_role(user: &AuthUser, allowed: &[Role]) -> Result<(), AppError> {
    if !allowed.contains(&user.role) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, &[Role::Admin])
}

/// Sign a token for the user; returns the token and its expiry.
pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> AppResult<(String, chrono::DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok((token, expires_at))
}

pub fn verify_token(secret: &str, token: &str) -> AppResult<AuthUser> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

    Ok(AuthUser {
        user_id,
        email: decoded.claims.email,
        role: decoded.claims.role,
    })
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        let config = Arc::<AppConfig>::from_ref(state);
        verify_token(&config.jwt_secret, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadStorage;

    fn config(secret: &str) -> AppConfig {
        AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: secret.into(),
            jwt_ttl_hours: 1,
            upload_dir: "uploads".into(),
            upload_storage: UploadStorage::Disk,
            max_upload_bytes: 1024,
            shipping_fee: 0,
            free_shipping_threshold: 0,
            notification_ttl_days: 30,
            payment: None,
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let cfg = config("unit-secret");
        let id = Uuid::new_v4();
        let (token, _) = issue_token(&cfg, id, "farmer@example.com", Role::Farmer).unwrap();

        let user = verify_token("unit-secret", &token).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.email, "farmer@example.com");
        assert_eq!(user.role, Role::Farmer);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let (token, _) =
            issue_token(&config("one"), Uuid::new_v4(), "a@b.c", Role::Buyer).unwrap();
        let err = verify_token("two", &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn ensure_role_checks_membership() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            email: "l@example.com".into(),
            role: Role::Logistics,
        };
        assert!(ensure_role(&user, &[Role::Logistics, Role::Admin]).is_ok());
        assert!(matches!(ensure_admin(&user), Err(AppError::Forbidden)));
    }
}
