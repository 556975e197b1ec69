use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use shopper_shared::errors::AppError;
use shopper_shared::types::auth::{Claims, UserRole};

use crate::services::views::{AuthSession, UserView};

pub fn create_access_token(
    user_id: Uuid,
    role: UserRole,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, role, ttl_secs);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
}

/// Signs a token for `user` and pairs it with the profile.
pub fn issue_session(user: UserView, secret: &str, ttl_secs: i64) -> Result<AuthSession, AppError> {
    let token = create_access_token(user.id, user.role, secret, ttl_secs)?;
    Ok(AuthSession { token, user })
}
