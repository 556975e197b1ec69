use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use shopper_shared::errors::AppError;
use shopper_shared::types::auth::{AuthUser, UserRole};

use crate::models::User;
use crate::routes::AppState;

/// Any authenticated, active account. The role comes from the stored row,
/// not the token, so a demotion takes effect immediately.
pub struct CurrentUser(pub User);

pub struct ShopperUser(pub User);

pub struct AdminUser(pub User);

async fn load_user(parts: &mut Parts, state: &Arc<AppState>) -> Result<User, AppError> {
    let auth = AuthUser::from_request_parts(parts, state).await?;
    state.missions.active_user(auth.id).await
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        load_user(parts, state).await.map(Self)
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for ShopperUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let user = load_user(parts, state).await?;
        if user.role()? != UserRole::Shopper {
            return Err(AppError::forbidden("shopper access required"));
        }
        Ok(Self(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let user = load_user(parts, state).await?;
        if user.role()? != UserRole::Admin {
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(Self(user))
    }
}
