use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shopper_shared::clients::db::run_blocking;
use shopper_shared::errors::{AppError, AppResult, ErrorCode};
use shopper_shared::types::auth::UserRole;
use shopper_shared::types::pagination::{PageRequest, Pagination};

use crate::domain::status::UserStatus;
use crate::models::{NewUser, User, UserChanges};
use crate::services::auth_service;
use crate::services::views::UserView;
use crate::services::{user_not_found, MissionService};
use crate::store::{DashboardStats, UserFilter, UserSort};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserEdit {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MissionService {
    /// Creates an active shopper account.
    pub async fn register(&self, registration: Registration) -> AppResult<UserView> {
        let registration = Registration {
            name: registration.name.trim().to_string(),
            email: normalize_email(&registration.email),
            password: registration.password,
        };
        registration.validate()?;
        auth_service::validate_password(&registration.password)?;

        let Registration { name, email, password } = registration;
        let password_hash = run_blocking(move || auth_service::hash_password(&password)).await?;

        let user = self
            .in_tx(move |tx| {
                if tx.find_user_by_email(&email)?.is_some() {
                    return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
                }
                tx.insert_user(NewUser {
                    id: Uuid::now_v7(),
                    name,
                    email,
                    password_hash,
                    role: UserRole::Shopper.as_str().to_string(),
                    status: UserStatus::Active.as_str().to_string(),
                })
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        UserView::from_row(user)
    }

    /// Checks credentials. Unknown email and wrong password are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserView> {
        let email = normalize_email(email);
        let password = password.to_string();

        let user = self
            .in_tx(move |tx| {
                let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");
                let user = tx.find_user_by_email(&email)?.ok_or_else(invalid)?;
                if !auth_service::verify_password(&password, &user.password_hash)? {
                    return Err(invalid());
                }
                Ok(user)
            })
            .await?;

        if !user.is_active() {
            tracing::warn!(user_id = %user.id, "login refused for inactive account");
            return Err(AppError::new(ErrorCode::AccountInactive, "account is inactive"));
        }

        tracing::info!(user_id = %user.id, "user logged in");
        UserView::from_row(user)
    }

    /// Resolves a token subject to a live, active account.
    pub async fn active_user(&self, user_id: Uuid) -> AppResult<User> {
        let user = self
            .in_tx(move |tx| tx.find_user(user_id))
            .await?
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
        if !user.is_active() {
            return Err(AppError::new(ErrorCode::AccountInactive, "account is inactive"));
        }
        Ok(user)
    }

    pub async fn user(&self, user_id: Uuid) -> AppResult<UserView> {
        let user = self
            .in_tx(move |tx| tx.find_user(user_id)?.ok_or_else(user_not_found))
            .await?;
        UserView::from_row(user)
    }

    pub async fn list_users(
        &self,
        filter: UserFilter,
        page: PageRequest<UserSort>,
    ) -> AppResult<(Vec<UserView>, Pagination)> {
        let (rows, total) = self.in_tx(move |tx| tx.list_users(&filter, &page)).await?;
        let items = rows.into_iter().map(UserView::from_row).collect::<AppResult<_>>()?;
        Ok((items, Pagination::new(total, &page)))
    }

    /// Admin edit of name, role or status. Accounts are never hard-deleted.
    pub async fn update_user(&self, admin_id: Uuid, user_id: Uuid, edit: UserEdit) -> AppResult<UserView> {
        let edit = UserEdit {
            name: edit.name.map(|n| n.trim().to_string()),
            ..edit
        };
        edit.validate()?;

        if admin_id == user_id
            && (edit.role.is_some_and(|r| r != UserRole::Admin)
                || edit.status.is_some_and(|s| s != UserStatus::Active))
        {
            return Err(AppError::bad_request("admins cannot demote or deactivate their own account"));
        }

        let changes = UserChanges {
            name: edit.name,
            role: edit.role.map(|r| r.as_str().to_string()),
            status: edit.status.map(|s| s.as_str().to_string()),
            updated_at: Some(Utc::now()),
        };

        let user = self
            .in_tx(move |tx| {
                let current = tx.lock_user(user_id)?.ok_or_else(user_not_found)?;
                if changes.is_empty() {
                    return Ok(current);
                }
                tx.update_user(user_id, changes)
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            admin_id = %admin_id,
            role = %user.role,
            status = %user.status,
            "user updated"
        );
        UserView::from_row(user)
    }

    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        self.in_tx(|tx| tx.dashboard_stats()).await
    }
}
