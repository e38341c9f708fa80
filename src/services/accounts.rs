use crate::{
    auth::{AccessToken, AuthService},
    db::DbPool,
    entities::user::{self, Entity as UserEntity, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Registration input, validated at the boundary.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 15, message = "Phone must be 1-15 characters"))]
    pub phone: String,
    pub role: UserRole,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 15))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordInput {
    pub old_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Public view of an account; never exposes the password hash.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: UserRole,
}

impl From<user::Model> for AccountResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            name: model.name,
            email: model.email,
            phone: model.phone,
            role: model.role,
        }
    }
}

/// Account registration, login and profile management.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DbPool>,
    auth: Arc<AuthService>,
    event_sender: Arc<EventSender>,
}

impl AccountService {
    pub fn new(db: Arc<DbPool>, auth: Arc<AuthService>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            auth,
            event_sender,
        }
    }

    /// Registers a new account with a hashed password.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register(&self, input: RegisterInput) -> Result<AccountResponse, ServiceError> {
        input.validate()?;

        let existing = UserEntity::find()
            .filter(
                user::Column::Username
                    .eq(input.username.clone())
                    .or(user::Column::Email.eq(input.email.clone())),
            )
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this username or email already exists".to_string(),
            ));
        }

        let password_hash = self
            .auth
            .hash_password(&input.password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let user_id = Uuid::new_v4();
        let account = user::ActiveModel {
            id: Set(user_id),
            username: Set(input.username),
            name: Set(input.name),
            email: Set(input.email),
            phone: Set(input.phone),
            role: Set(input.role),
            password_hash: Set(password_hash),
            created_at: Set(Utc::now()),
        };

        let account = account.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user_id))
            .await;

        info!(user_id = %user_id, "Account registered");
        Ok(account.into())
    }

    /// Verifies credentials and issues an access token.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountResponse, AccessToken), ServiceError> {
        let account = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::AuthError("Invalid username or password".to_string())
            })?;

        let verified = self
            .auth
            .verify_password(password, &account.password_hash)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if !verified {
            return Err(ServiceError::AuthError(
                "Invalid username or password".to_string(),
            ));
        }

        let token = self
            .auth
            .generate_token(&account)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        info!(user_id = %account.id, "Login succeeded");
        Ok((account.into(), token))
    }

    /// Fetches the caller's profile.
    pub async fn profile(&self, user_id: Uuid) -> Result<AccountResponse, ServiceError> {
        let account = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))?;
        Ok(account.into())
    }

    /// Updates mutable profile fields. Username, email and role are fixed
    /// at registration.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<AccountResponse, ServiceError> {
        input.validate()?;

        let account = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))?;

        let mut active: user::ActiveModel = account.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }

        let updated = active.update(&*self.db).await?;
        Ok(updated.into())
    }

    /// Changes the password after verifying the current one.
    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        input.validate()?;

        let account = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))?;

        let verified = self
            .auth
            .verify_password(&input.old_password, &account.password_hash)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if !verified {
            return Err(ServiceError::ValidationError("Wrong password".to_string()));
        }

        let new_hash = self
            .auth
            .hash_password(&input.new_password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(new_hash);
        active.update(&*self.db).await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }
}
