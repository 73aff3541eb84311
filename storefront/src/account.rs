//! Accounts and the signed-in session.
//!
//! The session lives in local storage: the raw bearer token under `token`
//! and `{"userId", "isAdmin"}` under `user`. The HTTP client reads the token
//! from there on every authenticated call.

use crate::api::{AccountApi, ApiError};
use crate::storage::keys;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use storefront_core::environment::{KeyValueStorage, StorageError};
use thiserror::Error;

/// Fallback when registration fails without a server message
pub const REGISTRATION_FAILED: &str = "Registration failed";

/// Fallback when sign-in fails without a server message
pub const LOGIN_FAILED: &str = "Login failed";

/// Signed-in user as persisted under the `user` key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// User id
    pub user_id: UserId,
    /// Whether the user may use admin operations
    #[serde(default)]
    pub is_admin: bool,
}

/// Body of a successful register or login response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Bearer token
    pub token: String,
    /// User id
    pub user_id: UserId,
    /// Admin flag
    #[serde(default)]
    pub is_admin: bool,
}

impl AuthResponse {
    /// Session record for this response
    #[must_use]
    pub fn user(&self) -> SessionUser {
        SessionUser {
            user_id: self.user_id.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// `POST /users/login` body
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email
    pub email: String,
    /// Password
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `POST /users/register` body
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Account email
    pub email: String,
    /// Display name
    pub username: String,
    /// Password
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Row of the admin user list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User id
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name
    pub username: String,
    /// Account email
    pub email: String,
    /// Admin flag
    #[serde(default)]
    pub is_admin: bool,
}

/// Account operation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Register or login was refused; `message` is ready to display.
    #[error("{message}")]
    Rejected {
        /// Server message or fallback
        message: String,
    },

    /// An admin call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The session could not be saved or removed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Session persisted in local storage
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    /// Session backed by `storage`
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Restore the signed-in user at startup.
    ///
    /// Needs both keys. A `user` value that does not parse removes both keys;
    /// nothing is reported to the caller.
    #[must_use]
    pub fn hydrate(&self) -> Option<SessionUser> {
        let user = self.storage.get(keys::USER).ok().flatten()?;
        self.storage.get(keys::TOKEN).ok().flatten()?;

        match serde_json::from_str(&user) {
            Ok(user) => Some(user),
            Err(error) => {
                tracing::warn!(%error, "Discarding corrupt stored session");
                if let Err(error) = self.end() {
                    tracing::warn!(%error, "Failed to remove corrupt session");
                }
                None
            },
        }
    }

    /// Persist a fresh session
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when either key cannot be written.
    pub fn begin(&self, auth: &AuthResponse) -> Result<SessionUser, StorageError> {
        let user = auth.user();
        let json = serde_json::to_string(&user).map_err(|e| StorageError::Serialization {
            key: keys::USER.to_string(),
            message: e.to_string(),
        })?;

        self.storage.set(keys::TOKEN, &auth.token)?;
        self.storage.set(keys::USER, &json)?;
        Ok(user)
    }

    /// Remove both session keys
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when a key cannot be removed.
    pub fn end(&self) -> Result<(), StorageError> {
        self.storage.remove(keys::USER)?;
        self.storage.remove(keys::TOKEN)
    }
}

/// Registration, sign-in and admin user management
pub struct AuthService {
    api: Arc<dyn AccountApi>,
    session: SessionStore,
    user: Option<SessionUser>,
    error: Option<String>,
}

impl AuthService {
    /// Service with the session restored from storage
    #[must_use]
    pub fn new(api: Arc<dyn AccountApi>, storage: Arc<dyn KeyValueStorage>) -> Self {
        let session = SessionStore::new(storage);
        let user = session.hydrate();
        Self {
            api,
            session,
            user,
            error: None,
        }
    }

    /// Signed-in user
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Whether the signed-in user is an admin
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }

    /// Message of the last failed register or login
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Create an account and sign in
    ///
    /// # Errors
    ///
    /// - [`AuthError::Rejected`] with the server message or "Registration failed"
    /// - [`AuthError::Storage`] when the session cannot be saved
    #[tracing::instrument(skip_all, fields(email = %request.email))]
    pub async fn register(&mut self, request: RegisterRequest) -> Result<SessionUser, AuthError> {
        self.error = None;
        let outcome = self.api.register(request).await;
        self.start_session(outcome, REGISTRATION_FAILED)
    }

    /// Sign in
    ///
    /// # Errors
    ///
    /// - [`AuthError::Rejected`] with the server message or "Login failed"
    /// - [`AuthError::Storage`] when the session cannot be saved
    #[tracing::instrument(skip_all, fields(email = %request.email))]
    pub async fn login(&mut self, request: LoginRequest) -> Result<SessionUser, AuthError> {
        self.error = None;
        let outcome = self.api.login(request).await;
        self.start_session(outcome, LOGIN_FAILED)
    }

    fn start_session(
        &mut self,
        outcome: Result<AuthResponse, ApiError>,
        fallback: &str,
    ) -> Result<SessionUser, AuthError> {
        let auth = outcome.map_err(|error| {
            let message = error.message_or(fallback);
            tracing::info!(%error, "Authentication refused");
            self.error = Some(message.clone());
            AuthError::Rejected { message }
        })?;

        let user = self.session.begin(&auth)?;
        tracing::info!(user_id = %user.user_id, "Signed in");
        self.user = Some(user.clone());
        Ok(user)
    }

    /// Sign out and forget the stored session
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the keys cannot be removed; the
    /// in-memory session is cleared regardless.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.user = None;
        self.session.end()?;
        Ok(())
    }

    /// Every registered user (admin)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] when the call fails.
    pub async fn fetch_all_users(&self) -> Result<Vec<UserSummary>, AuthError> {
        Ok(self.api.fetch_users().await?)
    }

    /// Delete a user (admin)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] when the call fails.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), AuthError> {
        Ok(self.api.delete_user(user_id).await?)
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("user", &self.user)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
