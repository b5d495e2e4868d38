//! Signed-in session persistence and password login.

use std::sync::Arc;

use campus_eats_core::{Email, EmailError, Password, PasswordError};
use chrono::Utc;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{Backend, BackendError, Session};
use crate::storage::{KeyValueStorage, keys, read_json, write_json};

/// Errors that can occur during login.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password rejected before it was sent.
    #[error("invalid password: {0}")]
    InvalidPassword(#[from] PasswordError),

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Identity service request failed.
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => Self::InvalidCredentials,
            other => Self::Backend(other),
        }
    }
}

/// Persisted session, stored under the `session` key.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// The stored session, if one exists and has not expired.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        let session: Session = read_json(self.storage.as_ref(), keys::SESSION)?;
        if session.is_expired_at(Utc::now()) {
            debug!(user_id = %session.user_id(), "Stored session has expired");
            return None;
        }
        Some(session)
    }

    pub fn save(&self, session: &Session) {
        write_json(self.storage.as_ref(), keys::SESSION, session);
    }

    /// Forget the stored session.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(keys::SESSION) {
            tracing::warn!(error = %e, "Failed to remove stored session");
        }
    }

    /// Validate credentials locally, sign in and persist the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` or `SessionError::InvalidPassword`
    /// without contacting the backend if the input is malformed.
    /// Returns `SessionError::InvalidCredentials` if the identity service
    /// rejects the email/password pair.
    pub async fn login(
        &self,
        backend: &dyn Backend,
        email: &str,
        password: &str,
    ) -> Result<Session, SessionError> {
        let email = Email::parse(email)?;
        let password = SecretString::from(Password::parse(password)?);

        let session = backend.sign_in(&email, &password).await?;
        self.save(&session);

        info!(user_id = %session.user_id(), "Logged in");
        Ok(session)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::backend::SessionUser;
    use crate::storage::MemoryStorage;

    fn session(expires_in: TimeDelta) -> Session {
        Session {
            access_token: SecretString::from("token"),
            refresh_token: None,
            expires_at: Utc::now() + expires_in,
            user: SessionUser {
                id: "3f0c1c1e-7b7a-4c55-9d0b-2a6a6f1e9c10".parse().unwrap(),
                email: Some(Email::parse("ali@uni.my").unwrap()),
            },
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        assert!(store.current().is_none());

        let saved = session(TimeDelta::hours(1));
        store.save(&saved);
        let loaded = store.current().unwrap();
        assert_eq!(loaded.user, saved.user);
        assert_eq!(loaded.expires_at, saved.expires_at);
        assert_eq!(loaded.access_token.expose_secret(), "token");

        store.clear();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_expired_session_is_ignored() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        store.save(&session(TimeDelta::seconds(-1)));
        assert!(store.current().is_none());
    }

    #[test]
    fn test_corrupt_session_reads_as_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(keys::SESSION, "{\"access_token\":").unwrap();
        let store = SessionStore::new(storage.clone());
        assert!(store.current().is_none());
        assert!(storage.read(keys::SESSION).unwrap().is_none());
    }

    #[test]
    fn test_unauthorized_maps_to_invalid_credentials() {
        let err = SessionError::from(BackendError::Unauthorized("Invalid login credentials".into()));
        assert!(matches!(err, SessionError::InvalidCredentials));

        let err = SessionError::from(BackendError::NotFound("x".into()));
        assert!(matches!(err, SessionError::Backend(_)));
    }
}
