//! Mock sign-in and the persisted auth session.
//!
//! Credentials are checked locally against a single demo account. The token is
//! opaque and never verified; `looks_valid` is advisory only.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

use crate::capabilities::{KeyNamespace, KvError, KvKey, KvOperation, KvOutput, TypedKvStore};

pub const SESSION_KEY: &str = "auth";
pub const DEMO_EMAIL: &str = "admin@example.com";
pub const DEMO_PASSWORD: &str = "password";
pub const TOKEN_PREFIX: &str = "fake-jwt-token-";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AuthError {
    #[error("Data invalid. Please check your credentials.")]
    InvalidCredentials,
    #[error("Email and password are required.")]
    MissingCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
}

#[derive(Debug)]
pub struct Session {
    pub user: User,
    token: SecretString,
}

impl Session {
    #[must_use]
    pub fn new(user: User, token: impl Into<String>) -> Self {
        Self {
            user,
            token: SecretString::new(token.into()),
        }
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Shape check only; nothing is gated on it.
    #[must_use]
    pub fn looks_valid(&self) -> bool {
        self.token
            .expose_secret()
            .strip_prefix(TOKEN_PREFIX)
            .is_some_and(|millis| !millis.is_empty() && millis.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Checks the demo account and issues a fresh session.
pub fn authenticate(email: &str, password: &str) -> Result<Session, AuthError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    if !email.eq_ignore_ascii_case(DEMO_EMAIL) || password != DEMO_PASSWORD {
        return Err(AuthError::InvalidCredentials);
    }

    let user = User {
        id: 1,
        email: DEMO_EMAIL.to_string(),
        name: "Admin User".to_string(),
    };
    Ok(Session::new(user, format!("{TOKEN_PREFIX}{}", now_millis())))
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// On-disk form of a session. The token is exposed only for the write.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    user: User,
    token: String,
}

pub struct SessionStore {
    slot: TypedKvStore<StoredSession>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: TypedKvStore::new(KvKey::fixed(KeyNamespace::Session, SESSION_KEY)),
        }
    }

    #[must_use]
    pub fn load_op(&self) -> KvOperation {
        self.slot.get_op()
    }

    pub fn save_op(&self, session: &Session) -> Result<KvOperation, KvError> {
        self.slot.set_op(&StoredSession {
            user: session.user.clone(),
            token: session.token.expose_secret().clone(),
        })
    }

    #[must_use]
    pub fn clear_op(&self) -> KvOperation {
        self.slot.delete_op()
    }

    #[must_use]
    pub fn parse_loaded(&self, result: Result<KvOutput, KvError>) -> Option<Session> {
        match result.and_then(|output| self.slot.parse_value(output)) {
            Ok(stored) => stored.map(|s| Session::new(s.user, s.token)),
            Err(e) => {
                warn!(error = %e, "stored session unreadable; starting signed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_credentials_sign_in() {
        let session = authenticate(" admin@example.com ", "password").unwrap();
        assert_eq!(session.user.id, 1);
        assert_eq!(session.user.name, "Admin User");
        assert!(session.token().expose_secret().starts_with(TOKEN_PREFIX));
        assert!(session.looks_valid());
    }

    #[test]
    fn wrong_or_blank_credentials_fail() {
        assert!(matches!(
            authenticate("admin@example.com", "hunter2"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate("someone@example.com", "password"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(authenticate("", "password"), Err(AuthError::MissingCredentials)));
        assert!(matches!(
            authenticate("admin@example.com", ""),
            Err(AuthError::MissingCredentials)
        ));
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Data invalid. Please check your credentials."
        );
    }

    #[test]
    fn token_shape_check() {
        let user = User {
            id: 1,
            email: DEMO_EMAIL.into(),
            name: "Admin User".into(),
        };
        assert!(!Session::new(user.clone(), "fake-jwt-token-").looks_valid());
        assert!(!Session::new(user.clone(), "bearer abc").looks_valid());
        assert!(Session::new(user, "fake-jwt-token-1700000000000").looks_valid());
    }

    #[test]
    fn debug_output_redacts_token() {
        let session = authenticate(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains(session.token().expose_secret().as_str()));
    }

    #[test]
    fn stored_session_restores() {
        let store = SessionStore::new();
        let session = authenticate(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        let KvOperation::Set { key, value } = store.save_op(&session).unwrap() else {
            panic!("expected Set");
        };
        assert_eq!(key.raw(), "session:auth");

        let restored = store
            .parse_loaded(Ok(KvOutput::Value(Some(value))))
            .expect("session restored");
        assert_eq!(restored.user, session.user);
        assert_eq!(
            restored.token().expose_secret(),
            session.token().expose_secret()
        );

        assert!(store.parse_loaded(Ok(KvOutput::Value(None))).is_none());
        assert!(store
            .parse_loaded(Ok(KvOutput::Value(Some(b"[]".to_vec()))))
            .is_none());
    }
}
