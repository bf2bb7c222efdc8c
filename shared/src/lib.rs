#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod collection;
pub mod coordinator;
pub mod event;
pub mod model;
pub mod preferences;
pub mod projection;
pub mod session;
#[cfg(not(target_arch = "wasm32"))]
pub mod shell;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use app::{App, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

use capabilities::{HttpError, KvError, ValidatedUrl, MAX_TIMEOUT_MS};
use collection::TransportError;
use coordinator::MutationError;
use model::RecordId;
use session::AuthError;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MIN_TITLE_CHARS: usize = 3;
pub const MIN_BODY_CHARS: usize = 10;

/// Broad failure class; drives the code shown to users and whether retrying makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Server,
    Decode,
    Storage,
    Configuration,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Server => "SERVER_ERROR",
            Self::Decode => "BAD_RESPONSE",
            Self::Storage => "STORAGE_ERROR",
            Self::Configuration => "CONFIG_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Whether the same request might succeed a moment later.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Server | Self::Storage
        )
    }

    fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 | 403 => Self::Authentication,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    /// Diagnostic text for logs; never shown to users.
    pub detail: Option<String>,
    pub http_status: Option<u16>,
    pub record: Option<RecordId>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            http_status: None,
            record: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn for_record(mut self, id: RecordId) -> Self {
        self.record = Some(id);
        self
    }

    /// Maps a non-2xx answer, preferring the API's own `message` when it sent one.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .map(|e| e.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("server answered HTTP {status}"));
        Self {
            http_status: Some(status),
            ..Self::new(ErrorKind::from_status(status), message)
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_transient()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        let canned = match self.kind {
            ErrorKind::Authentication | ErrorKind::Validation => return self.message.clone(),
            ErrorKind::Network => "Could not reach the posts service. Check your connection.",
            ErrorKind::Timeout => "The posts service took too long to answer. Try again.",
            ErrorKind::NotFound => "That post no longer exists.",
            ErrorKind::Conflict => "That post was changed elsewhere. Refresh and try again.",
            ErrorKind::RateLimited => "Too many requests. Wait a moment and try again.",
            ErrorKind::Server => "The posts service is having trouble. Try again later.",
            ErrorKind::Decode => "The posts service sent something unreadable.",
            ErrorKind::Storage => "Settings could not be saved on this device.",
            ErrorKind::Configuration => "The dashboard is not configured correctly.",
            ErrorKind::Unknown => "Something went wrong. Try again.",
        };
        canned.to_string()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)?;
        if let Some(id) = self.record {
            write!(f, " (post {id})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " [{detail}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Network(detail) => {
                Self::new(ErrorKind::Network, "network request failed").with_detail(detail)
            }
            TransportError::Timeout { timeout_ms } => Self::new(
                ErrorKind::Timeout,
                format!("no answer within {timeout_ms}ms"),
            ),
            TransportError::Status { status, body } => {
                Self::from_http_status(status, body.as_deref().map(str::as_bytes))
            }
            TransportError::Decode(detail) => {
                Self::new(ErrorKind::Decode, "response was not valid post JSON").with_detail(detail)
            }
            TransportError::Request(detail) => {
                Self::new(ErrorKind::Configuration, "request could not be built")
                    .with_detail(detail)
            }
        }
    }
}

impl From<MutationError> for AppError {
    fn from(e: MutationError) -> Self {
        let message = e.to_string();
        match e {
            MutationError::Transport(t) => t.into(),
            MutationError::NotFound(id) => Self::new(ErrorKind::NotFound, message).for_record(id),
            MutationError::Conflict(id) => Self::new(ErrorKind::Conflict, message).for_record(id),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        Self::new(ErrorKind::Authentication, e.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        let kind = match &e {
            KvError::InvalidKey { .. } => ErrorKind::Configuration,
            KvError::Serialization { .. } | KvError::UnexpectedOutput { .. } => ErrorKind::Decode,
            KvError::ValueTooLarge { .. } | KvError::Storage { .. } => ErrorKind::Storage,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        TransportError::from(e).into()
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorKind::Configuration, e.to_string())
    }
}

/// The part of an [`AppError`] the view is allowed to render.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[source] HttpError),
    #[error("request timeout must be between 1ms and {max_ms}ms, got {got_ms}ms")]
    InvalidTimeout { got_ms: u128, max_ms: u64 },
}

/// Settings the core needs to talk to the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Serve the built-in sample posts when the list request fails.
    pub fallback_on_list_failure: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            fallback_on_list_failure: true,
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<ValidatedUrl, ConfigError> {
        let ms = self.request_timeout.as_millis();
        if ms == 0 || ms > u128::from(MAX_TIMEOUT_MS) {
            return Err(ConfigError::InvalidTimeout {
                got_ms: ms,
                max_ms: MAX_TIMEOUT_MS,
            });
        }
        ValidatedUrl::new(self.base_url.as_str()).map_err(ConfigError::InvalidBaseUrl)
    }
}
