use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use crux_kv::error::KeyValueError;
use std::marker::PhantomData;
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 64;
pub const MAX_VALUE_SIZE: usize = 256 * 1024;

/// Which part of the dashboard owns a stored value. Logout wipes `Session`
/// keys only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Session,
    Settings,
}

impl KeyNamespace {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Settings => "settings",
        }
    }
}

/// A storage key scoped to a namespace; renders as `namespace:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    name: String,
}

impl KvKey {
    /// Names are short slugs: lowercase ASCII letters, digits, `-`, `_` and `.`.
    pub fn new(namespace: KeyNamespace, name: impl Into<String>) -> Result<Self, KvError> {
        let name = name.into();
        let is_slug_char =
            |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.');

        let reason = if name.is_empty() {
            Some("name is empty".to_string())
        } else if name.len() > MAX_KEY_LENGTH {
            Some(format!("name is longer than {MAX_KEY_LENGTH} bytes"))
        } else if !name.chars().all(is_slug_char) {
            Some("name may only use a-z, 0-9, '-', '_' and '.'".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(KvError::InvalidKey {
                key: name.escape_default().take(MAX_KEY_LENGTH).collect(),
                reason,
            }),
            None => Ok(Self { namespace, name }),
        }
    }

    /// For names fixed at compile time.
    pub(crate) fn fixed(namespace: KeyNamespace, name: &'static str) -> Self {
        debug_assert!(Self::new(namespace, name).is_ok(), "bad fixed key {name:?}");
        Self {
            namespace,
            name: name.to_string(),
        }
    }

    /// The flat key handed to the storage backend, e.g. `settings:preferences`.
    #[must_use]
    pub fn raw(&self) -> String {
        self.to_string()
    }

    #[must_use]
    pub fn namespace(&self) -> KeyNamespace {
        self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.prefix(), self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvOperation {
    Get { key: KvKey },
    Set { key: KvKey, value: Vec<u8> },
    Delete { key: KvKey },
}

impl KvOperation {
    #[must_use]
    pub fn get(key: KvKey) -> Self {
        Self::Get { key }
    }

    pub fn set(key: KvKey, value: Vec<u8>) -> Result<Self, KvError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        Ok(Self::Set { key, value })
    }

    #[must_use]
    pub fn delete(key: KvKey) -> Self {
        Self::Delete { key }
    }

    #[must_use]
    pub fn key(&self) -> &KvKey {
        match self {
            Self::Get { key } | Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value of {size} bytes is over the {max} byte limit")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage backend failed: {message}")]
    Storage { message: String },

    #[error("'{key}' does not hold valid JSON: {message}")]
    Serialization { key: String, message: String },

    #[error("storage answered a read of '{key}' with a write result")]
    UnexpectedOutput { key: String },
}

impl KvError {
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<KeyValueError> for KvError {
    fn from(e: KeyValueError) -> Self {
        Self::storage(e.to_string())
    }
}

impl From<&KvError> for KeyValueError {
    fn from(e: &KvError) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvOutput {
    Value(Option<Vec<u8>>),
    Written,
    Deleted { existed: bool },
}

pub type KvResult = Result<KvOutput, KvError>;

/// A single key holding one JSON-encoded value of type `T`.
pub struct TypedKvStore<T> {
    key: KvKey,
    _phantom: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> TypedKvStore<T> {
    #[must_use]
    pub fn new(key: KvKey) -> Self {
        Self {
            key,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn key(&self) -> &KvKey {
        &self.key
    }

    #[must_use]
    pub fn get_op(&self) -> KvOperation {
        KvOperation::get(self.key.clone())
    }

    pub fn set_op(&self, value: &T) -> Result<KvOperation, KvError> {
        let data = serde_json::to_vec(value).map_err(|e| KvError::Serialization {
            key: self.key.raw(),
            message: e.to_string(),
        })?;
        KvOperation::set(self.key.clone(), data)
    }

    #[must_use]
    pub fn delete_op(&self) -> KvOperation {
        KvOperation::delete(self.key.clone())
    }

    pub fn parse_value(&self, output: KvOutput) -> Result<Option<T>, KvError> {
        match output {
            KvOutput::Value(Some(bytes)) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| KvError::Serialization {
                    key: self.key.raw(),
                    message: e.to_string(),
                }),
            KvOutput::Value(None) => Ok(None),
            KvOutput::Written | KvOutput::Deleted { .. } => Err(KvError::UnexpectedOutput {
                key: self.key.raw(),
            }),
        }
    }
}
