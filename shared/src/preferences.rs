//! Device-scoped user preferences and their key-value persistence.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::capabilities::{KeyNamespace, KvError, KvKey, KvOperation, KvOutput, TypedKvStore};

pub const PREFERENCES_KEY: &str = "preferences";
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page size {0} is not one of 5, 10, 20, 50")]
pub struct InvalidPageSize(pub u32);

/// Rows per table page, restricted to the sizes the table offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    Twenty,
    Fifty,
}

impl PageSize {
    #[must_use]
    pub const fn get(self) -> u32 {
        match self {
            Self::Five => 5,
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Fifty => 50,
        }
    }
}

impl TryFrom<u32> for PageSize {
    type Error = InvalidPageSize;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            10 => Ok(Self::Ten),
            20 => Ok(Self::Twenty),
            50 => Ok(Self::Fifty),
            other => Err(InvalidPageSize(other)),
        }
    }
}

impl From<PageSize> for u32 {
    fn from(size: PageSize) -> Self {
        size.get()
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ar,
    En,
}

impl Locale {
    /// Arabic renders right-to-left.
    #[must_use]
    pub const fn is_rtl(self) -> bool {
        matches!(self, Self::Ar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub dark_mode: bool,
    pub locale: Locale,
    pub page_size: PageSize,
    pub notifications_enabled: bool,
    pub email_updates_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            locale: Locale::Ar,
            page_size: PageSize::Ten,
            notifications_enabled: true,
            email_updates_enabled: false,
        }
    }
}

impl Preferences {
    #[must_use]
    pub const fn theme(&self) -> Theme {
        if self.dark_mode {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Key-value layout of the preference blob and the standalone theme flag.
pub struct PreferenceStore {
    blob: TypedKvStore<Preferences>,
    theme: TypedKvStore<Theme>,
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blob: TypedKvStore::new(KvKey::fixed(KeyNamespace::Settings, PREFERENCES_KEY)),
            theme: TypedKvStore::new(KvKey::fixed(KeyNamespace::Settings, THEME_KEY)),
        }
    }

    #[must_use]
    pub fn load_op(&self) -> KvOperation {
        self.blob.get_op()
    }

    /// Full blob first, then the theme flag.
    pub fn save_ops(&self, preferences: &Preferences) -> Result<[KvOperation; 2], KvError> {
        Ok([
            self.blob.set_op(preferences)?,
            self.theme.set_op(&preferences.theme())?,
        ])
    }

    /// Absent or undecodable data falls back to defaults; only the latter is logged.
    #[must_use]
    pub fn parse_loaded(&self, result: Result<KvOutput, KvError>) -> Preferences {
        match result.and_then(|output| self.blob.parse_value(output)) {
            Ok(Some(preferences)) => preferences,
            Ok(None) => Preferences::default(),
            Err(e) => {
                warn!(
                    error = %e,
                    key = %self.blob.key(),
                    "stored preferences unreadable; using defaults"
                );
                Preferences::default()
            }
        }
    }
}
