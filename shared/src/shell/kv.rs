use crux_kv::error::KeyValueError;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::capabilities::KvError;

use super::ShellError;

/// Durable string-keyed blob storage behind the key-value capability.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError>;

    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool, KvError>;

    /// Keys starting with `prefix`, in order.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;

    fn execute(&self, operation: &KeyValueOperation) -> KeyValueResult {
        let response = match operation {
            KeyValueOperation::Get { key } => self
                .get(key)
                .map(|value| KeyValueResponse::Get { value: value.into() }),
            KeyValueOperation::Set { key, value } => self.get(key).and_then(|previous| {
                self.set(key, value)?;
                Ok(KeyValueResponse::Set {
                    previous: previous.into(),
                })
            }),
            KeyValueOperation::Delete { key } => self.get(key).and_then(|previous| {
                self.remove(key)?;
                Ok(KeyValueResponse::Delete {
                    previous: previous.into(),
                })
            }),
            KeyValueOperation::Exists { key } => self.get(key).map(|value| {
                KeyValueResponse::Exists {
                    is_present: value.is_some(),
                }
            }),
            KeyValueOperation::ListKeys { prefix, cursor } => {
                if *cursor != 0 {
                    return KeyValueResult::Err {
                        error: KeyValueError::CursorNotFound,
                    };
                }
                self.list_keys(prefix).map(|keys| KeyValueResponse::ListKeys {
                    keys,
                    next_cursor: 0,
                })
            }
        };
        match response {
            Ok(response) => KeyValueResult::Ok { response },
            Err(e) => KeyValueResult::Err {
                error: KeyValueError::from(&e),
            },
        }
    }
}

/// Single `kv` table in a SQLite file.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ShellError> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "kv database opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ShellError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ShellError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key     TEXT PRIMARY KEY,
                value   BLOB NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, KvError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| KvError::storage("kv connection lock poisoned"))?;
        f(&conn).map_err(|e| KvError::storage(e.to_string()))
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
    }

    fn remove(&self, key: &str) -> Result<bool, KvError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map(|n| n > 0)
        })
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, KvError> {
        self.entries
            .lock()
            .map_err(|_| KvError::storage("kv map lock poisoned"))
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        self.entries()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.entries()?.remove(key).is_some())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        Ok(self
            .entries()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_kv::value::Value;
    use tempfile::TempDir;

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.db");

        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set("settings:theme", br#""dark""#).unwrap();
            store.set("settings:theme", br#""light""#).unwrap();
        }

        let store = SqliteKvStore::open(&path).unwrap();
        assert_eq!(
            store.get("settings:theme").unwrap(),
            Some(br#""light""#.to_vec())
        );
        assert!(store.remove("settings:theme").unwrap());
        assert!(!store.remove("settings:theme").unwrap());
        assert_eq!(store.get("settings:theme").unwrap(), None);
    }

    #[test]
    fn sqlite_lists_keys_by_prefix() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("settings:theme", b"1").unwrap();
        store.set("settings:locale", b"2").unwrap();
        store.set("session:auth", b"3").unwrap();

        assert_eq!(
            store.list_keys("settings:").unwrap(),
            vec!["settings:locale".to_string(), "settings:theme".to_string()]
        );
        assert!(store.list_keys("cache:").unwrap().is_empty());
    }

    #[test]
    fn execute_reports_previous_values() {
        let store = MemoryKvStore::new();
        let key = "session:auth".to_string();

        assert_eq!(
            store.execute(&KeyValueOperation::Get { key: key.clone() }),
            KeyValueResult::Ok {
                response: KeyValueResponse::Get { value: Value::None }
            }
        );
        assert_eq!(
            store.execute(&KeyValueOperation::Set {
                key: key.clone(),
                value: b"{}".to_vec(),
            }),
            KeyValueResult::Ok {
                response: KeyValueResponse::Set {
                    previous: Value::None
                }
            }
        );
        assert_eq!(
            store.execute(&KeyValueOperation::Exists { key: key.clone() }),
            KeyValueResult::Ok {
                response: KeyValueResponse::Exists { is_present: true }
            }
        );
        assert_eq!(
            store.execute(&KeyValueOperation::Delete { key }),
            KeyValueResult::Ok {
                response: KeyValueResponse::Delete {
                    previous: Value::Bytes(b"{}".to_vec())
                }
            }
        );
    }

    #[test]
    fn unknown_list_cursor_is_refused() {
        let store = MemoryKvStore::new();
        assert_eq!(
            store.execute(&KeyValueOperation::ListKeys {
                prefix: String::new(),
                cursor: 7,
            }),
            KeyValueResult::Err {
                error: KeyValueError::CursorNotFound
            }
        );
    }
}
