//! Native shell: performs the effects the core requests.
//!
//! HTTP goes through `reqwest`, key-value operations through SQLite. Effects
//! are run one at a time in the order they were requested, so a single
//! `dispatch` settles everything an event sets in motion before returning.

mod http;
mod kv;

pub use self::http::{HttpExecutor, ReqwestExecutor};
pub use self::kv::{KeyValueStore, MemoryKvStore, SqliteKvStore};

use crux_core::Core;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::app::{App, ViewModel};
use crate::capabilities::{Capabilities, Effect};
use crate::event::Event;
use crate::{ConfigError, DashboardConfig};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    pub database_path: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("admin_dashboard.db"),
        }
    }
}

pub struct Shell<H, S> {
    core: Core<Effect, App>,
    http: H,
    kv: S,
}

impl Shell<ReqwestExecutor, SqliteKvStore> {
    pub fn open(config: &DashboardConfig, shell: &ShellConfig) -> Result<Self, ShellError> {
        Self::new(
            config,
            ReqwestExecutor::new(config.request_timeout)?,
            SqliteKvStore::open(&shell.database_path)?,
        )
    }
}

impl<H: HttpExecutor, S: KeyValueStore> Shell<H, S> {
    /// Starts a core and hands it `config`, which must validate.
    pub fn new(config: &DashboardConfig, http: H, kv: S) -> Result<Self, ShellError> {
        config.validate()?;
        let core = Core::new::<Capabilities>();
        // Configuring only renders.
        let _ = core.process_event(Event::Configure {
            config: config.clone(),
        });
        Ok(Self { core, http, kv })
    }

    /// Runs `event` and every effect it transitively produces, then returns the view.
    #[instrument(name = "shell_dispatch", skip(self, event), fields(event = event.name()))]
    pub async fn dispatch(&mut self, event: Event) -> ViewModel {
        let mut queue: VecDeque<Effect> = self.core.process_event(event).into();
        let mut performed = 0usize;

        while let Some(effect) = queue.pop_front() {
            let follow_up = match effect {
                Effect::Render(_) => continue,
                Effect::Http(mut request) => {
                    let output = self.http.execute(&request.operation).await;
                    self.core.resolve(&mut request, output)
                }
                Effect::KeyValue(mut request) => {
                    let output = self.kv.execute(&request.operation);
                    self.core.resolve(&mut request, output)
                }
            };
            performed += 1;
            queue.extend(follow_up);
        }

        debug!(performed, "effects settled");
        self.core.view()
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.kv
    }
}
