use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::coordinator::{MutationReport, PendingMutations};
use crate::preferences::Preferences;
use crate::session::Session;
use crate::{AppError, DashboardConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the managed collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    pub owner_id: u64,
}

/// User-submitted fields for create and update; the id is never part of a draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    pub body: String,
    pub owner_id: u64,
}

impl RecordDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>, owner_id: u64) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            owner_id,
        }
    }

    #[must_use]
    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            title: self.title,
            body: self.body,
            owner_id: self.owner_id,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Monotonic tag of an issued list request.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadSeq(pub u64);

impl fmt::Display for LoadSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("record id {0} already present in cache")]
    DuplicateId(RecordId),
}

/// Client-held copy of the remote collection plus fetch status.
///
/// Invariant: `records` never holds two entries with the same id.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    records: Vec<Record>,
    status: LoadStatus,
    error_detail: Option<String>,
    using_fallback_data: bool,
    issued: LoadSeq,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.status
    }

    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    #[must_use]
    pub fn using_fallback_data(&self) -> bool {
        self.using_fallback_data
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    /// `max(existing ids, 0) + 1`.
    #[must_use]
    pub fn next_id(&self) -> RecordId {
        let max = self.records.iter().map(|r| r.id.0).max().unwrap_or(0);
        RecordId(max.saturating_add(1))
    }

    #[must_use]
    pub fn is_latest(&self, seq: LoadSeq) -> bool {
        seq == self.issued
    }

    pub fn begin_load(&mut self) -> LoadSeq {
        self.issued = LoadSeq(self.issued.0 + 1);
        self.status = LoadStatus::Loading;
        self.error_detail = None;
        debug!(seq = %self.issued, "load started");
        self.issued
    }

    /// Returns `false` without touching state when `seq` is not the latest load.
    pub fn load_succeeded(&mut self, seq: LoadSeq, records: Vec<Record>) -> bool {
        if !self.accept(seq) {
            return false;
        }
        self.records = dedup_by_id(records);
        self.status = LoadStatus::Idle;
        self.error_detail = None;
        self.using_fallback_data = false;
        true
    }

    /// Records are left as they were so a failed refresh never blanks the table.
    pub fn load_failed(&mut self, seq: LoadSeq, detail: impl Into<String>) -> bool {
        if !self.accept(seq) {
            return false;
        }
        self.status = LoadStatus::Error;
        self.error_detail = Some(detail.into());
        true
    }

    /// Substitutes `fallback` for remote data and flags it as such.
    pub fn load_fallback(
        &mut self,
        seq: LoadSeq,
        fallback: Vec<Record>,
        detail: impl Into<String>,
    ) -> bool {
        if !self.accept(seq) {
            return false;
        }
        self.records = dedup_by_id(fallback);
        self.status = LoadStatus::Idle;
        self.error_detail = Some(detail.into());
        self.using_fallback_data = true;
        true
    }

    pub fn record_added(&mut self, record: Record) -> Result<(), CacheError> {
        if self.contains(record.id) {
            warn!(id = %record.id, "rejecting record with colliding id");
            return Err(CacheError::DuplicateId(record.id));
        }
        self.records.insert(0, record);
        Ok(())
    }

    /// Returns whether a record was replaced.
    pub fn record_updated(&mut self, record: Record) -> bool {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => {
                debug!(id = %record.id, "update for record not in cache ignored");
                false
            }
        }
    }

    /// Returns whether a record was removed.
    pub fn record_removed(&mut self, id: RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        if !removed {
            debug!(%id, "removal of record not in cache ignored");
        }
        removed
    }

    /// Drops all data and advances the sequence counter, so loads issued before
    /// the reset are stale afterwards.
    pub fn reset(&mut self) {
        *self = Self {
            issued: LoadSeq(self.issued.0 + 1),
            ..Self::default()
        };
    }

    fn accept(&self, seq: LoadSeq) -> bool {
        if self.is_latest(seq) {
            return true;
        }
        debug!(%seq, latest = %self.issued, "discarding stale load completion");
        false
    }
}

fn dedup_by_id(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    let total = records.len();
    let unique: Vec<Record> = records.into_iter().filter(|r| seen.insert(r.id)).collect();
    if unique.len() != total {
        warn!(
            dropped = total - unique.len(),
            "collection contained duplicate ids; kept first occurrences"
        );
    }
    unique
}

/// Search, sort and paging inputs of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewControl {
    search_term: String,
    sort_order: SortOrder,
    current_page: u32,
    page_size: u32,
}

impl Default for ViewControl {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            sort_order: SortOrder::Ascending,
            current_page: 1,
            page_size: crate::DEFAULT_PAGE_SIZE,
        }
    }
}

impl ViewControl {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    #[must_use]
    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Any change of the term sends the table back to page 1.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.current_page = 1;
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
    }

    pub fn set_page(&mut self, page: u32) {
        self.current_page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        let page_size = page_size.max(1);
        if page_size != self.page_size {
            self.page_size = page_size;
            self.current_page = 1;
        }
    }

    /// Pulls the current page back inside `1..=total_pages`.
    pub fn clamp_page(&mut self, total_pages: u32) {
        self.current_page = self.current_page.clamp(1, total_pages.max(1));
    }
}

/// Everything the session owns. Created at `AppStarted`, torn down at logout.
#[derive(Debug, Default)]
pub struct Model {
    pub config: DashboardConfig,
    pub cache: Cache,
    pub view: ViewControl,
    pub preferences: Preferences,
    /// Set once the user saves; a stored copy read afterwards is stale.
    pub preferences_edited: bool,
    pub session: Option<Session>,
    pub auth_error: Option<String>,
    pub load_error: Option<AppError>,
    pub pending: PendingMutations,
    pub last_outcome: Option<MutationReport>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Logout teardown. Preferences survive; they belong to the device, not the session.
    pub fn end_session(&mut self) {
        self.session = None;
        self.auth_error = None;
        self.load_error = None;
        self.cache.reset();
        self.view = ViewControl::new(self.preferences.page_size.get());
        self.pending.clear();
        self.last_outcome = None;
    }
}
